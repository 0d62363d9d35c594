//! DNS zone manager
//!
//! Command line front end: transfers zones and sends signed A record
//! updates to the nameserver named by `DNS_SERVER`.

use std::net::Ipv4Addr;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info};

use dns_zone_manager::{
    config::ClientConfig,
    errors::DnsError,
    record::{Record, RecordClass, RecordData, RecordType},
    transfer,
    tsig::TsigKey,
    update::{check_update_response, UpdateOperation, UpdateSpec},
    utils::fqdn,
};

#[derive(Parser, Debug)]
#[command(name = "dns-zone-manager", version, about = "Transfer and update DNS zones")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print all records of a zone as JSON
    Transfer {
        zone: String,
    },
    /// Add (or replace) an A record
    Add {
        zone: String,
        name: String,
        address: Ipv4Addr,
        #[arg(long, default_value_t = 3600)]
        ttl: u32,
    },
    /// Delete all records of a name and type
    Delete {
        zone: String,
        name: String,
        #[arg(long = "type", default_value = "A")]
        rtype: RecordType,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<(), DnsError> {
    let config = ClientConfig::from_env()?;

    let spec = match command {
        Command::Transfer { zone } => {
            let records = transfer(&fqdn(&zone), &config.nameserver).await?;
            print_json(&records)?;
            return Ok(());
        }
        Command::Add {
            zone,
            name,
            address,
            ttl,
        } => UpdateSpec {
            zone: fqdn(&zone),
            operation: UpdateOperation::Add,
            record: Record::a(fqdn(&name), ttl, address),
        },
        Command::Delete { zone, name, rtype } => UpdateSpec {
            zone: fqdn(&zone),
            operation: UpdateOperation::Delete,
            record: Record {
                name: fqdn(&name),
                rtype,
                class: RecordClass::Inet,
                ttl: 0,
                data: RecordData::empty(),
            },
        },
    };

    let key = TsigKey::from_file(&config.tsig_key_path)?;
    let response = spec.apply(&key, &config.nameserver).await?;
    let header = check_update_response(&response)?;
    info!("Update {:04x} accepted", header.id);
    print_json(&spec)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), DnsError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| DnsError::Io(e.into()))?;
    println!("{}", json);
    Ok(())
}
