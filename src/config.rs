//! Configuration for the zone client.
//!
//! This module defines protocol constants and the client configuration,
//! loaded from environment variables.

use std::{env, path::PathBuf, time::Duration};
use log::info;

use crate::errors::DnsError;

/// Bound on establishing the TCP connection to the nameserver.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest DNS message that fits a TCP length prefix.
pub const MAX_MESSAGE_SIZE: usize = u16::MAX as usize;

/// Permitted clock skew advertised in TSIG records, in seconds.
pub const TSIG_FUDGE: u16 = 300;

/// Default location of the TSIG key file.
pub const DEFAULT_TSIG_KEY_FILE: &str = "tsig.json";

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Nameserver to send transfers and updates to, as `host:port`.
    pub nameserver: String,

    /// Path to the JSON file holding the TSIG key.
    pub tsig_key_path: PathBuf,
}

impl ClientConfig {
    /// Load client configuration from environment variables.
    ///
    /// * `DNS_SERVER` - nameserver address (required).
    /// * `DNS_TSIG_KEY_FILE` - TSIG key file (default `tsig.json`).
    ///
    /// # Returns
    /// A `Result` containing either the loaded `ClientConfig` or a `DnsError`.
    pub fn from_env() -> Result<Self, DnsError> {
        let nameserver = env::var("DNS_SERVER")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| DnsError::Config("DNS_SERVER env var not set".into()))?;

        let config = Self {
            nameserver,
            tsig_key_path: env::var("DNS_TSIG_KEY_FILE")
                .unwrap_or_else(|_| DEFAULT_TSIG_KEY_FILE.into())
                .into(),
        };
        info!("Using nameserver {}", config.nameserver);
        Ok(config)
    }
}
