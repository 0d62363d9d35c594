//! DNS zone management client library.
//!
//! This library transfers zones from a nameserver over TCP (AXFR) and sends
//! TSIG signed dynamic updates (RFC 2136). It builds and parses the DNS
//! wire format itself.

pub mod axfr;
pub mod config;
pub mod dns;
pub mod errors;
pub mod record;
pub mod transport;
pub mod tsig;
pub mod update;
pub mod utils;

// Re-export commonly used items
pub use axfr::transfer;
pub use config::ClientConfig;
pub use errors::{DnsError, Result};
pub use record::{Record, RecordClass, RecordData, RecordType, Soa};
pub use tsig::TsigKey;
pub use update::{update, UpdateOperation, UpdateSpec};
