//! Error types for the zone client.
//!
//! This module defines the error types used throughout the message codec,
//! the transport and the zone transfer / dynamic update clients.

use std::io;
use thiserror::Error;

use crate::dns::Rcode;

/// Result alias used by every fallible operation in the crate.
pub type Result<T> = std::result::Result<T, DnsError>;

/// Represents errors that can occur while talking to a nameserver.
#[derive(Error, Debug)]
pub enum DnsError {
    /// Malformed zone or record name, or an update that cannot be encoded.
    /// Raised before any network I/O.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The TCP connection could not be established within the timeout.
    #[error("Connection error ({nameserver}): {source}")]
    Connection {
        nameserver: String,
        #[source]
        source: io::Error,
    },

    /// Failure while writing the query or reading the reply, including
    /// replies shorter than their declared length.
    #[error("Transport error ({nameserver}): {source}")]
    Transport {
        nameserver: String,
        #[source]
        source: io::Error,
    },

    /// Malformed DNS wire data.
    #[error("Invalid DNS packet: {0}")]
    Format(String),

    /// The server answered with a non-zero response code.
    #[error("DNS error (rcode {}): {}", .0.code(), .0.description())]
    Protocol(Rcode),

    /// The TSIG key could not be used.
    #[error("Credential error: {0}")]
    Credential(String),

    /// Configuration errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DnsError {
    /// Shorthand for a [`DnsError::Format`] pinned to a byte offset.
    pub(crate) fn format_at(offset: usize, message: impl AsRef<str>) -> Self {
        DnsError::Format(format!("{} at offset {}", message.as_ref(), offset))
    }
}
