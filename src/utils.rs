//! Utility functions for DNS operations.
//!
//! This module provides helpers for validating and encoding domain names
//! and for generating message IDs.

use crate::errors::{DnsError, Result};

/// Maximum length of a single label in octets.
pub const MAX_LABEL_LEN: usize = 63;

/// Maximum length of a domain name in wire format, including the root label.
pub const MAX_NAME_LEN: usize = 255;

/// Split a domain name into its labels, validating it on the way.
///
/// The trailing dot is optional; `"."` is the root name and has no labels.
///
/// # Arguments
/// * `name` - The domain name in presentation format.
///
/// # Returns
/// A `Result` containing the labels, or a `DnsError::Validation` naming
/// the offending domain.
pub fn name_labels(name: &str) -> Result<Vec<&str>> {
    if name.is_empty() {
        return Err(DnsError::Validation("empty domain name".into()));
    }
    if name == "." {
        return Ok(Vec::new());
    }

    let trimmed = name.strip_suffix('.').unwrap_or(name);
    let mut labels = Vec::new();
    let mut wire_len = 1; // root label

    for label in trimmed.split('.') {
        if label.is_empty() {
            return Err(DnsError::Validation(format!(
                "empty label in domain name: {}",
                name
            )));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(DnsError::Validation(format!(
                "label exceeds {} octets in domain name: {}",
                MAX_LABEL_LEN, name
            )));
        }
        if label.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control()) {
            return Err(DnsError::Validation(format!(
                "invalid character in domain name: {}",
                name
            )));
        }
        wire_len += label.len() + 1;
        labels.push(label);
    }

    if wire_len > MAX_NAME_LEN {
        return Err(DnsError::Validation(format!(
            "domain name exceeds {} octets: {}",
            MAX_NAME_LEN, name
        )));
    }

    Ok(labels)
}

/// Encode a domain name in DNS wire format, without compression.
///
/// # Arguments
/// * `name` - The domain name to encode.
///
/// # Returns
/// A `Result` containing the encoded domain name.
pub fn encode_dns_name(name: &str) -> Result<Vec<u8>> {
    let labels = name_labels(name)?;
    let mut out = Vec::with_capacity(name.len() + 2);
    for label in labels {
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0); // Null terminator
    Ok(out)
}

/// Encode a domain name in canonical wire format: uncompressed, ASCII
/// letters lowercased. Used for the TSIG signing variables.
pub fn encode_canonical_name(name: &str) -> Result<Vec<u8>> {
    let mut out = encode_dns_name(name)?;
    out.make_ascii_lowercase();
    Ok(out)
}

/// Normalize a domain name to its fully qualified presentation form.
pub fn fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}

/// Generate a fresh random message ID.
pub fn generate_id() -> u16 {
    rand::random::<u16>()
}
