//! TSIG message authentication (RFC 2845).
//!
//! Signing happens over the finished message without its additional
//! section, followed by the TSIG variables. The resulting MAC goes into a
//! TSIG RR that is appended as the last record of the additional section.

use std::fmt;
use std::fs;
use std::path::Path;

use base64::Engine;
use chrono::Utc;
use log::debug;
use ring::hmac;
use serde::Deserialize;

use crate::config::TSIG_FUDGE;
use crate::dns::MessageBuilder;
use crate::errors::{DnsError, Result};
use crate::record::{RecordClass, RecordData, RecordType};
use crate::utils::encode_canonical_name;

/// Time signed is a 48-bit field on the wire.
const TIME_SIGNED_MASK: u64 = 0xFFFF_FFFF_FFFF;

/// A shared TSIG key, as stored in the key file.
#[derive(Clone, Deserialize)]
pub struct TsigKey {
    /// Key name, a domain name.
    pub name: String,

    /// Algorithm name, e.g. `hmac-sha256`.
    pub algorithm: String,

    /// Base64 encoded key bits.
    pub secret: String,
}

impl fmt::Debug for TsigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TsigKey")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl TsigKey {
    pub fn new(name: impl Into<String>, algorithm: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            algorithm: algorithm.into(),
            secret: secret.into(),
        }
    }

    /// Load a key from a JSON file with `name`, `algorithm` and `secret`
    /// fields.
    ///
    /// # Arguments
    /// * `path` - Path of the key file.
    ///
    /// # Returns
    /// A `Result` containing the key or a `DnsError::Config`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DnsError::Config(format!("Failed to read TSIG key {}: {}", path.display(), e))
        })?;
        let key: TsigKey = serde_json::from_str(&content).map_err(|e| {
            DnsError::Config(format!("Invalid TSIG key file {}: {}", path.display(), e))
        })?;
        debug!("Loaded TSIG key {} ({})", key.name, key.algorithm);
        Ok(key)
    }

    /// Decode the base64 secret.
    pub fn decode_secret(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(self.secret.trim())
            .map_err(|e| DnsError::Credential(format!("invalid secret for key {}: {}", self.name, e)))
    }

    /// The HMAC algorithm named by this key.
    pub fn algorithm(&self) -> Result<Algorithm> {
        Algorithm::from_name(&self.algorithm)
    }
}

/// Supported TSIG HMAC algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    HmacSha256,
    HmacSha384,
    HmacSha512,
}

impl Algorithm {
    /// Look up an algorithm by its domain-name form (`hmac-sha256.`); the
    /// trailing dot and letter case are ignored.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim_end_matches('.').to_ascii_lowercase().as_str() {
            "hmac-sha256" => Ok(Algorithm::HmacSha256),
            "hmac-sha384" => Ok(Algorithm::HmacSha384),
            "hmac-sha512" => Ok(Algorithm::HmacSha512),
            _ => Err(DnsError::Credential(format!("unsupported TSIG algorithm: {}", name))),
        }
    }

    fn hmac_algorithm(self) -> hmac::Algorithm {
        match self {
            Algorithm::HmacSha256 => hmac::HMAC_SHA256,
            Algorithm::HmacSha384 => hmac::HMAC_SHA384,
            Algorithm::HmacSha512 => hmac::HMAC_SHA512,
        }
    }
}

/// Current UNIX time truncated to the 48-bit time signed field.
pub fn time_signed_now() -> u64 {
    Utc::now().timestamp() as u64 & TIME_SIGNED_MASK
}

/// Build the TSIG variables appended to the message for MAC computation:
/// key name, class ANY, TTL 0, algorithm name, time signed, fudge, error 0
/// and other length 0.
pub fn signing_variables(key: &TsigKey, time_signed: u64, fudge: u16) -> Result<Vec<u8>> {
    let mut vars = encode_canonical_name(&key.name)?;
    vars.extend_from_slice(&u16::from(RecordClass::Any).to_be_bytes());
    vars.extend_from_slice(&0u32.to_be_bytes()); // TTL
    vars.extend_from_slice(&encode_canonical_name(&key.algorithm)?);
    vars.extend_from_slice(&time_signed_bytes(time_signed));
    vars.extend_from_slice(&fudge.to_be_bytes());
    vars.extend_from_slice(&0u16.to_be_bytes()); // error
    vars.extend_from_slice(&0u16.to_be_bytes()); // other len
    Ok(vars)
}

/// Compute the MAC over `message` followed by the TSIG variables.
///
/// # Arguments
/// * `key` - The TSIG key.
/// * `message` - The message to sign, without any TSIG RR.
/// * `time_signed` - Signing time in seconds since the epoch.
/// * `fudge` - Permitted clock skew in seconds.
///
/// # Returns
/// A `Result` containing the MAC, or a `DnsError::Credential` when the key
/// cannot be used.
pub fn compute_mac(key: &TsigKey, message: &[u8], time_signed: u64, fudge: u16) -> Result<Vec<u8>> {
    let algorithm = key.algorithm()?;
    let secret = key.decode_secret()?;
    let vars = signing_variables(key, time_signed, fudge)?;
    debug!("tsig variables: {}", hex::encode(&vars));

    let signing_key = hmac::Key::new(algorithm.hmac_algorithm(), &secret);
    let mut context = hmac::Context::with_key(&signing_key);
    context.update(message);
    context.update(&vars);
    let mac = context.sign().as_ref().to_vec();
    debug!("mac: {}", hex::encode(&mac));
    Ok(mac)
}

/// Build the RDATA of the TSIG RR placed on the wire.
pub fn tsig_rdata(
    key: &TsigKey,
    time_signed: u64,
    fudge: u16,
    mac: &[u8],
    original_id: u16,
) -> Result<Vec<u8>> {
    let mac_len = u16::try_from(mac.len())
        .map_err(|_| DnsError::Credential(format!("MAC of {} bytes is too long", mac.len())))?;

    let mut rdata = encode_canonical_name(&key.algorithm)?;
    rdata.extend_from_slice(&time_signed_bytes(time_signed));
    rdata.extend_from_slice(&fudge.to_be_bytes());
    rdata.extend_from_slice(&mac_len.to_be_bytes());
    rdata.extend_from_slice(mac);
    rdata.extend_from_slice(&original_id.to_be_bytes());
    rdata.extend_from_slice(&0u16.to_be_bytes()); // error
    rdata.extend_from_slice(&0u16.to_be_bytes()); // other len
    Ok(rdata)
}

/// Sign a message and finish it.
///
/// The builder must not have started its additional section yet; the TSIG
/// RR becomes the only, and therefore last, additional record.
///
/// # Arguments
/// * `builder` - The message with all other sections complete.
/// * `key` - The TSIG key.
/// * `time_signed` - Signing time, see [`time_signed_now`].
///
/// # Returns
/// A `Result` containing the signed wire message.
pub fn sign(mut builder: MessageBuilder, key: &TsigKey, time_signed: u64) -> Result<Vec<u8>> {
    let time_signed = time_signed & TIME_SIGNED_MASK;
    let mac = compute_mac(key, &builder.to_bytes(), time_signed, TSIG_FUDGE)?;
    let rdata = tsig_rdata(key, time_signed, TSIG_FUDGE, &mac, builder.id())?;

    builder.start_additionals()?;
    builder.resource(
        &key.name,
        RecordType::TSIG,
        RecordClass::Any,
        0,
        &RecordData::Opaque { rdata },
    )?;
    Ok(builder.finish())
}

fn time_signed_bytes(time_signed: u64) -> [u8; 6] {
    let full = (time_signed & TIME_SIGNED_MASK).to_be_bytes();
    [full[2], full[3], full[4], full[5], full[6], full[7]]
}
