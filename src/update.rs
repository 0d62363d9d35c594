//! Dynamic update client (RFC 2136) with TSIG signed messages.
//!
//! An update message has a single zone entry `{zone, SOA, IN}` followed by
//! the update RRs. Delete removes the RRset of the record's name and type;
//! Add deletes that RRset first and then inserts the record, so repeating
//! an Add leaves exactly one copy behind.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::dns::{parse_header, Header, MessageBuilder, Opcode, Question};
use crate::errors::{DnsError, Result};
use crate::record::{Record, RecordClass, RecordData, RecordType};
use crate::transport::send_query;
use crate::tsig::{self, TsigKey};
use crate::utils::generate_id;

/// Operation performed by an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateOperation {
    Add,
    Delete,
}

/// A caller supplied update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSpec {
    pub zone: String,
    pub operation: UpdateOperation,
    pub record: Record,
}

impl UpdateSpec {
    /// Sign this update with `key` and send it to `nameserver`.
    pub async fn apply(&self, key: &TsigKey, nameserver: &str) -> Result<Vec<u8>> {
        update(&self.zone, self.operation, &self.record, key, nameserver).await
    }
}

/// Build a signed update message, signed at the current time.
///
/// # Arguments
/// * `zone` - The zone to update.
/// * `operation` - Add or delete.
/// * `record` - The record to add, or whose RRset to delete.
/// * `key` - The TSIG key to sign with.
///
/// # Returns
/// A `Result` containing the wire message.
pub fn build_update_query(
    zone: &str,
    operation: UpdateOperation,
    record: &Record,
    key: &TsigKey,
) -> Result<Vec<u8>> {
    build_update_query_at(zone, operation, record, key, tsig::time_signed_now())
}

/// Build a signed update message with an explicit TSIG time signed.
pub fn build_update_query_at(
    zone: &str,
    operation: UpdateOperation,
    record: &Record,
    key: &TsigKey,
    time_signed: u64,
) -> Result<Vec<u8>> {
    let mut builder = MessageBuilder::new(Header {
        id: generate_id(),
        opcode: Opcode::Update,
        ..Header::default()
    });

    // zone section
    builder.start_questions()?;
    builder.question(&Question {
        name: zone.to_string(),
        qtype: RecordType::SOA,
        qclass: RecordClass::Inet,
    })?;

    // update section
    builder.start_authorities()?;
    match operation {
        UpdateOperation::Delete => delete_rrset(&mut builder, record)?,
        UpdateOperation::Add => {
            let data = add_rdata(record)?;
            delete_rrset(&mut builder, record)?;
            builder.resource(&record.name, record.rtype, RecordClass::Inet, record.ttl, data)?;
        }
    }

    let query = tsig::sign(builder, key, time_signed)?;
    debug!("update query: {}", hex::encode(&query));
    Ok(query)
}

/// Delete the RRset of the record's name and type: class ANY, TTL 0,
/// empty RDATA.
fn delete_rrset(builder: &mut MessageBuilder, record: &Record) -> Result<()> {
    builder.resource(
        &record.name,
        record.rtype,
        RecordClass::Any,
        0,
        &RecordData::empty(),
    )
}

/// RDATA for an added record. Only A records can be added.
fn add_rdata(record: &Record) -> Result<&RecordData> {
    match (record.rtype, &record.data) {
        (RecordType::A, data @ RecordData::A { .. }) => Ok(data),
        (RecordType::A, _) => Err(DnsError::Validation(format!(
            "A record {} has no address",
            record.name
        ))),
        (rtype, _) => Err(DnsError::Validation(format!(
            "adding {} records is not supported",
            rtype
        ))),
    }
}

/// Send a signed dynamic update to a nameserver.
///
/// All validation and signing happens before connecting. The server's
/// reply is returned unparsed; see [`check_update_response`].
///
/// # Arguments
/// * `zone` - The zone to update.
/// * `operation` - Add or delete.
/// * `record` - The record to add, or whose RRset to delete.
/// * `key` - The TSIG key to sign with.
/// * `nameserver` - The nameserver address as `host:port`.
///
/// # Returns
/// A `Result` containing the raw response message.
pub async fn update(
    zone: &str,
    operation: UpdateOperation,
    record: &Record,
    key: &TsigKey,
    nameserver: &str,
) -> Result<Vec<u8>> {
    let query = build_update_query(zone, operation, record, key)?;
    info!(
        "Sending {:?} of {} {} in zone {} to {}",
        operation, record.rtype, record.name, zone, nameserver
    );
    send_query(&query, nameserver).await
}

/// Check the response code of an update response.
///
/// # Returns
/// The response header, or `DnsError::Protocol` for a non-zero RCODE.
pub fn check_update_response(response: &[u8]) -> Result<Header> {
    let header = parse_header(response)?;
    header.check_rcode()?;
    Ok(header)
}
