//! Zone transfer (AXFR) client.

use log::{info, warn};

use crate::dns::{parse_header, parse_message, Header, Message, MessageBuilder, Question};
use crate::errors::Result;
use crate::record::{Record, RecordClass, RecordType};
use crate::transport::send_query;
use crate::utils::generate_id;

/// Build an AXFR query for a zone.
///
/// # Arguments
/// * `zone` - The zone to transfer.
///
/// # Returns
/// A `Result` containing the query, or a `DnsError::Validation` when the
/// zone name is malformed.
pub fn build_axfr_query(zone: &str) -> Result<Vec<u8>> {
    Ok(axfr_builder(zone)?.finish())
}

fn axfr_builder(zone: &str) -> Result<MessageBuilder> {
    let mut builder = MessageBuilder::new(Header {
        id: generate_id(),
        ..Header::default()
    });
    builder.enable_compression();
    builder.start_questions()?;
    builder.question(&Question {
        name: zone.to_string(),
        qtype: RecordType::AXFR,
        qclass: RecordClass::Inet,
    })?;
    Ok(builder)
}

/// Decode the answer section of a zone transfer response.
///
/// Records are returned in wire order. A non-zero response code is
/// reported as `DnsError::Protocol`.
pub fn records_from_response(response: &[u8]) -> Result<Vec<Record>> {
    Ok(decode_response(response)?.answers)
}

/// The RCODE is checked on the header alone, so an error reply with an
/// abbreviated body still reports the server's failure.
fn decode_response(response: &[u8]) -> Result<Message> {
    parse_header(response)?.check_rcode()?;
    parse_message(response)
}

/// Transfer a zone from a nameserver.
///
/// # Arguments
/// * `zone` - The zone to transfer.
/// * `nameserver` - The nameserver address as `host:port`.
///
/// # Returns
/// A `Result` containing every answer record of the transfer, in the order
/// the server sent them.
pub async fn transfer(zone: &str, nameserver: &str) -> Result<Vec<Record>> {
    let builder = axfr_builder(zone)?;
    let id = builder.id();
    let query = builder.finish();

    info!("Requesting zone transfer of {} from {}", zone, nameserver);
    let response = send_query(&query, nameserver).await?;

    let message = decode_response(&response)?;
    if message.header.id != id {
        warn!(
            "Zone transfer response ID {:04x} does not match query ID {:04x}",
            message.header.id, id
        );
    }
    info!("Received {} records for {}", message.answers.len(), zone);
    Ok(message.answers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{Opcode, Rcode};
    use crate::errors::DnsError;

    #[test]
    fn axfr_query_has_single_question() {
        let query = build_axfr_query("example.com.").unwrap();
        let message = parse_message(&query).unwrap();

        assert!(!message.header.response);
        assert_eq!(message.header.opcode, Opcode::Query);
        assert_eq!(message.header.qdcount, 1);
        assert_eq!(message.header.ancount + message.header.nscount + message.header.arcount, 0);
        assert_eq!(message.questions.len(), 1);

        let question = &message.questions[0];
        assert_eq!(question.name, "example.com.");
        assert_eq!(u16::from(question.qtype), 252);
        assert_eq!(u16::from(question.qclass), 1);
    }

    #[test]
    fn malformed_zone_is_validation_error() {
        assert!(matches!(build_axfr_query("bad..zone."), Err(DnsError::Validation(_))));
        assert!(matches!(build_axfr_query(""), Err(DnsError::Validation(_))));
    }

    #[test]
    fn error_rcode_wins_over_missing_body() {
        // claims a question but carries none
        let response = Header {
            response: true,
            rcode: Rcode::NotAuth,
            qdcount: 1,
            ..Header::default()
        }
        .to_bytes();

        assert!(matches!(
            records_from_response(&response),
            Err(DnsError::Protocol(Rcode::NotAuth))
        ));
    }

    #[test]
    fn truncated_success_response_is_format_error() {
        let response = Header {
            response: true,
            qdcount: 1,
            ..Header::default()
        }
        .to_bytes();
        assert!(matches!(records_from_response(&response), Err(DnsError::Format(_))));
        assert!(matches!(records_from_response(&response[..6]), Err(DnsError::Format(_))));
    }

    #[test]
    fn query_ids_are_random() {
        let ids: std::collections::HashSet<[u8; 2]> = (0..32)
            .map(|_| {
                let query = build_axfr_query("example.com.").unwrap();
                [query[0], query[1]]
            })
            .collect();
        assert!(ids.len() > 1);
    }
}
