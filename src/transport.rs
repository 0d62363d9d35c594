//! DNS over TCP transport.
//!
//! One connection per exchange: connect with a bounded timeout, write a
//! length-prefixed query, read exactly one length-prefixed reply.

use std::io;

use log::{debug, info};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::{CONNECT_TIMEOUT, MAX_MESSAGE_SIZE};
use crate::errors::{DnsError, Result};

/// Send a DNS message to a nameserver over TCP and return its reply.
///
/// # Arguments
/// * `query` - The DNS message, without length prefix.
/// * `nameserver` - The nameserver address as `host:port`.
///
/// # Returns
/// A `Result` containing the reply message (without length prefix) or an
/// error.
pub async fn send_query(query: &[u8], nameserver: &str) -> Result<Vec<u8>> {
    if query.len() > MAX_MESSAGE_SIZE {
        return Err(DnsError::Validation(format!(
            "message of {} bytes exceeds {} byte TCP frame limit",
            query.len(),
            MAX_MESSAGE_SIZE
        )));
    }

    // Write the query with a 2-byte length prefix (per DNS over TCP)
    let mut frame = Vec::with_capacity(query.len() + 2);
    frame.extend_from_slice(&(query.len() as u16).to_be_bytes());
    frame.extend_from_slice(query);
    debug!("query: {}", hex::encode(&frame));

    info!("Sending {} byte query to {}", query.len(), nameserver);
    let mut stream = match timeout(CONNECT_TIMEOUT, TcpStream::connect(nameserver)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => {
            return Err(DnsError::Connection {
                nameserver: nameserver.to_string(),
                source,
            })
        }
        Err(_) => {
            return Err(DnsError::Connection {
                nameserver: nameserver.to_string(),
                source: io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect timed out after {:?}", CONNECT_TIMEOUT),
                ),
            })
        }
    };

    stream
        .write_all(&frame)
        .await
        .map_err(transport_error(nameserver))?;

    // Read the 2-byte length prefix of the response
    let mut len_buf = [0u8; 2];
    stream
        .read_exact(&mut len_buf)
        .await
        .map_err(transport_error(nameserver))?;
    let resp_len = u16::from_be_bytes(len_buf) as usize;
    debug!("answer length: {}", resp_len);

    // Read the response
    let mut resp_buf = vec![0u8; resp_len];
    stream
        .read_exact(&mut resp_buf)
        .await
        .map_err(transport_error(nameserver))?;
    debug!("answer: {}", hex::encode(&resp_buf));

    Ok(resp_buf)
}

fn transport_error(nameserver: &str) -> impl Fn(io::Error) -> DnsError + '_ {
    move |source| DnsError::Transport {
        nameserver: nameserver.to_string(),
        source,
    }
}
