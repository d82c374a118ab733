//! Connection handling for individual client connections
//!
//! Messages are newline-terminated. A message may carry several
//! `;`-delimited commands and produces one response line per command.

use super::Server;
use super::handler;
use crate::ProtocolError;
use crate::protocol::ResponseWriter;
use bytes::BytesMut;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::OwnedSemaphorePermit;
use tracing::debug;

/// Handle a single client connection
pub async fn handle(
    server: Arc<Server>,
    mut stream: TcpStream,
    _permit: OwnedSemaphorePermit,
) -> anyhow::Result<()> {
    let result = serve(&server, &mut stream).await;
    server.metrics.active_connections.dec();
    result
}

async fn serve(server: &Server, stream: &mut TcpStream) -> anyhow::Result<()> {
    let mut read_buf = BytesMut::with_capacity(server.config.read_buffer_size);
    let mut response = ResponseWriter::new(server.config.read_buffer_size);
    // Set while skipping the rest of an oversized message
    let mut discarding = false;

    loop {
        tokio::select! {
            _ = server.cancel_token.cancelled() => {
                break;
            }
            result = stream.read_buf(&mut read_buf) => {
                match result {
                    Ok(0) => {
                        // Peer closed its write side; serve a trailing unterminated message
                        if !discarding && !read_buf.trim_ascii().is_empty() {
                            let message = read_buf.split();
                            handler::execute_message(server, &message, &mut response).await;
                            // The peer may already be fully gone
                            let _ = write_response(server, stream, &mut response).await;
                        }
                        break;
                    }
                    Ok(n) => {
                        server.metrics.bytes_read.inc_by(n as u64);
                        process_messages(server, &mut read_buf, &mut response, &mut discarding).await;
                        write_response(server, stream, &mut response).await?;
                    }
                    Err(e) => {
                        debug!("Read error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Execute every complete message in the buffer, leaving a partial one in place
async fn process_messages(
    server: &Server,
    read_buf: &mut BytesMut,
    response: &mut ResponseWriter,
    discarding: &mut bool,
) {
    let limit = server.config.max_message_size;

    while let Some(pos) = find_newline(read_buf) {
        let line = read_buf.split_to(pos + 1);
        if *discarding {
            *discarding = false;
        } else if pos > limit {
            reject_oversized(server, response);
        } else {
            handler::execute_message(server, &line[..pos], response).await;
        }
    }

    if read_buf.len() > limit {
        if !*discarding {
            reject_oversized(server, response);
            *discarding = true;
        }
        read_buf.clear();
    }
}

fn reject_oversized(server: &Server, response: &mut ResponseWriter) {
    server.metrics.protocol_errors.inc();
    response.protocol_error(&ProtocolError::MessageTooLarge(
        server.config.max_message_size,
    ));
}

async fn write_response(
    server: &Server,
    stream: &mut TcpStream,
    response: &mut ResponseWriter,
) -> std::io::Result<()> {
    if response.is_empty() {
        return Ok(());
    }
    let buf = response.take();
    server.metrics.bytes_written.inc_by(buf.len() as u64);
    stream.write_all(&buf).await
}

/// Find the message terminator using SIMD-accelerated search
#[inline]
fn find_newline(buf: &[u8]) -> Option<usize> {
    memchr::memchr(b'\n', buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_newline() {
        assert_eq!(find_newline(b"GET a\n"), Some(5));
        assert_eq!(find_newline(b"GET a\r\nSET b 1\n"), Some(6));
        assert_eq!(find_newline(b"GET a"), None);
        assert_eq!(find_newline(b""), None);
    }
}
