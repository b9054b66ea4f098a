// Copyright 2023, Antoine Catton
//
// Permission to use, copy, modify, and/or distribute this software for any purpose with or without
// fee is hereby granted, provided that the above copyright notice and this permission notice
// appear in all copies.
//
// THE SOFTWARE IS PROVIDED “AS IS” AND THE AUTHOR DISCLAIMS ALL WARRANTIES WITH REGARD TO THIS
// SOFTWARE INCLUDING ALL IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS. IN NO EVENT SHALL THE
// AUTHOR BE LIABLE FOR ANY SPECIAL, DIRECT, INDIRECT, OR CONSEQUENTIAL DAMAGES OR ANY DAMAGES
// WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN ACTION OF CONTRACT,
// NEGLIGENCE OR OTHER TORTIOUS ACTION, ARISING OUT OF OR IN CONNECTION WITH THE USE OR PERFORMANCE
// OF THIS SOFTWARE.

//! Per-connection read→decode→execute→encode→write cycle.

use std::sync::Arc;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::error::ProtocolError;
use crate::executor::Executor;
use crate::protocol::{self, DecodeOutcome};

/// Runs the session loop for one accepted connection until the client
/// disconnects, a protocol error occurs, or shutdown is requested.
///
/// Replies are written and flushed per-request to preserve request/response
/// pairing; pipelining still works because the decoder can already have
/// buffered several commands ahead of the first flushed reply.
pub async fn run(executor: Arc<Executor>, stream: TcpStream) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    log::info!("client connected: {peer}");

    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        match protocol::decode_command(&mut reader).await {
            Ok(DecodeOutcome::Eof) => {
                log::info!("client disconnected: {peer}");
                break;
            }
            Ok(DecodeOutcome::Command(command)) => {
                match executor.execute(&command) {
                    Ok(reply) => {
                        let bytes = protocol::encode_reply(&reply);
                        if write_reply_bytes(&mut write_half, &bytes).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        let bytes = protocol::encode_error(&err.message);
                        if write_reply_bytes(&mut write_half, &bytes).await.is_err() {
                            break;
                        }
                    }
                }
            }
            Err(ProtocolError::IncompleteRead) => {
                log::info!("client disconnected mid-frame: {peer}");
                break;
            }
            Err(err) => {
                log::warn!("protocol error from {peer}: {err}");
                break;
            }
        }
    }

    if let Err(err) = write_half.shutdown().await {
        log::debug!("error shutting down write half for {peer}: {err}");
    }
    log::info!("connection closed: {peer}");
}

async fn write_reply_bytes<W>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::expiry::ExpiryEngine;
    use crate::store::Store;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn spawn_server() -> (std::net::SocketAddr, Arc<Executor>) {
        let store = Arc::new(Store::new());
        let clock: Arc<dyn crate::clock::Clock> = Arc::new(SystemClock);
        let expiry = Arc::new(ExpiryEngine::new(store.clone(), clock.clone()));
        let executor = Arc::new(Executor::new(store, expiry, clock));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let executor_for_task = executor.clone();
        tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                run(executor_for_task, stream).await;
            }
        });
        (addr, executor)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ping_pong_round_trip() {
        let (addr, _executor) = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"*1\r\n$4\r\nPING\r\n")
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"+PONG\r\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pipeline_preserves_order() {
        let (addr, _executor) = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let payload = b"*2\r\n$4\r\nINCR\r\n$1\r\nc\r\n".repeat(3);
        stream.write_all(&payload).await.unwrap();

        let mut buf = vec![0u8; 128];
        let mut total = Vec::new();
        while total.len() < b":1\r\n:2\r\n:3\r\n".len() {
            let n = stream.read(&mut buf).await.unwrap();
            total.extend_from_slice(&buf[..n]);
        }
        assert_eq!(total, b":1\r\n:2\r\n:3\r\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_command_keeps_connection_open() {
        let (addr, _executor) = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"*1\r\n$3\r\nFOO\r\n").await.unwrap();

        let mut buf = [0u8; 128];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"-ERR unknown command 'FOO'\r\n");

        // connection should still be open
        stream.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"+PONG\r\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_frame_closes_connection() {
        let (addr, _executor) = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"+HELLO\r\n").await.unwrap();

        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(n, 0, "server must close without replying");
    }
}
