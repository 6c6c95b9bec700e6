// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Control channel over the engine's API unix socket.
//!
//! A single task owns the socket and performs one request/reply exchange at a time, so
//! callers never interleave frames. A caller that gives up waiting does not abort the
//! exchange in progress. If the socket breaks (or an exchange times out, which leaves the
//! stream in an unknown state) it is dropped and re-established on the next request.

#![cfg(unix)]

use crate::codec::{FrameHeader, decode_reply, encode_request};
use crate::{ControlChannel, Reply, Request, TransportError};
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, timeout};
#[allow(unused)]
use tracing::{debug, error, info, warn};

const CALL_QUEUE_DEPTH: usize = 64;

/// Connect to the specified remote path and provide a [`UnixStream`] socket.
/// Will fail if connection does not succeed in the indicated timeout.
pub(crate) async fn connect_sock_stream(
    remote: &str,
    tout: Duration,
) -> Result<UnixStream, TransportError> {
    debug!("Connecting to dataplane at {remote}...");
    let sock = timeout(tout, UnixStream::connect(remote))
        .await
        .map_err(|_| TransportError::TimeOut)?
        .map_err(|source| {
            error!("Failed to connect to {remote}: {source}");
            TransportError::ConnectFailed {
                path: remote.to_owned(),
                source,
            }
        })?;
    debug!("Connected to {remote}");
    Ok(sock)
}

/// Receive one frame: its header and its payload
pub(crate) async fn receive_frame(
    sock: &mut UnixStream,
) -> Result<(FrameHeader, Vec<u8>), TransportError> {
    let mut head = [0u8; FrameHeader::LEN];
    read_exact(sock, &mut head).await?;
    let header = FrameHeader::decode(head);
    let mut payload = vec![0u8; header.payload_len()?];
    read_exact(sock, &mut payload).await?;
    Ok((header, payload))
}

async fn read_exact(sock: &mut UnixStream, buf: &mut [u8]) -> Result<(), TransportError> {
    match sock.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(TransportError::PeerLeft),
        Err(e) => Err(TransportError::Io(e)),
    }
}

/// Send a complete frame
pub(crate) async fn send_frame(sock: &mut UnixStream, frame: &[u8]) -> Result<(), TransportError> {
    sock.write_all(frame).await.map_err(|e| {
        error!("Failed to send frame: {e}");
        TransportError::Io(e)
    })
}

/// The state owned by the task serving a [`SocketChannel`]
struct EngineLink {
    remote: String,
    sock: Option<UnixStream>,
    timeout: Duration,
    context: u32,
}

impl EngineLink {
    async fn exchange_on(
        sock: &mut UnixStream,
        context: u32,
        request: &Request,
    ) -> Result<Reply, TransportError> {
        let expected = request.kind().msg_id();
        let frame = encode_request(context, request)?;
        send_frame(sock, &frame).await?;
        loop {
            let (header, payload) = receive_frame(sock).await?;
            if header.context != context {
                // reply to a request whose caller timed out earlier
                debug!("Discarding reply with stale context {}", header.context);
                continue;
            }
            if header.msg_id != expected {
                return Err(TransportError::UnexpectedReply {
                    expected,
                    got: header.msg_id,
                });
            }
            return decode_reply(&payload);
        }
    }

    async fn exchange(&mut self, request: &Request) -> Result<Reply, TransportError> {
        if self.sock.is_none() {
            debug!("Not connected to dataplane...");
            self.sock = Some(connect_sock_stream(&self.remote, self.timeout).await?);
        }
        let Some(sock) = self.sock.as_mut() else {
            return Err(TransportError::Closed);
        };
        self.context = self.context.wrapping_add(1);
        let context = self.context;
        debug!("Sending request (context {context}): {request}");

        let result = timeout(self.timeout, Self::exchange_on(sock, context, request))
            .await
            .unwrap_or(Err(TransportError::TimeOut));

        match &result {
            Ok(reply) => debug!("Got reply (context {context}): retval {}", reply.retval),
            Err(TransportError::EncodeError(_)) => {}
            Err(e) => {
                warn!("Got error: {e}. Disconnecting from dataplane at {}", self.remote);
                if let Some(mut sock) = self.sock.take() {
                    let _ = sock.shutdown().await;
                }
            }
        }
        result
    }
}

struct Call {
    request: Request,
    reply_tx: oneshot::Sender<Result<Reply, TransportError>>,
}

async fn serve_calls(mut link: EngineLink, mut rx: mpsc::Receiver<Call>) {
    while let Some(call) = rx.recv().await {
        let result = link.exchange(&call.request).await;
        if call.reply_tx.send(result).is_err() {
            debug!("Caller left before the reply to '{}'", call.request);
        }
    }
    info!("Control channel to {} closed", link.remote);
}

/// A [`ControlChannel`] over the engine's API socket
pub struct SocketChannel {
    remote: String,
    tx: mpsc::Sender<Call>,
}

impl SocketChannel {
    /// Connect to the engine at `remote`. Each later call must complete within `tout`.
    /// Must be called from within a tokio runtime.
    pub async fn connect(remote: &str, tout: Duration) -> Result<Self, TransportError> {
        let sock = connect_sock_stream(remote, tout).await?;
        let link = EngineLink {
            remote: remote.to_owned(),
            sock: Some(sock),
            timeout: tout,
            context: 0,
        };
        let (tx, rx) = mpsc::channel(CALL_QUEUE_DEPTH);
        tokio::spawn(serve_calls(link, rx));
        info!("Created control channel to dataplane at {remote}");
        Ok(Self {
            remote: remote.to_owned(),
            tx,
        })
    }

    #[must_use]
    pub fn remote(&self) -> &str {
        &self.remote
    }
}

#[async_trait]
impl ControlChannel for SocketChannel {
    async fn invoke(&self, request: Request) -> Result<Reply, TransportError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Call { request, reply_tx })
            .await
            .map_err(|_| TransportError::Closed)?;
        reply_rx.await.map_err(|_| TransportError::Closed)?
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{InterfaceKind, NatRole, RequestKind, retval};
    use crate::codec::{decode_request, encode_reply};
    use crate::InterfaceHandle;
    use std::net::Ipv4Addr;
    use std::path::Path;
    use tokio::net::UnixListener;
    use tokio::task::JoinHandle;
    use tracing_test::traced_test;

    /// Create a fake engine task for testing. It answers address-range requests with
    /// "value exists", creations with a fresh handle and anything else with success.
    /// If `mute` is set, it reads requests but never answers them.
    fn fake_engine(path: &Path, mute: bool) -> JoinHandle<()> {
        let listener = UnixListener::bind(path).unwrap();
        tokio::spawn(async move {
            let mut next_handle = 10;
            loop {
                let Ok((mut sock, _)) = listener.accept().await else {
                    return;
                };
                while let Ok((header, payload)) = receive_frame(&mut sock).await {
                    let request = decode_request(header.msg_id, &payload).unwrap();
                    debug!("engine got request: {request}");
                    if mute {
                        continue;
                    }
                    let reply = match request.kind() {
                        RequestKind::AddressRange => Reply::with_retval(retval::VALUE_EXIST),
                        RequestKind::CreateInterface => {
                            next_handle += 1;
                            Reply::created(InterfaceHandle::new(next_handle))
                        }
                        _ => Reply::ok(),
                    };
                    let frame = encode_reply(header.msg_id, header.context, &reply).unwrap();
                    send_frame(&mut sock, &frame).await.unwrap();
                }
            }
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    #[traced_test]
    async fn test_socket_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.sock");
        let engine = fake_engine(&path, false);

        let channel = SocketChannel::connect(path.to_str().unwrap(), Duration::from_secs(2))
            .await
            .unwrap();

        let reply = channel
            .invoke(Request::InterfaceFeature {
                is_add: true,
                handle: InterfaceHandle::new(3),
                role: NatRole::Inside,
            })
            .await
            .unwrap();
        assert_eq!(reply, Reply::ok());

        let reply = channel
            .invoke(Request::AddressRange {
                is_add: true,
                first: Ipv4Addr::new(203, 0, 113, 10),
                last: Ipv4Addr::new(203, 0, 113, 10),
                vrf_id: 0,
            })
            .await
            .unwrap();
        assert_eq!(reply.retval, retval::VALUE_EXIST);

        let reply = channel
            .invoke(Request::CreateInterface {
                kind: InterfaceKind::Memif,
                name: "memif-test".to_owned(),
            })
            .await
            .unwrap();
        assert_eq!(reply.handle, InterfaceHandle::new(11));

        engine.abort();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_calls_get_their_own_replies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.sock");
        let engine = fake_engine(&path, false);
        let channel = std::sync::Arc::new(
            SocketChannel::connect(path.to_str().unwrap(), Duration::from_secs(2))
                .await
                .unwrap(),
        );

        let mut tasks = Vec::new();
        for n in 0..16 {
            let channel = channel.clone();
            tasks.push(tokio::spawn(async move {
                channel
                    .invoke(Request::CreateInterface {
                        kind: InterfaceKind::Tap,
                        name: format!("tap{n}"),
                    })
                    .await
                    .unwrap()
                    .handle
            }));
        }
        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }
        handles.sort();
        handles.dedup();
        assert_eq!(handles.len(), 16);

        engine.abort();
    }

    #[tokio::test(flavor = "multi_thread")]
    #[traced_test]
    async fn unanswered_request_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.sock");
        let engine = fake_engine(&path, true);
        let channel = SocketChannel::connect(path.to_str().unwrap(), Duration::from_millis(100))
            .await
            .unwrap();

        let result = channel
            .invoke(Request::PortRange {
                start: 1024,
                end: 65535,
            })
            .await;
        assert!(matches!(result, Err(TransportError::TimeOut)));
        assert!(logs_contain("Disconnecting from dataplane"));

        engine.abort();
    }

    #[tokio::test]
    async fn connect_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.sock");
        let result = SocketChannel::connect(path.to_str().unwrap(), Duration::from_secs(1)).await;
        assert!(matches!(result, Err(TransportError::ConnectFailed { .. })));
    }
}
