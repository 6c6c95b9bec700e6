// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! In-memory engine for tests.

use crate::api::retval;
use crate::{ControlChannel, InterfaceHandle, Reply, Request, RequestKind, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::time::Duration;

type Matcher = Box<dyn Fn(&Request) -> bool + Send + Sync>;

struct Engine {
    requests: Vec<Request>,
    replies: Vec<(Matcher, i32)>,
    interfaces: BTreeSet<InterfaceHandle>,
    next_handle: u32,
    connected: bool,
    delay: Option<Duration>,
}

/// A [`ControlChannel`] that records every request and answers like a healthy engine:
/// creations get fresh handles (starting at 1), deletions of unknown interfaces get
/// "invalid interface" and everything else succeeds. Specific status codes can be forced
/// with [`RecordingChannel::reply_with`].
pub struct RecordingChannel {
    engine: Mutex<Engine>,
}

impl Default for RecordingChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingChannel {
    #[must_use]
    pub fn new() -> Self {
        Self {
            engine: Mutex::new(Engine {
                requests: Vec::new(),
                replies: Vec::new(),
                interfaces: BTreeSet::new(),
                next_handle: 1,
                connected: true,
                delay: None,
            }),
        }
    }

    /// Answer requests matching `matcher` with status `retval`, until cleared
    pub fn reply_with<F>(&self, matcher: F, retval: i32)
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.engine.lock().replies.push((Box::new(matcher), retval));
    }

    /// Forget the status codes forced so far
    pub fn clear_replies(&self) {
        self.engine.lock().replies.clear();
    }

    /// Make every subsequent request fail at the transport level
    pub fn disconnect(&self) {
        self.engine.lock().connected = false;
    }

    pub fn reconnect(&self) {
        self.engine.lock().connected = true;
    }

    /// Delay every subsequent reply
    pub fn set_delay(&self, delay: Duration) {
        self.engine.lock().delay = Some(delay);
    }

    /// The requests that reached the engine, in order
    #[must_use]
    pub fn requests(&self) -> Vec<Request> {
        self.engine.lock().requests.clone()
    }

    /// Number of requests of the given kind that reached the engine
    #[must_use]
    pub fn count(&self, kind: RequestKind) -> usize {
        self.count_matching(|r| r.kind() == kind)
    }

    #[must_use]
    pub fn count_matching<F: Fn(&Request) -> bool>(&self, matcher: F) -> usize {
        self.engine
            .lock()
            .requests
            .iter()
            .filter(|r| matcher(r))
            .count()
    }

    pub fn clear_requests(&self) {
        self.engine.lock().requests.clear();
    }

    /// The interfaces that currently exist
    #[must_use]
    pub fn interfaces(&self) -> Vec<InterfaceHandle> {
        self.engine.lock().interfaces.iter().copied().collect()
    }

    fn answer(&self, request: Request) -> Result<Reply, TransportError> {
        let mut engine = self.engine.lock();
        if !engine.connected {
            return Err(TransportError::PeerLeft);
        }
        let forced = engine
            .replies
            .iter()
            .find(|(matcher, _)| matcher(&request))
            .map(|(_, retval)| *retval);
        engine.requests.push(request.clone());
        if let Some(retval) = forced {
            return Ok(Reply::with_retval(retval));
        }
        let reply = match request {
            Request::CreateInterface { .. } => {
                let handle = InterfaceHandle::new(engine.next_handle);
                engine.next_handle += 1;
                engine.interfaces.insert(handle);
                Reply::created(handle)
            }
            Request::DeleteInterface { handle } => {
                if engine.interfaces.remove(&handle) {
                    Reply::ok()
                } else {
                    Reply::with_retval(retval::INVALID_SW_IF_INDEX)
                }
            }
            _ => Reply::ok(),
        };
        Ok(reply)
    }
}

#[async_trait]
impl ControlChannel for RecordingChannel {
    async fn invoke(&self, request: Request) -> Result<Reply, TransportError> {
        let delay = self.engine.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.answer(request)
    }
}
