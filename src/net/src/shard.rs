// Copyright 2026 The eau2 Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The KV shard: local-vs-remote routing for `put`/`get`/`wait_and_get`,
//! and the dispatch loop that answers the same three requests when they
//! arrive from a peer. Blocking waits use `Condvar`s rather than spinning
//! on a shared flag.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use eau2_common::{decode_message, encode_message, CodecValue, EauError, EauResult, Key, RequestKind};

use crate::directory::Directory;
use crate::kv_handle::KvHandle;
use crate::store::LocalStore;
use crate::transport::Transport;

/// `WaitAndGet`'s poll interval, both for a peer waiting on a remote value
/// and for this node's own dispatch thread waiting on a local one: a
/// bounded wake interval, woken early by a matching put when possible.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long a synchronous remote `put`/`get` call waits for its ack/reply
/// before giving up. Chosen generously since `WaitAndGet` itself may
/// legitimately block much longer and must not trip this timeout on
/// unrelated calls.
const REMOTE_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Default)]
struct ReplySlot {
    value: Mutex<Option<Option<Vec<u8>>>>,
    ready: Condvar,
}

impl ReplySlot {
    fn fulfil(&self, value: Option<Vec<u8>>) {
        let mut slot = self.value.lock().unwrap();
        *slot = Some(value);
        self.ready.notify_all();
    }

    /// Blocks until a reply lands, polling in `POLL_INTERVAL` slices so a
    /// stuck peer doesn't wedge this thread forever past `timeout`.
    fn wait(&self, timeout: Duration) -> EauResult<Option<Vec<u8>>> {
        let mut slot = self.value.lock().unwrap();
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let Some(v) = slot.take() {
                return Ok(v);
            }
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return Err(EauError::TransportClosed(0));
            }
            let wait_for = remaining.min(POLL_INTERVAL);
            let (guard, _) = self.ready.wait_timeout(slot, wait_for).unwrap();
            slot = guard;
        }
    }
}

#[derive(Default)]
struct PeerSlots {
    /// Held for the duration of one remote call, enforcing "at most one
    /// outstanding request of each kind per peer".
    put_call: Mutex<()>,
    get_call: Mutex<()>,
    waitget_call: Mutex<()>,
    put_ack: ReplySlot,
    get_reply: ReplySlot,
    waitget_reply: ReplySlot,
}

/// Owns this node's local store, its connections, the cluster directory,
/// and the outstanding-request bookkeeping for synchronous remote calls.
pub struct KvShard {
    self_index: usize,
    store: LocalStore,
    transport: Arc<Transport>,
    directory: Arc<Directory>,
    peers: Mutex<HashMap<usize, Arc<PeerSlots>>>,
    /// Notified whenever a local `put` lands, so a local `wait_and_get`
    /// wakes immediately instead of only on its next 1s poll.
    local_put_signal: Arc<(Mutex<u64>, Condvar)>,
}

impl KvShard {
    pub fn new(self_index: usize, transport: Arc<Transport>, directory: Arc<Directory>) -> Arc<Self> {
        Arc::new(Self {
            self_index,
            store: LocalStore::new(),
            transport,
            directory,
            peers: Mutex::new(HashMap::new()),
            local_put_signal: Arc::new((Mutex::new(0), Condvar::new())),
        })
    }

    fn slots_for(&self, peer: usize) -> Arc<PeerSlots> {
        self.peers
            .lock()
            .unwrap()
            .entry(peer)
            .or_insert_with(|| Arc::new(PeerSlots::default()))
            .clone()
    }

    /// Route and handle one inbound frame from `peer`. Installed as the
    /// `Transport`'s frame handler by `eau2-node`'s startup wiring.
    pub fn on_frame(self: &Arc<Self>, peer: usize, frame: Vec<u8>) {
        let text = match String::from_utf8(frame) {
            Ok(t) => t,
            Err(_) => {
                tracing::warn!(peer, "dropped non-UTF-8 frame");
                return;
            }
        };
        let msg = match decode_message(&text) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(peer, error = %e, "dropped malformed frame");
                return;
            }
        };
        match msg {
            CodecValue::Put { key, value } => self.handle_put(peer, key, value),
            CodecValue::Get { key } => self.handle_get(peer, key),
            CodecValue::WaitGet { key } => self.handle_wait_get(peer, key),
            CodecValue::Ack => self.slots_for(peer).put_ack.fulfil(None),
            CodecValue::Reply { request, value } => {
                let slots = self.slots_for(peer);
                match request {
                    RequestKind::Get => slots.get_reply.fulfil(value),
                    RequestKind::WaitGet => slots.waitget_reply.fulfil(value),
                }
            }
            other => tracing::warn!(peer, ?other, "unexpected message on shard channel"),
        }
    }

    fn handle_put(self: &Arc<Self>, peer: usize, key: Key, value: Vec<u8>) {
        let this = Arc::clone(self);
        std::thread::spawn(move || {
            if key.home != this.self_index {
                tracing::warn!(
                    key = %key,
                    expected = key.home,
                    actual = this.self_index,
                    "put arrived at the wrong home node"
                );
            }
            this.store.put(&key.name, value);
            this.signal_local_put();
            if let Err(e) = this.transport.send_to(peer, encode_message(&CodecValue::Ack).as_bytes()) {
                tracing::warn!(peer, error = %e, "failed to ack put");
            }
        });
    }

    fn handle_get(self: &Arc<Self>, peer: usize, key: Key) {
        let this = Arc::clone(self);
        std::thread::spawn(move || {
            let value = this.store.get(&key.name);
            let reply = CodecValue::Reply {
                request: RequestKind::Get,
                value,
            };
            if let Err(e) = this.transport.send_to(peer, encode_message(&reply).as_bytes()) {
                tracing::warn!(peer, error = %e, "failed to send get reply");
            }
        });
    }

    fn handle_wait_get(self: &Arc<Self>, peer: usize, key: Key) {
        let this = Arc::clone(self);
        std::thread::spawn(move || {
            let value = this.block_for_local_value(&key);
            let reply = CodecValue::Reply {
                request: RequestKind::WaitGet,
                value: Some(value),
            };
            if let Err(e) = this.transport.send_to(peer, encode_message(&reply).as_bytes()) {
                tracing::warn!(peer, error = %e, "failed to send wait_and_get reply");
            }
        });
    }

    fn signal_local_put(&self) {
        let (lock, cv) = &*self.local_put_signal;
        let mut gen = lock.lock().unwrap();
        *gen = gen.wrapping_add(1);
        cv.notify_all();
    }

    /// Poll the local store until `key` is present, waking on either a
    /// local put or the 1s fallback interval.
    fn block_for_local_value(&self, key: &Key) -> Vec<u8> {
        let (lock, cv) = &*self.local_put_signal;
        loop {
            if let Some(v) = self.store.get(&key.name) {
                return v;
            }
            let gen = lock.lock().unwrap();
            let _ = cv.wait_timeout(gen, POLL_INTERVAL).unwrap();
        }
    }

    fn put_local(&self, key: &Key, value: Vec<u8>) {
        self.store.put(&key.name, value);
        self.signal_local_put();
    }

    fn put_remote(&self, key: &Key, value: Vec<u8>) -> EauResult<()> {
        let slots = self.slots_for(key.home);
        let _guard = slots.put_call.lock().unwrap();
        let msg = CodecValue::Put {
            key: key.clone(),
            value,
        };
        self.transport
            .send_to(key.home, encode_message(&msg).as_bytes())?;
        slots.put_ack.wait(REMOTE_CALL_TIMEOUT)?;
        Ok(())
    }

    fn get_remote(&self, key: &Key) -> EauResult<Vec<u8>> {
        let slots = self.slots_for(key.home);
        let _guard = slots.get_call.lock().unwrap();
        let msg = CodecValue::Get { key: key.clone() };
        self.transport
            .send_to(key.home, encode_message(&msg).as_bytes())?;
        match slots.get_reply.wait(REMOTE_CALL_TIMEOUT)? {
            Some(bytes) => Ok(bytes),
            None => Err(EauError::KeyNotFound(key.clone())),
        }
    }

    fn wait_and_get_remote(&self, key: &Key) -> EauResult<Vec<u8>> {
        let slots = self.slots_for(key.home);
        let _guard = slots.waitget_call.lock().unwrap();
        let msg = CodecValue::WaitGet { key: key.clone() };
        self.transport
            .send_to(key.home, encode_message(&msg).as_bytes())?;
        // A wait_and_get may legitimately take much longer than the
        // ordinary remote-call timeout, since the peer is itself blocked
        // waiting for a local put; the slot wait loops in POLL_INTERVAL
        // slices internally regardless, so re-check indefinitely here.
        loop {
            match slots.waitget_reply.wait(REMOTE_CALL_TIMEOUT) {
                Ok(Some(bytes)) => return Ok(bytes),
                Ok(None) => return Ok(Vec::new()),
                Err(EauError::TransportClosed(_)) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    pub fn self_index(&self) -> usize {
        self.self_index
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }
}

impl KvHandle for KvShard {
    fn put_bytes(&self, key: &Key, value: Vec<u8>) -> EauResult<()> {
        if key.home == self.self_index {
            self.put_local(key, value);
            Ok(())
        } else {
            self.put_remote(key, value)
        }
    }

    fn get_bytes(&self, key: &Key) -> EauResult<Vec<u8>> {
        if key.home == self.self_index {
            self.store.get(&key.name).ok_or_else(|| EauError::KeyNotFound(key.clone()))
        } else {
            self.get_remote(key)
        }
    }

    fn wait_and_get_bytes(&self, key: &Key) -> EauResult<Vec<u8>> {
        if key.home == self.self_index {
            Ok(self.block_for_local_value(key))
        } else {
            self.wait_and_get_remote(key)
        }
    }
}
