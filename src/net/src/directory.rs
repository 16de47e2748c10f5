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

//! Cluster directory and the three-step registration handshake: a joining
//! node dials the rendezvous node, learns the full peer set, then dials
//! every peer it was just told about. Built over owned `TcpStream`s and
//! `EauError`.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use eau2_common::{decode_message, encode_message, frame_len, CodecValue, EauError, EauResult};

use crate::transport::Transport;

/// Default port every node listens on, overridable per node via
/// `--addr`.
pub const DEFAULT_PORT: u16 = 8080;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_millis(3_200);
const MAX_ATTEMPTS: u32 = 10;

/// The cluster's fixed size and each node's listen address, known at
/// startup; `N` is fixed once the cluster starts.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub n: usize,
    pub addrs: Vec<SocketAddr>,
}

impl ClusterConfig {
    /// `127.0.0.(i+1):port` for every node, the original's loopback
    /// convention, used unless a caller overrides specific
    /// indices.
    pub fn loopback(n: usize, port: u16) -> Self {
        let addrs = (0..n)
            .map(|i| SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, (i + 1) as u8)), port))
            .collect();
        Self { n, addrs }
    }

    pub fn with_overrides(mut self, overrides: &HashMap<usize, SocketAddr>) -> Self {
        for (&idx, &addr) in overrides {
            if idx < self.addrs.len() {
                self.addrs[idx] = addr;
            }
        }
        self
    }

    pub fn addr_of(&self, idx: usize) -> Option<SocketAddr> {
        self.addrs.get(idx).copied()
    }
}

/// The mutable index -> address map a node accumulates as peers register.
#[derive(Default)]
pub struct Directory {
    entries: Mutex<HashMap<usize, SocketAddr>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, idx: usize, addr: SocketAddr) {
        self.entries.lock().unwrap().insert(idx, addr);
    }

    pub fn get(&self, idx: usize) -> Option<SocketAddr> {
        self.entries.lock().unwrap().get(&idx).copied()
    }

    pub fn snapshot(&self) -> Vec<(usize, SocketAddr)> {
        let mut v: Vec<(usize, SocketAddr)> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|(&i, &a)| (i, a))
            .collect();
        v.sort_by_key(|&(i, _)| i);
        v
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read one complete frame off `stream`, blocking until it arrives. Asks
/// the Codec where the value ends rather than counting braces -- a raw
/// string may legally contain a `{`, which a brace counter can't tell
/// apart from a structural one.
fn read_one_frame(stream: &mut TcpStream) -> EauResult<Vec<u8>> {
    let mut scratch = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = stream.read(&mut buf).map_err(EauError::Io)?;
        if n == 0 {
            return Err(EauError::TransportClosed(0));
        }
        scratch.extend_from_slice(&buf[..n]);
        let text = match std::str::from_utf8(&scratch) {
            Ok(s) => s,
            Err(e) => std::str::from_utf8(&scratch[..e.valid_up_to()]).unwrap(),
        };
        if let Ok(len) = frame_len(text) {
            return Ok(scratch[..len].to_vec());
        }
    }
}

fn dial_with_backoff(addr: SocketAddr) -> EauResult<TcpStream> {
    let mut backoff = INITIAL_BACKOFF;
    let mut last_err = None;
    for attempt in 0..MAX_ATTEMPTS {
        match TcpStream::connect(addr) {
            Ok(s) => return Ok(s),
            Err(e) => {
                tracing::debug!(%addr, attempt, error = %e, "dial failed, retrying");
                last_err = Some(e);
                thread::sleep(backoff);
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
    Err(EauError::Io(last_err.unwrap()))
}

/// Joining-peer side of the handshake: dial the
/// rendezvous node (index 0), send `Register`, read back `Directory`,
/// then dial every other peer it names and adopt the connections into
/// `transport`. Populates `directory` in place.
pub fn join_cluster(
    self_index: usize,
    cluster: &ClusterConfig,
    transport: &Transport,
    directory: &Directory,
) -> EauResult<()> {
    if self_index == 0 {
        directory.insert(0, cluster.addrs[0]);
        return Ok(());
    }

    let rendezvous_addr = cluster.addrs[0];
    let mut stream = dial_with_backoff(rendezvous_addr)?;
    let self_addr = cluster.addrs[self_index];
    let register = CodecValue::Register {
        address: self_addr.to_string(),
        sender: self_index as u64,
    };
    stream
        .write_all(encode_message(&register).as_bytes())
        .map_err(EauError::Io)?;

    let frame = read_one_frame(&mut stream)?;
    let text = String::from_utf8(frame)
        .map_err(|_| EauError::Malformed("registration reply was not UTF-8".into()))?;
    let reply = decode_message(&text)?;
    let (addresses, indices) = match reply {
        CodecValue::Directory { addresses, indices } => (addresses, indices),
        other => {
            return Err(EauError::Malformed(format!(
                "expected a directory reply, got {:?}",
                other
            )))
        }
    };

    transport.register_peer(0, stream)?;
    directory.insert(0, rendezvous_addr);
    directory.insert(self_index, self_addr);

    for (addr_str, idx) in addresses.iter().zip(indices.iter()) {
        let idx = *idx as usize;
        if idx == 0 || idx == self_index {
            continue;
        }
        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|_| EauError::Malformed(format!("invalid peer address: {}", addr_str)))?;
        directory.insert(idx, addr);
        if !transport.has_peer(idx) {
            dial_and_announce(idx, addr, self_index, self_addr, transport)?;
        }
    }

    Ok(())
}

/// Dial a mesh peer directly (not the rendezvous) and announce this
/// node's identity over the new connection with a `Register` frame, so
/// the peer's accept loop knows which index just connected without going
/// through the rendezvous handshake again.
fn dial_and_announce(
    peer_idx: usize,
    peer_addr: SocketAddr,
    self_index: usize,
    self_addr: SocketAddr,
    transport: &Transport,
) -> EauResult<()> {
    let mut stream = dial_with_backoff(peer_addr)?;
    let register = CodecValue::Register {
        address: self_addr.to_string(),
        sender: self_index as u64,
    };
    stream
        .write_all(encode_message(&register).as_bytes())
        .map_err(EauError::Io)?;
    transport.register_peer(peer_idx, stream)?;
    Ok(())
}

/// Every node's accept loop. Node 0 (the rendezvous) additionally replies
/// with the full directory to the new peer over this same connection;
/// it does not forward that directory to peers already registered --
/// each of those learns of the newcomer on its own, when the newcomer's
/// `dial_and_announce` reaches it directly. Any other node just adopts
/// the connection, since a direct mesh dial already carries the full
/// picture.
pub fn accept_connections(
    self_index: usize,
    listener: &TcpListener,
    directory: &Directory,
    transport: &Transport,
) -> EauResult<()> {
    for incoming in listener.incoming() {
        let mut stream = incoming.map_err(EauError::Io)?;
        let frame = read_one_frame(&mut stream)?;
        let text = String::from_utf8(frame)
            .map_err(|_| EauError::Malformed("register frame was not UTF-8".into()))?;
        let msg = decode_message(&text)?;
        let (address, sender) = match msg {
            CodecValue::Register { address, sender } => (address, sender),
            other => {
                tracing::warn!(?other, "expected register, ignoring connection");
                continue;
            }
        };
        let peer_addr: SocketAddr = address
            .parse()
            .map_err(|_| EauError::Malformed(format!("invalid peer address: {}", address)))?;
        let peer_idx = sender as usize;
        directory.insert(peer_idx, peer_addr);

        if self_index == 0 {
            let snapshot = directory.snapshot();
            let reply = CodecValue::Directory {
                addresses: snapshot.iter().map(|(_, a)| a.to_string()).collect(),
                indices: snapshot.iter().map(|(i, _)| *i as u64).collect(),
            };
            stream
                .write_all(encode_message(&reply).as_bytes())
                .map_err(EauError::Io)?;
            transport.register_peer(peer_idx, stream)?;
        } else {
            transport.register_peer(peer_idx, stream)?;
        }
    }
    Ok(())
}
