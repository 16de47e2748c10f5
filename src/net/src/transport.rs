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

//! Framing and dispatch over one TCP connection per peer: one reader
//! thread per peer rather than a single multiplexed poll loop, the
//! idiomatic `std::net` shape for a handful of long-lived connections
//! (see DESIGN.md for why this doesn't reach for `mio`).

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use eau2_common::{frame_len, EauError, EauResult};

/// One complete Codec value per write is the framing contract; this is
/// the largest frame a connection will accept before it's dropped.
pub const MAX_FRAME_BYTES: usize = 100_000;

/// How often a reader thread's blocking `read` times out to re-check the
/// shutdown flag. Small enough that `close()` returns promptly, large
/// enough to not spin.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Callback invoked with `(peer_index, frame_bytes)` for every complete
/// frame a reader thread assembles.
pub type FrameHandler = Arc<dyn Fn(usize, Vec<u8>) + Send + Sync>;

struct PeerConn {
    stream: TcpStream,
}

/// Index -> connection, plus the per-peer reader threads and a shared
/// shutdown flag. Index 0 is reserved for the rendezvous node by
/// convention, not enforced structurally here.
pub struct Transport {
    peers: Mutex<HashMap<usize, PeerConn>>,
    readers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
    on_frame: FrameHandler,
}

impl Transport {
    pub fn new(on_frame: FrameHandler) -> Self {
        Self {
            peers: Mutex::new(HashMap::new()),
            readers: Mutex::new(Vec::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
            on_frame,
        }
    }

    /// Adopt an established connection to `peer`, spawning its reader
    /// thread. Replaces any prior connection to the same index.
    pub fn register_peer(&self, peer: usize, stream: TcpStream) -> EauResult<()> {
        stream.set_read_timeout(Some(READ_POLL_INTERVAL))?;
        let reader_stream = stream.try_clone()?;
        {
            let mut peers = self.peers.lock().unwrap();
            peers.insert(peer, PeerConn { stream });
        }
        let shutdown = Arc::clone(&self.shutdown);
        let on_frame = Arc::clone(&self.on_frame);
        let handle = thread::Builder::new()
            .name(format!("eau2-reader-{}", peer))
            .spawn(move || read_loop(peer, reader_stream, shutdown, on_frame))
            .map_err(EauError::Io)?;
        self.readers.lock().unwrap().push(handle);
        Ok(())
    }

    pub fn has_peer(&self, peer: usize) -> bool {
        self.peers.lock().unwrap().contains_key(&peer)
    }

    pub fn send_to(&self, peer: usize, frame: &[u8]) -> EauResult<()> {
        if frame.len() > MAX_FRAME_BYTES {
            return Err(EauError::FrameTooLarge {
                len: frame.len(),
                max: MAX_FRAME_BYTES,
            });
        }
        let mut peers = self.peers.lock().unwrap();
        let conn = peers.get_mut(&peer).ok_or(EauError::PeerUnknown(peer))?;
        conn.stream.write_all(frame).map_err(EauError::Io)
    }

    pub fn broadcast(&self, frame: &[u8]) -> EauResult<()> {
        if frame.len() > MAX_FRAME_BYTES {
            return Err(EauError::FrameTooLarge {
                len: frame.len(),
                max: MAX_FRAME_BYTES,
            });
        }
        let mut peers = self.peers.lock().unwrap();
        for (idx, conn) in peers.iter_mut() {
            if let Err(e) = conn.stream.write_all(frame) {
                tracing::warn!(peer = idx, error = %e, "broadcast write failed");
            }
        }
        Ok(())
    }

    /// Signal every reader thread to stop and join them. Connections are
    /// dropped (and thus closed) once their `PeerConn` entry is removed.
    pub fn close(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut self.readers.lock().unwrap());
        for h in handles {
            let _ = h.join();
        }
        self.peers.lock().unwrap().clear();
    }
}

fn read_loop(peer: usize, mut stream: TcpStream, shutdown: Arc<AtomicBool>, on_frame: FrameHandler) {
    let mut scratch: Vec<u8> = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        match stream.read(&mut buf) {
            Ok(0) => {
                tracing::debug!(peer, "connection closed by peer");
                return;
            }
            Ok(n) => {
                if scratch.len() + n > MAX_FRAME_BYTES {
                    tracing::warn!(peer, "frame exceeded max size, dropping connection");
                    return;
                }
                scratch.extend_from_slice(&buf[..n]);
                while let Some((frame, rest)) = split_one_frame(&scratch) {
                    on_frame(peer, frame);
                    scratch = rest;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                continue;
            }
            Err(e) => {
                tracing::debug!(peer, error = %e, "reader thread exiting");
                return;
            }
        }
    }
}

/// The longest leading slice of `scratch` that is valid UTF-8. A chunk
/// boundary can land inside a multi-byte character; the remainder just
/// waits for more bytes on the next read.
fn valid_utf8_prefix(scratch: &[u8]) -> &str {
    match std::str::from_utf8(scratch) {
        Ok(s) => s,
        Err(e) => std::str::from_utf8(&scratch[..e.valid_up_to()]).unwrap(),
    }
}

/// Pull the first complete frame off the front of `scratch`, if one is
/// complete. Asks the Codec's own grammar where the value ends instead of
/// counting braces -- a raw string may legally contain a `{`, so naive
/// brace-depth counting can't find the true end of a value that contains
/// one.
fn split_one_frame(scratch: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
    let text = valid_utf8_prefix(scratch);
    let len = frame_len(text).ok()?;
    let frame = scratch[..len].to_vec();
    let rest = scratch[len..].to_vec();
    Some((frame, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_a_single_complete_frame() {
        let input = b"{type: ack}".to_vec();
        let (frame, rest) = split_one_frame(&input).unwrap();
        assert_eq!(frame, input);
        assert!(rest.is_empty());
    }

    #[test]
    fn splits_two_concatenated_frames() {
        let input = b"{type: ack}{type: ack}".to_vec();
        let (frame, rest) = split_one_frame(&input).unwrap();
        assert_eq!(frame, b"{type: ack}");
        let (frame2, rest2) = split_one_frame(&rest).unwrap();
        assert_eq!(frame2, b"{type: ack}");
        assert!(rest2.is_empty());
    }

    #[test]
    fn returns_none_on_partial_frame() {
        let input = b"{type: key, name: a".to_vec();
        assert!(split_one_frame(&input).is_none());
    }

    #[test]
    fn handles_nested_braces() {
        let input = b"{type: put, key: {type: key, name: a, home: 0}, value: {type: ack}}".to_vec();
        let (frame, rest) = split_one_frame(&input).unwrap();
        assert_eq!(frame, input);
        assert!(rest.is_empty());
    }

    #[test]
    fn string_value_may_contain_an_unmatched_brace() {
        let input = b"{type: string, value: a{b}{type: ack}".to_vec();
        let (frame, rest) = split_one_frame(&input).unwrap();
        assert_eq!(frame, b"{type: string, value: a{b}");
        assert_eq!(rest, b"{type: ack}");
    }
}
