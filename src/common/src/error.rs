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

use thiserror::Error;

use crate::key::Key;

pub type EauResult<T> = Result<T, EauError>;

/// The error taxonomy for the eau2 core. Programmer-error variants
/// (`Malformed`, `TypeMismatch`, `OutOfBounds`, `Sealed`, `NotSealed`,
/// `WrongHome`) are meant to be propagated and failed fast on, never
/// silently recovered from. Transport-local variants (`PeerUnknown`,
/// `FrameTooLarge`, `TransportClosed`) close the offending connection
/// and let the node keep running.
#[derive(Error, Debug)]
pub enum EauError {
    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("index {index} out of bounds for length {len}")]
    OutOfBounds { index: usize, len: usize },

    #[error("column is sealed and can no longer accept appends")]
    Sealed,

    #[error("column is not sealed and cannot be read by index")]
    NotSealed,

    #[error("key not found: {0}")]
    KeyNotFound(Key),

    #[error("no connection to peer {0}")]
    PeerUnknown(usize),

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("connection to peer {0} closed unexpectedly")]
    TransportClosed(usize),

    #[error("message for key {key} arrived at node {actual}, but its home is node {expected}")]
    WrongHome {
        key: Key,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
