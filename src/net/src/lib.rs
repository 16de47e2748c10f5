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

//! Transport, cluster directory, and the KV shard dispatch loop. Depends
//! only on `eau2_common`; `eau2_kv` depends on this crate's `KvHandle`
//! trait, never the other way around.

pub mod directory;
pub mod kv_handle;
pub mod shard;
pub mod store;
pub mod transport;

pub use directory::{accept_connections, join_cluster, ClusterConfig, Directory, DEFAULT_PORT};
pub use kv_handle::KvHandle;
pub use shard::KvShard;
pub use store::LocalStore;
pub use transport::{FrameHandler, Transport, MAX_FRAME_BYTES};
