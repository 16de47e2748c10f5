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

//! Types shared by every eau2 node: the content-addressed `Key`, the typed
//! `Cell`/`ColumnType`/`Schema` trio, the error taxonomy, and the wire/store
//! Codec built on top of them. Nothing in this crate knows about sockets,
//! threads, or chunking -- that's `eau2_kv` and `eau2_net`.

pub mod cell;
pub mod codec;
pub mod error;
pub mod key;
pub mod schema;

pub use cell::{Cell, ColumnType};
pub use codec::{
    decode, decode_chunk, decode_dataframe_meta, decode_key, decode_message, encode,
    encode_chunk, encode_dataframe_meta, encode_message, frame_len, CodecValue, ColumnMeta,
    RequestKind,
};
pub use error::{EauError, EauResult};
pub use key::Key;
pub use schema::Schema;
