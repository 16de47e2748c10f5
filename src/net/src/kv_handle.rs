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

//! Object-safe seam between `eau2_kv` and `eau2_net`. `Dataframe` and
//! `ChunkedColumn` call through a `&dyn KvHandle` to read and write their
//! serialized bytes instead of depending on `KvShard` directly, so this
//! crate never has to depend back on `eau2_kv` (see DESIGN.md, "cyclic
//! references").

use eau2_common::{EauResult, Key};

pub trait KvHandle: Send + Sync {
    fn put_bytes(&self, key: &Key, value: Vec<u8>) -> EauResult<()>;
    fn get_bytes(&self, key: &Key) -> EauResult<Vec<u8>>;
    fn wait_and_get_bytes(&self, key: &Key) -> EauResult<Vec<u8>>;
}
