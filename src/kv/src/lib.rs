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

//! Chunked distributed columns and the dataframe facade built on top of
//! them. Talks to the cluster only through `eau2_net`'s `KvHandle` trait,
//! never depending on `eau2_net`'s concrete `KvShard`.

pub mod chunk;
pub mod dataframe;
pub mod row;

pub use chunk::{ChunkedColumn, CHUNK_SIZE};
pub use dataframe::Dataframe;
pub use row::Row;

/// A trivial in-memory `KvHandle` used only by this crate's own tests, so
/// `ChunkedColumn`/`Dataframe` can be exercised without a real cluster.
#[cfg(test)]
pub(crate) mod testkit {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use eau2_common::{EauError, EauResult, Key};
    use eau2_net::KvHandle;

    #[derive(Default)]
    pub struct InMemoryKv {
        entries: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl KvHandle for InMemoryKv {
        fn put_bytes(&self, key: &Key, value: Vec<u8>) -> EauResult<()> {
            self.entries.lock().unwrap().insert(key.name.clone(), value);
            Ok(())
        }

        fn get_bytes(&self, key: &Key) -> EauResult<Vec<u8>> {
            self.entries
                .lock()
                .unwrap()
                .get(&key.name)
                .cloned()
                .ok_or_else(|| EauError::KeyNotFound(key.clone()))
        }

        fn wait_and_get_bytes(&self, key: &Key) -> EauResult<Vec<u8>> {
            self.get_bytes(key)
        }
    }
}
