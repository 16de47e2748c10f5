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

//! A node's local key/value store: the bytes a `KvShard` holds
//! for keys whose home is this node. Lives in `eau2_net` rather than
//! `eau2_kv` so `KvShard` can own one without creating a dependency cycle
//! (`eau2_kv` depends on `eau2_net`'s `KvHandle` trait, not the other way
//! around -- see DESIGN.md).
//!
//! `std::sync::Mutex` rather than `parking_lot::Mutex`: nothing else in
//! this workspace is on a tokio runtime or otherwise needs `parking_lot`'s
//! fairness/perf properties, so pulling it in for this one struct would be
//! an isolated dependency with no other user.

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct LocalStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: &str, value: Vec<u8>) {
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }
}
