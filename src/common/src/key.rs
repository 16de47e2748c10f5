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

use std::fmt;

/// Address of a value in the cluster: a name plus the index of the node
/// responsible for storing it. Equality and hashing are structural, so a
/// `Key` is cheap to use as a map key or to clone across a message boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    pub name: String,
    pub home: usize,
}

impl Key {
    pub fn new(name: impl Into<String>, home: usize) -> Self {
        Self {
            name: name.into(),
            home,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn home(&self) -> usize {
        self.home
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.home)
    }
}
