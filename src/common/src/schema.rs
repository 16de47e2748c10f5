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

use crate::cell::ColumnType;

/// An ordered sequence of column type tags. Row/column name maps are an
/// external concern; the core only ever addresses columns positionally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema(Vec<ColumnType>);

impl Schema {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, ty: ColumnType) {
        self.0.push(ty);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, col: usize) -> Option<ColumnType> {
        self.0.get(col).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = ColumnType> + '_ {
        self.0.iter().copied()
    }

    /// Human-readable `"IBFS"`-style tag string, used only in log lines and
    /// diagnostics -- not part of the wire format.
    pub fn to_tag_string(&self) -> String {
        self.0.iter().map(|t| t.tag()).collect()
    }

    pub fn from_tag_string(s: &str) -> Option<Self> {
        s.chars().map(ColumnType::from_tag).collect::<Option<Vec<_>>>().map(Schema)
    }
}

impl FromIterator<ColumnType> for Schema {
    fn from_iter<T: IntoIterator<Item = ColumnType>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
