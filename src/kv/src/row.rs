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

//! The minimal row shape `Dataframe::add_row` needs: a positional cell
//! vector checked against a schema, not a general visitor/fielder
//! traversal API.

use eau2_common::{Cell, Schema};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(pub Vec<Cell>);

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self(cells)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, col: usize) -> Option<&Cell> {
        self.0.get(col)
    }

    /// Whether each cell's type (or `Missing`) agrees with `schema`'s
    /// column types, positionally.
    pub fn schema_matches(&self, schema: &Schema) -> bool {
        if self.0.len() != schema.len() {
            return false;
        }
        self.0.iter().enumerate().all(|(i, cell)| {
            let ty = schema.get(i).expect("index checked above");
            match cell.type_of() {
                None => true,
                Some(t) => t == ty,
            }
        })
    }
}

impl FromIterator<Cell> for Row {
    fn from_iter<T: IntoIterator<Item = Cell>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
