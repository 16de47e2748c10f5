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

//! A chunked distributed column: an `Open` builder that seals into a
//! sequence of immutable, independently-fetchable chunks once full.
//! `get` keeps a single resident chunk cached, evicting it on an index
//! mismatch and installing the fetched chunk on a miss.

use std::sync::Arc;
use std::sync::Mutex;

use eau2_common::{
    decode_chunk, encode_chunk, Cell, CodecValue, ColumnType, EauError, EauResult, Key,
};
use eau2_net::KvHandle;

/// Default chunk size. Overridable per dataframe (and thus
/// per column) via `ChunkedColumn::with_chunk_size` / `Dataframe`'s
/// `NodeConfig`-driven override, so test scenarios wanting a small chunk
/// (`CHUNK_SIZE=4`) can exercise chunk-boundary behavior cheaply.
pub const CHUNK_SIZE: usize = 1024;

enum State {
    Open(Vec<Cell>),
    Sealed { length: usize, chunk_keys: Vec<Key> },
}

/// A single column of a `Dataframe`, keyed for chunk storage by the
/// owning dataframe's key and this column's position.
pub struct ChunkedColumn {
    column_key: Key,
    col_idx: usize,
    ty: ColumnType,
    chunk_size: usize,
    state: Mutex<State>,
    /// The one chunk index currently materialized in memory, alongside its
    /// cells -- the "single resident chunk" cache.
    cache: Mutex<Option<(usize, Vec<Cell>)>>,
}

fn chunk_key(column_key: &Key, col_idx: usize, chunk_idx: usize) -> Key {
    Key::new(
        format!("{}-c{}-{}", column_key.name(), col_idx, chunk_idx),
        column_key.home(),
    )
}

fn cells_to_chunk_value(ty: ColumnType, cells: &[Cell]) -> EauResult<CodecValue> {
    Ok(match ty {
        ColumnType::Int => CodecValue::chunk_ints(
            ty,
            cells
                .iter()
                .map(|c| {
                    c.as_i32().ok_or(EauError::TypeMismatch {
                        expected: "int",
                        found: "other",
                    })
                })
                .collect::<EauResult<Vec<_>>>()?,
        ),
        ColumnType::Bool => CodecValue::chunk_bools(
            ty,
            cells
                .iter()
                .map(|c| {
                    c.as_bool().ok_or(EauError::TypeMismatch {
                        expected: "bool",
                        found: "other",
                    })
                })
                .collect::<EauResult<Vec<_>>>()?,
        ),
        ColumnType::Float => CodecValue::chunk_floats(
            ty,
            cells
                .iter()
                .map(|c| {
                    c.as_f32().ok_or(EauError::TypeMismatch {
                        expected: "float",
                        found: "other",
                    })
                })
                .collect::<EauResult<Vec<_>>>()?,
        ),
        ColumnType::String => CodecValue::chunk_strings(
            ty,
            cells
                .iter()
                .map(|c| {
                    c.as_str()
                        .map(|s| s.to_string())
                        .ok_or(EauError::TypeMismatch {
                            expected: "string",
                            found: "other",
                        })
                })
                .collect::<EauResult<Vec<_>>>()?,
        ),
    })
}

fn chunk_value_to_cells(value: &CodecValue) -> EauResult<Vec<Cell>> {
    match value {
        CodecValue::Chunk {
            col_type,
            ints,
            bools,
            floats,
            strings,
        } => Ok(match col_type {
            ColumnType::Int => ints.iter().map(|&i| Cell::Int32(i)).collect(),
            ColumnType::Bool => bools.iter().map(|&b| Cell::Bool(b)).collect(),
            ColumnType::Float => floats.iter().map(|&f| Cell::Float32(f)).collect(),
            ColumnType::String => strings.iter().cloned().map(Cell::Utf8String).collect(),
        }),
        _ => Err(EauError::Malformed("expected a chunk value".into())),
    }
}

impl ChunkedColumn {
    pub fn new(column_key: Key, col_idx: usize, ty: ColumnType) -> Self {
        Self::with_chunk_size(column_key, col_idx, ty, CHUNK_SIZE)
    }

    pub fn with_chunk_size(column_key: Key, col_idx: usize, ty: ColumnType, chunk_size: usize) -> Self {
        Self {
            column_key,
            col_idx,
            ty,
            chunk_size,
            state: Mutex::new(State::Open(Vec::new())),
            cache: Mutex::new(None),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        self.ty
    }

    pub fn is_sealed(&self) -> bool {
        matches!(&*self.state.lock().unwrap(), State::Sealed { .. })
    }

    pub fn len(&self) -> usize {
        match &*self.state.lock().unwrap() {
            State::Open(cells) => cells.len(),
            State::Sealed { length, .. } => *length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve `Cell::Missing` to this column's default and check the
    /// result's type against `self.ty`, rejecting a mismatched cell (e.g. a
    /// `Bool` handed to an `Int` column) before it ever reaches storage.
    fn resolve_and_check(&self, cell: Cell) -> EauResult<Cell> {
        let resolved = cell.resolve(self.ty);
        match resolved.type_of() {
            Some(t) if t == self.ty => Ok(resolved),
            Some(found) => Err(EauError::TypeMismatch {
                expected: self.ty.name(),
                found: found.name(),
            }),
            None => unreachable!("resolve() never leaves a cell Missing"),
        }
    }

    /// Append a cell while the column is still `Open`. `cell` is resolved
    /// against this column's type first, so a caller padding with
    /// `Cell::Missing` never stores the sentinel itself; the resolved cell
    /// must then agree with the column's type.
    pub fn append(&self, cell: Cell) -> EauResult<()> {
        let mut state = self.state.lock().unwrap();
        match &mut *state {
            State::Open(cells) => {
                cells.push(self.resolve_and_check(cell)?);
                Ok(())
            }
            State::Sealed { .. } => Err(EauError::Sealed),
        }
    }

    /// Overwrite an existing cell while the column is still `Open`.
    pub fn set(&self, row: usize, cell: Cell) -> EauResult<()> {
        let mut state = self.state.lock().unwrap();
        match &mut *state {
            State::Open(cells) => {
                let len = cells.len();
                let slot = cells
                    .get_mut(row)
                    .ok_or(EauError::OutOfBounds { index: row, len })?;
                *slot = self.resolve_and_check(cell)?;
                Ok(())
            }
            State::Sealed { .. } => Err(EauError::Sealed),
        }
    }

    /// Seal the column: split its buffered cells into `CHUNK_SIZE` chunks,
    /// `put` each one under its derived key through `kv`, and transition
    /// to `Sealed`. A no-op if already sealed.
    pub fn seal(&self, kv: &dyn KvHandle) -> EauResult<()> {
        let mut state = self.state.lock().unwrap();
        if let State::Sealed { .. } = &*state {
            return Ok(());
        }
        let cells = match std::mem::replace(&mut *state, State::Sealed { length: 0, chunk_keys: Vec::new() }) {
            State::Open(cells) => cells,
            State::Sealed { .. } => unreachable!(),
        };
        let length = cells.len();
        let mut chunk_keys = Vec::new();
        for (chunk_idx, slice) in cells.chunks(self.chunk_size).enumerate() {
            let key = chunk_key(&self.column_key, self.col_idx, chunk_idx);
            let value = cells_to_chunk_value(self.ty, slice)?;
            kv.put_bytes(&key, encode_chunk(&value)?.into_bytes())?;
            chunk_keys.push(key);
        }
        *self.cache.lock().unwrap() = None;
        *state = State::Sealed { length, chunk_keys };
        Ok(())
    }

    /// Adopt a column in `Sealed` state directly from fetched dataframe
    /// metadata, bypassing `seal` (the chunks already exist in the store).
    pub fn adopt_sealed(&self, length: usize, chunk_keys: Vec<Key>) {
        *self.state.lock().unwrap() = State::Sealed { length, chunk_keys };
        *self.cache.lock().unwrap() = None;
    }

    pub fn chunk_keys(&self) -> EauResult<Vec<Key>> {
        match &*self.state.lock().unwrap() {
            State::Sealed { chunk_keys, .. } => Ok(chunk_keys.clone()),
            State::Open(_) => Err(EauError::NotSealed),
        }
    }

    /// Random-access read by row index. Only valid once sealed; fetches
    /// and caches the owning chunk on a cache miss.
    pub fn get(&self, row: usize, kv: &dyn KvHandle) -> EauResult<Cell> {
        let (length, chunk_keys) = match &*self.state.lock().unwrap() {
            State::Sealed { length, chunk_keys } => (*length, chunk_keys.clone()),
            State::Open(_) => return Err(EauError::NotSealed),
        };
        if row >= length {
            return Err(EauError::OutOfBounds { index: row, len: length });
        }
        let chunk_idx = row / self.chunk_size;
        let offset = row % self.chunk_size;

        {
            let cache = self.cache.lock().unwrap();
            if let Some((idx, cells)) = &*cache {
                if *idx == chunk_idx {
                    return Ok(cells[offset].clone());
                }
            }
        }

        let key = &chunk_keys[chunk_idx];
        let bytes = kv.get_bytes(key)?;
        let text = String::from_utf8(bytes)
            .map_err(|_| EauError::Malformed("chunk payload was not UTF-8".into()))?;
        let value = decode_chunk(&text)?;
        let cells = chunk_value_to_cells(&value)?;
        let result = cells[offset].clone();
        *self.cache.lock().unwrap() = Some((chunk_idx, cells));
        Ok(result)
    }
}

/// Shared handle to a column, cheap to clone across the dataframe's column
/// vector and any caller holding onto it.
pub type SharedChunkedColumn = Arc<ChunkedColumn>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::InMemoryKv;

    fn owner_key() -> Key {
        Key::new("col-test", 0)
    }

    #[test]
    fn append_then_seal_then_get_roundtrips() {
        let kv = InMemoryKv::default();
        let col = ChunkedColumn::new(owner_key(), 0, ColumnType::Int);
        for i in 0..10 {
            col.append(Cell::Int32(i)).unwrap();
        }
        col.seal(&kv).unwrap();
        assert!(col.is_sealed());
        for i in 0..10 {
            assert_eq!(col.get(i as usize, &kv).unwrap(), Cell::Int32(i));
        }
    }

    #[test]
    fn append_after_seal_errors() {
        let kv = InMemoryKv::default();
        let col = ChunkedColumn::new(owner_key(), 0, ColumnType::Bool);
        col.append(Cell::Bool(true)).unwrap();
        col.seal(&kv).unwrap();
        assert!(matches!(col.append(Cell::Bool(false)), Err(EauError::Sealed)));
    }

    #[test]
    fn get_before_seal_errors() {
        let kv = InMemoryKv::default();
        let col = ChunkedColumn::new(owner_key(), 0, ColumnType::Int);
        col.append(Cell::Int32(1)).unwrap();
        assert!(matches!(col.get(0, &kv), Err(EauError::NotSealed)));
    }

    #[test]
    fn out_of_bounds_after_seal_errors() {
        let kv = InMemoryKv::default();
        let col = ChunkedColumn::new(owner_key(), 0, ColumnType::Int);
        col.append(Cell::Int32(1)).unwrap();
        col.seal(&kv).unwrap();
        assert!(matches!(col.get(5, &kv), Err(EauError::OutOfBounds { index: 5, len: 1 })));
    }

    #[test]
    fn missing_resolves_to_type_default_on_append() {
        let kv = InMemoryKv::default();
        let col = ChunkedColumn::new(owner_key(), 0, ColumnType::String);
        col.append(Cell::Missing).unwrap();
        col.seal(&kv).unwrap();
        assert_eq!(col.get(0, &kv).unwrap(), Cell::Utf8String(String::new()));
    }

    #[test]
    fn append_rejects_a_cell_of_the_wrong_type() {
        let col = ChunkedColumn::new(owner_key(), 0, ColumnType::Int);
        assert!(matches!(
            col.append(Cell::Bool(true)),
            Err(EauError::TypeMismatch {
                expected: "int",
                found: "bool",
            })
        ));
        assert_eq!(col.len(), 0);
    }

    #[test]
    fn set_rejects_a_cell_of_the_wrong_type() {
        let col = ChunkedColumn::new(owner_key(), 0, ColumnType::String);
        col.append(Cell::Utf8String("a".into())).unwrap();
        assert!(matches!(
            col.set(0, Cell::Int32(1)),
            Err(EauError::TypeMismatch {
                expected: "string",
                found: "int",
            })
        ));
    }

    #[test]
    fn spans_multiple_chunks_at_chunk_size_boundary() {
        let kv = InMemoryKv::default();
        let col = ChunkedColumn::new(owner_key(), 0, ColumnType::Int);
        let total = CHUNK_SIZE * 2 + 3;
        for i in 0..total {
            col.append(Cell::Int32(i as i32)).unwrap();
        }
        col.seal(&kv).unwrap();
        let keys = col.chunk_keys().unwrap();
        assert_eq!(keys.len(), 3);
        for i in [0usize, CHUNK_SIZE - 1, CHUNK_SIZE, total - 1] {
            assert_eq!(col.get(i, &kv).unwrap(), Cell::Int32(i as i32));
        }
    }
}
