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

//! The dataframe facade: a schema plus an ordered set of chunked columns,
//! addressed by row/column index. The `from_*_array`/`from_*_scalar`
//! constructors build a single-column frame, seal it, and store it in one
//! call.

use eau2_common::{
    decode_dataframe_meta, encode_dataframe_meta, Cell, ColumnMeta, ColumnType, EauError,
    EauResult, Key, Schema,
};
use eau2_net::KvHandle;

use crate::chunk::{ChunkedColumn, CHUNK_SIZE};
use crate::row::Row;

pub struct Dataframe {
    key: Key,
    schema: Schema,
    columns: Vec<ChunkedColumn>,
    nrows: usize,
    chunk_size: usize,
}

impl Dataframe {
    pub fn new(key: Key) -> Self {
        Self::with_chunk_size(key, CHUNK_SIZE)
    }

    /// Construct with a non-default chunk size, for tests exercising
    /// chunk-boundary behavior cheaply.
    pub fn with_chunk_size(key: Key, chunk_size: usize) -> Self {
        Self {
            key,
            schema: Schema::new(),
            columns: Vec::new(),
            nrows: 0,
            chunk_size,
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    /// Append a new column built from `values`. Shorter columns (this one
    /// or any already present) are padded with `Missing` up to the new
    /// dataframe-wide row count, which grows to the longest column.
    pub fn add_column(&mut self, ty: ColumnType, values: Vec<Cell>) -> EauResult<()> {
        let col_idx = self.columns.len();
        let col = ChunkedColumn::with_chunk_size(self.key.clone(), col_idx, ty, self.chunk_size);
        for v in values {
            col.append(v)?;
        }
        let new_len = col.len();
        self.columns.push(col);
        self.schema.push(ty);

        let target = new_len.max(self.nrows);
        for col in &self.columns {
            while col.len() < target {
                col.append(Cell::Missing)?;
            }
        }
        self.nrows = target;
        Ok(())
    }

    /// Append one row, schema-checked positionally against the current
    /// schema. Every column must already exist (`add_row` never grows
    /// `ncols`); a length mismatch or type mismatch is `TypeMismatch`.
    pub fn add_row(&mut self, row: &Row) -> EauResult<()> {
        if row.len() != self.schema.len() {
            return Err(EauError::TypeMismatch {
                expected: "row matching dataframe schema length",
                found: "row of a different length",
            });
        }
        if !row.schema_matches(&self.schema) {
            return Err(EauError::TypeMismatch {
                expected: "row cell types matching schema",
                found: "mismatched cell type",
            });
        }
        for (col, cell) in self.columns.iter().zip(row.0.iter()) {
            col.append(cell.clone())?;
        }
        self.nrows += 1;
        Ok(())
    }

    fn column(&self, col: usize) -> EauResult<&ChunkedColumn> {
        self.columns
            .get(col)
            .ok_or(EauError::OutOfBounds { index: col, len: self.columns.len() })
    }

    fn check_type(&self, col: usize, expected: ColumnType) -> EauResult<()> {
        let actual = self.column(col)?.column_type();
        if actual != expected {
            return Err(EauError::TypeMismatch {
                expected: expected.name(),
                found: actual.name(),
            });
        }
        Ok(())
    }

    pub fn get_i32(&self, row: usize, col: usize, kv: &dyn KvHandle) -> EauResult<i32> {
        self.check_type(col, ColumnType::Int)?;
        let cell = self.column(col)?.get(row, kv)?;
        cell.as_i32().ok_or(EauError::TypeMismatch { expected: "int", found: "other" })
    }

    pub fn get_bool(&self, row: usize, col: usize, kv: &dyn KvHandle) -> EauResult<bool> {
        self.check_type(col, ColumnType::Bool)?;
        let cell = self.column(col)?.get(row, kv)?;
        cell.as_bool().ok_or(EauError::TypeMismatch { expected: "bool", found: "other" })
    }

    pub fn get_f32(&self, row: usize, col: usize, kv: &dyn KvHandle) -> EauResult<f32> {
        self.check_type(col, ColumnType::Float)?;
        let cell = self.column(col)?.get(row, kv)?;
        cell.as_f32().ok_or(EauError::TypeMismatch { expected: "float", found: "other" })
    }

    pub fn get_string(&self, row: usize, col: usize, kv: &dyn KvHandle) -> EauResult<String> {
        self.check_type(col, ColumnType::String)?;
        let cell = self.column(col)?.get(row, kv)?;
        cell.as_str()
            .map(|s| s.to_string())
            .ok_or(EauError::TypeMismatch { expected: "string", found: "other" })
    }

    pub fn set_i32(&self, row: usize, col: usize, value: i32) -> EauResult<()> {
        self.check_type(col, ColumnType::Int)?;
        self.column(col)?.set(row, Cell::Int32(value))
    }

    pub fn set_bool(&self, row: usize, col: usize, value: bool) -> EauResult<()> {
        self.check_type(col, ColumnType::Bool)?;
        self.column(col)?.set(row, Cell::Bool(value))
    }

    pub fn set_f32(&self, row: usize, col: usize, value: f32) -> EauResult<()> {
        self.check_type(col, ColumnType::Float)?;
        self.column(col)?.set(row, Cell::Float32(value))
    }

    pub fn set_string(&self, row: usize, col: usize, value: String) -> EauResult<()> {
        self.check_type(col, ColumnType::String)?;
        self.column(col)?.set(row, Cell::Utf8String(value))
    }

    /// Seal every column and store the dataframe's metadata (schema plus
    /// each column's type/length/chunk-key list) under `self.key`. Chunk
    /// payloads were already stored individually as each column sealed
    /// (a dataframe's wire form never inlines chunk contents).
    pub fn seal_and_put(&self, kv: &dyn KvHandle) -> EauResult<()> {
        for col in &self.columns {
            col.seal(kv)?;
        }
        let columns: Vec<ColumnMeta> = self
            .columns
            .iter()
            .map(|c| {
                Ok(ColumnMeta {
                    ty: c.column_type(),
                    length: c.len(),
                    chunks: c.chunk_keys()?,
                })
            })
            .collect::<EauResult<_>>()?;
        let bytes = encode_dataframe_meta(&self.schema, &columns).into_bytes();
        kv.put_bytes(&self.key, bytes)
    }

    /// Rebuild a `Dataframe` from its stored metadata: a sealed dataframe
    /// whose columns lazily fetch chunks from `kv` on read.
    pub fn fetch(key: Key, kv: &dyn KvHandle) -> EauResult<Self> {
        Self::fetch_with_chunk_size(key, kv, CHUNK_SIZE)
    }

    /// As `fetch`, for dataframes originally built with a non-default
    /// chunk size -- the wire metadata carries each column's length and
    /// chunk-key list but not the chunk size itself, so a caller reading
    /// across a custom-chunk-size boundary must supply it out of band.
    pub fn fetch_with_chunk_size(key: Key, kv: &dyn KvHandle, chunk_size: usize) -> EauResult<Self> {
        let bytes = kv.get_bytes(&key)?;
        Self::fetch_from_bytes_with_chunk_size(key, bytes, chunk_size)
    }

    /// Rebuild a `Dataframe` from metadata bytes already in hand (e.g. the
    /// result of a `wait_and_get_bytes` call), without an extra round trip
    /// through `kv` to re-fetch them.
    pub fn fetch_from_bytes(key: Key, bytes: Vec<u8>, _kv: &dyn KvHandle) -> EauResult<Self> {
        Self::fetch_from_bytes_with_chunk_size(key, bytes, CHUNK_SIZE)
    }

    fn fetch_from_bytes_with_chunk_size(key: Key, bytes: Vec<u8>, chunk_size: usize) -> EauResult<Self> {
        let text = String::from_utf8(bytes)
            .map_err(|_| EauError::Malformed("dataframe metadata was not UTF-8".into()))?;
        let (schema, columns_meta) = decode_dataframe_meta(&text)?;
        let mut nrows = 0;
        let mut columns = Vec::with_capacity(columns_meta.len());
        for (idx, meta) in columns_meta.into_iter().enumerate() {
            let col = ChunkedColumn::with_chunk_size(key.clone(), idx, meta.ty, chunk_size);
            col.adopt_sealed(meta.length, meta.chunks);
            nrows = nrows.max(meta.length);
            columns.push(col);
        }
        Ok(Self { key, schema, columns, nrows, chunk_size })
    }

    pub fn from_i32_array(key: Key, kv: &dyn KvHandle, values: &[i32]) -> EauResult<Self> {
        let mut df = Self::new(key);
        df.add_column(ColumnType::Int, values.iter().map(|&v| Cell::Int32(v)).collect())?;
        df.seal_and_put(kv)?;
        Ok(df)
    }

    pub fn from_bool_array(key: Key, kv: &dyn KvHandle, values: &[bool]) -> EauResult<Self> {
        let mut df = Self::new(key);
        df.add_column(ColumnType::Bool, values.iter().map(|&v| Cell::Bool(v)).collect())?;
        df.seal_and_put(kv)?;
        Ok(df)
    }

    pub fn from_f32_array(key: Key, kv: &dyn KvHandle, values: &[f32]) -> EauResult<Self> {
        let mut df = Self::new(key);
        df.add_column(ColumnType::Float, values.iter().map(|&v| Cell::Float32(v)).collect())?;
        df.seal_and_put(kv)?;
        Ok(df)
    }

    pub fn from_string_array(key: Key, kv: &dyn KvHandle, values: &[String]) -> EauResult<Self> {
        let mut df = Self::new(key);
        df.add_column(
            ColumnType::String,
            values.iter().cloned().map(Cell::Utf8String).collect(),
        )?;
        df.seal_and_put(kv)?;
        Ok(df)
    }

    pub fn from_i32_scalar(key: Key, kv: &dyn KvHandle, value: i32) -> EauResult<Self> {
        Self::from_i32_array(key, kv, &[value])
    }

    pub fn from_bool_scalar(key: Key, kv: &dyn KvHandle, value: bool) -> EauResult<Self> {
        Self::from_bool_array(key, kv, &[value])
    }

    pub fn from_f32_scalar(key: Key, kv: &dyn KvHandle, value: f32) -> EauResult<Self> {
        Self::from_f32_array(key, kv, &[value])
    }

    pub fn from_string_scalar(key: Key, kv: &dyn KvHandle, value: String) -> EauResult<Self> {
        Self::from_string_array(key, kv, &[value])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::InMemoryKv;

    #[test]
    fn shorter_column_is_padded_with_type_default() {
        let kv = InMemoryKv::default();
        let mut df = Dataframe::new(Key::new("df-pad", 0));
        df.add_column(ColumnType::Int, vec![Cell::Int32(1), Cell::Int32(2), Cell::Int32(3)])
            .unwrap();
        df.add_column(ColumnType::String, vec![Cell::Utf8String("only one".into())])
            .unwrap();
        assert_eq!(df.nrows(), 3);
        df.seal_and_put(&kv).unwrap();
        assert_eq!(df.get_string(0, 1, &kv).unwrap(), "only one");
        assert_eq!(df.get_string(1, 1, &kv).unwrap(), "");
        assert_eq!(df.get_string(2, 1, &kv).unwrap(), "");
    }

    #[test]
    fn add_row_rejects_schema_mismatch() {
        let mut df = Dataframe::new(Key::new("df-schema", 0));
        df.add_column(ColumnType::Int, vec![Cell::Int32(1)]).unwrap();
        df.add_column(ColumnType::Bool, vec![Cell::Bool(true)]).unwrap();

        let bad_row = Row::new(vec![Cell::Int32(2), Cell::Int32(3)]);
        assert!(matches!(df.add_row(&bad_row), Err(EauError::TypeMismatch { .. })));

        let good_row = Row::new(vec![Cell::Int32(2), Cell::Bool(false)]);
        df.add_row(&good_row).unwrap();
        assert_eq!(df.nrows(), 2);
    }

    #[test]
    fn set_after_seal_errors() {
        let kv = InMemoryKv::default();
        let mut df = Dataframe::new(Key::new("df-sealed", 0));
        df.add_column(ColumnType::Int, vec![Cell::Int32(1)]).unwrap();
        df.seal_and_put(&kv).unwrap();
        assert!(matches!(df.set_i32(0, 0, 9), Err(EauError::Sealed)));
    }

    #[test]
    fn from_i32_array_roundtrips_through_fetch() {
        let kv = InMemoryKv::default();
        let key = Key::new("df-i32", 0);
        Dataframe::from_i32_array(key.clone(), &kv, &[10, 20, 30]).unwrap();

        let fetched = Dataframe::fetch(key, &kv).unwrap();
        assert_eq!(fetched.nrows(), 3);
        assert_eq!(fetched.ncols(), 1);
        assert_eq!(fetched.get_i32(1, 0, &kv).unwrap(), 20);
    }

    #[test]
    fn from_bool_scalar_roundtrips() {
        let kv = InMemoryKv::default();
        let key = Key::new("df-bool-scalar", 0);
        Dataframe::from_bool_scalar(key.clone(), &kv, true).unwrap();
        let fetched = Dataframe::fetch(key, &kv).unwrap();
        assert_eq!(fetched.nrows(), 1);
        assert!(fetched.get_bool(0, 0, &kv).unwrap());
    }

    #[test]
    fn small_chunk_size_spans_multiple_chunks() {
        let kv = InMemoryKv::default();
        let key = Key::new("df-small-chunks", 0);
        let mut df = Dataframe::with_chunk_size(key.clone(), 4);
        let values: Vec<Cell> = (0..10).map(Cell::Int32).collect();
        df.add_column(ColumnType::Int, values).unwrap();
        df.seal_and_put(&kv).unwrap();

        let fetched = Dataframe::fetch_with_chunk_size(key, &kv, 4).unwrap();
        assert_eq!(fetched.nrows(), 10);
        for i in 0..10 {
            assert_eq!(fetched.get_i32(i, 0, &kv).unwrap(), i as i32);
        }
    }

    #[test]
    fn get_wrong_type_errors() {
        let kv = InMemoryKv::default();
        let key = Key::new("df-type", 0);
        Dataframe::from_i32_array(key.clone(), &kv, &[1]).unwrap();
        let fetched = Dataframe::fetch(key, &kv).unwrap();
        assert!(matches!(fetched.get_bool(0, 0, &kv), Err(EauError::TypeMismatch { .. })));
    }
}
