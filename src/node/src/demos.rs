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

//! Three multi-node end-to-end scenarios, run as a
//! node's "application" once it has joined the cluster. S4-S6 are
//! single-process assertions and live as unit tests in `eau2_kv` instead
//! (see that crate's `dataframe`/`chunk` test modules).

use std::sync::Arc;

use eau2_common::{Cell, ColumnType, EauResult, Key};
use eau2_kv::Dataframe;
use eau2_net::KvHandle;

fn put_i32_array(key: Key, kv: &dyn KvHandle, chunk_size: usize, values: &[i32]) -> EauResult<()> {
    let mut df = Dataframe::with_chunk_size(key, chunk_size);
    df.add_column(ColumnType::Int, values.iter().map(|&v| Cell::Int32(v)).collect())?;
    df.seal_and_put(kv)
}

/// S1: a single node builds a dataframe, seals and stores it, then reads
/// every value back through the same handle -- the local-only path with
/// no network hop involved.
pub fn run_s1(self_index: usize, shard: &Arc<dyn KvHandle>, chunk_size: usize) -> EauResult<()> {
    let key = Key::new("s1-values", self_index);
    let values = [1, 2, 3, 4, 5];
    put_i32_array(key.clone(), shard.as_ref(), chunk_size, &values)?;

    let fetched = Dataframe::fetch_with_chunk_size(key, shard.as_ref(), chunk_size)?;
    let mut sum = 0i64;
    for row in 0..fetched.nrows() {
        sum += fetched.get_i32(row, 0, shard.as_ref())? as i64;
    }
    tracing::info!(sum, "s1 complete: round-tripped a local dataframe");
    Ok(())
}

/// S2: a three-node pipeline. Node 0 produces a dataframe of readings,
/// node 1 consumes it, doubles every value, and republishes under its own
/// key, node 2 waits for that derived dataframe and logs its total.
pub fn run_s2(self_index: usize, shard: &Arc<dyn KvHandle>, chunk_size: usize) -> EauResult<()> {
    let raw_key = Key::new("s2-raw", 0);
    let derived_key = Key::new("s2-derived", 1);

    match self_index {
        0 => {
            let values = [10, 20, 30, 40];
            put_i32_array(raw_key, shard.as_ref(), chunk_size, &values)?;
            tracing::info!("s2 producer published raw readings");
        }
        1 => {
            let bytes = shard.wait_and_get_bytes(&raw_key)?;
            let raw = Dataframe::fetch_from_bytes(raw_key, bytes, shard.as_ref())?;
            let doubled: Vec<i32> = (0..raw.nrows())
                .map(|row| raw.get_i32(row, 0, shard.as_ref()).map(|v| v * 2))
                .collect::<EauResult<_>>()?;
            put_i32_array(derived_key, shard.as_ref(), chunk_size, &doubled)?;
            tracing::info!("s2 consumer republished doubled readings");
        }
        2 => {
            let bytes = shard.wait_and_get_bytes(&derived_key)?;
            let derived = Dataframe::fetch_from_bytes(derived_key, bytes, shard.as_ref())?;
            let mut total = 0i64;
            for row in 0..derived.nrows() {
                total += derived.get_i32(row, 0, shard.as_ref())? as i64;
            }
            tracing::info!(total, "s2 summarizer observed the fully derived total");
        }
        other => tracing::warn!(node = other, "s2 has no role for this node index"),
    }
    Ok(())
}

/// S3: a non-zero node writes a key homed on node 0; node 0's own
/// application observes it with a plain (non-blocking) local get once it
/// has landed, demonstrating that a remote put is visible through the
/// ordinary read path without any special-casing.
pub fn run_s3(self_index: usize, shard: &Arc<dyn KvHandle>, chunk_size: usize) -> EauResult<()> {
    let key = Key::new("s3-remote-put", 0);
    if self_index == 0 {
        let bytes = shard.wait_and_get_bytes(&key)?;
        let df = Dataframe::fetch_from_bytes(key, bytes, shard.as_ref())?;
        let value = df.get_i32(0, 0, shard.as_ref())?;
        tracing::info!(value, "s3 observed the remote put on its home node");
    } else {
        put_i32_array(key, shard.as_ref(), chunk_size, &[42])?;
        tracing::info!("s3 issued a put homed on node 0");
    }
    Ok(())
}
