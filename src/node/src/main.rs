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

//! Entrypoint wiring `eau2_common`/`eau2_net`/`eau2_kv` into a runnable
//! node: parse CLI flags, init logging, run the node, translate any
//! fatal error into a non-zero exit code.

mod config;
mod demos;
mod logging;

use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;

use eau2_net::{accept_connections, join_cluster, Directory, KvHandle, KvShard, Transport};

use config::{Demo, NodeConfig, Opts};

fn main() {
    logging::init();
    let opts = Opts::parse();
    match run(opts) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            tracing::error!(error = ?e, "node exited with a fatal error");
            std::process::exit(1);
        }
    }
}

fn run(opts: Opts) -> Result<()> {
    let config = NodeConfig::from_opts(opts)?;
    tracing::info!(index = config.index, n = config.cluster.n, "starting eau2 node");

    let directory = Arc::new(Directory::new());

    // `Transport` needs a frame handler before `KvShard` exists, and
    // `KvShard` needs the `Transport` to send replies -- broken by routing
    // frames through a cell filled in once the shard is built.
    let dispatch: Arc<Mutex<Option<Arc<KvShard>>>> = Arc::new(Mutex::new(None));
    let dispatch_for_closure = Arc::clone(&dispatch);
    let transport = Arc::new(Transport::new(Arc::new(move |peer, frame| {
        let shard = dispatch_for_closure.lock().unwrap().clone();
        if let Some(shard) = shard {
            shard.on_frame(peer, frame);
        }
    })));

    let shard = KvShard::new(config.index, Arc::clone(&transport), Arc::clone(&directory));
    *dispatch.lock().unwrap() = Some(Arc::clone(&shard));

    let listen_addr = config
        .cluster
        .addr_of(config.index)
        .context("node index has no configured address")?;
    let listener = TcpListener::bind(listen_addr)
        .with_context(|| format!("binding listener on {}", listen_addr))?;
    tracing::info!(%listen_addr, "listening");

    {
        let directory = Arc::clone(&directory);
        let transport = Arc::clone(&transport);
        let self_index = config.index;
        thread::spawn(move || {
            if let Err(e) = accept_connections(self_index, &listener, &directory, &transport) {
                tracing::error!(error = %e, "accept loop exited");
            }
        });
    }

    join_cluster(config.index, &config.cluster, &transport, &directory)
        .context("joining the cluster")?;
    tracing::info!(peers = directory.len(), "joined cluster");

    let handle: Arc<dyn KvHandle> = shard;
    if let Some(demo) = config.demo {
        match demo {
            Demo::S1 => demos::run_s1(config.index, &handle, config.chunk_size)?,
            Demo::S2 => demos::run_s2(config.index, &handle, config.chunk_size)?,
            Demo::S3 => demos::run_s3(config.index, &handle, config.chunk_size)?,
        }
    } else {
        tracing::info!("no demo selected, node will idle; Ctrl+C to exit");
        loop {
            thread::sleep(std::time::Duration::from_secs(3600));
        }
    }

    Ok(())
}
