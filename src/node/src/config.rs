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

//! The node's CLI surface and resulting configuration: a `clap::Parser`
//! struct for the command line, optionally merged with a `toml` config
//! file for settings better kept out of shell history.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use eau2_net::DEFAULT_PORT;
use serde::Deserialize;

use eau2_net::ClusterConfig;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Demo {
    S1,
    S2,
    S3,
}

#[derive(Parser, Debug)]
#[command(name = "eau2-node", about = "A node in an eau2 cluster")]
pub struct Opts {
    /// This node's index within the cluster.
    #[arg(short, long)]
    pub index: usize,

    /// Total cluster size, fixed for the lifetime of the cluster.
    #[arg(short = 'n', long)]
    pub nodes: usize,

    /// Override a peer's address: `idx=host:port`. Repeatable.
    #[arg(long = "addr", value_parser = parse_addr_override)]
    pub addrs: Vec<(usize, SocketAddr)>,

    /// Which end-to-end demo scenario this node's application runs after
    /// joining the cluster.
    #[arg(long, value_enum)]
    pub demo: Option<Demo>,

    /// Optional TOML config file merged in on top of the defaults (CLI
    /// flags still take precedence for anything they set).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the default `CHUNK_SIZE` (1024), for scenarios that want a
    /// small boundary to test against without allocating thousands of cells.
    #[arg(long)]
    pub chunk_size: Option<usize>,
}

fn parse_addr_override(s: &str) -> Result<(usize, SocketAddr), String> {
    let (idx_str, addr_str) = s
        .split_once('=')
        .ok_or_else(|| format!("expected idx=host:port, got {}", s))?;
    let idx: usize = idx_str
        .parse()
        .map_err(|_| format!("invalid node index: {}", idx_str))?;
    let addr: SocketAddr = addr_str
        .parse()
        .map_err(|_| format!("invalid address: {}", addr_str))?;
    Ok((idx, addr))
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    chunk_size: Option<usize>,
    port: Option<u16>,
}

/// The fully resolved configuration this node runs with: CLI flags merged
/// with an optional config file.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub index: usize,
    pub cluster: ClusterConfig,
    pub chunk_size: usize,
    pub demo: Option<Demo>,
}

impl NodeConfig {
    pub fn from_opts(opts: Opts) -> Result<Self> {
        if opts.index >= opts.nodes {
            return Err(anyhow!(
                "node index {} is out of range for a cluster of size {}",
                opts.index,
                opts.nodes
            ));
        }

        let file_config = match &opts.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => FileConfig::default(),
        };

        let port = file_config.port.unwrap_or(DEFAULT_PORT);
        let overrides: HashMap<usize, SocketAddr> = opts.addrs.into_iter().collect();
        let cluster = ClusterConfig::loopback(opts.nodes, port).with_overrides(&overrides);

        let chunk_size = opts
            .chunk_size
            .or(file_config.chunk_size)
            .unwrap_or(eau2_kv::CHUNK_SIZE);

        Ok(Self {
            index: opts.index,
            cluster,
            chunk_size,
            demo: opts.demo,
        })
    }
}
