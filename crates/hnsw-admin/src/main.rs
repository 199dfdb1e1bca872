//! hnsw-admin
//!
//! Command-line front end for an HNSW index stored in RocksDB.
//!
//! # Usage
//!
//! ```bash
//! hnsw-admin create-graph docs --dim 50
//! hnsw-admin load docs vectors.jsonl
//! hnsw-admin search docs "0.1,0.2,..." -k 10 --ef 20
//! hnsw-admin layer docs 0 --limit 20
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/hnsw-index/config.toml)
//! 3. Environment variables (HNSW_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use hnsw_admin::{run, Cli};

fn main() -> Result<()> {
    run(Cli::parse())
}
