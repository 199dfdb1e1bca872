//! CLI argument parsing for hnsw-admin.
//!
//! CLI flags override every other config source.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// HNSW index administration
///
/// Create graphs, load vectors and run nearest-neighbor queries against a
/// local RocksDB store.
#[derive(Parser, Debug)]
#[command(name = "hnsw-admin")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/hnsw-index/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override database path
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Admin commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Register a new graph
    CreateGraph {
        /// Graph name
        name: String,

        /// Vector dimension (default from config)
        #[arg(long)]
        dim: Option<usize>,

        /// Layer-count parameter M (default from config)
        #[arg(short, long)]
        m: Option<u8>,

        /// Beam width during insert (default from config)
        #[arg(long)]
        ef_construction: Option<usize>,
    },

    /// List registered graphs
    Graphs,

    /// Insert one vector
    Insert {
        /// Graph name
        graph: String,

        /// External id of the vector
        id: String,

        /// Comma-separated components, e.g. "0.1,0.2,0.3"
        #[arg(allow_hyphen_values = true)]
        vector: String,
    },

    /// Bulk insert JSON lines of {"id": "...", "vector": [...]}
    Load {
        /// Graph name
        graph: String,

        /// Input file, or "-" for stdin
        file: PathBuf,
    },

    /// Nearest-neighbor search
    Search {
        /// Graph name
        graph: String,

        /// Comma-separated query components
        #[arg(allow_hyphen_values = true)]
        vector: String,

        /// Number of results (default from config)
        #[arg(short, long)]
        k: Option<usize>,

        /// Beam width at layer 0 (default from config)
        #[arg(long)]
        ef: Option<usize>,

        /// Print ids and distances alongside names
        #[arg(long)]
        scores: bool,
    },

    /// Print the edges of one layer as JSON lines
    Layer {
        /// Graph name
        graph: String,

        /// Layer number
        layer: u8,

        /// Stop after this many edges
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show vector and edge counts
    Stats {
        /// Graph name
        graph: String,
    },
}
