//! # hnsw-graph
//!
//! Hierarchical Navigable Small World graph stored in RocksDB.
//!
//! Vectors, name mappings and layer edges all live in the sorted key space
//! described in [`hnsw_storage::keys`]; nothing but the current beam is held
//! in memory. The edge key embeds the edge's distance so that a prefix scan
//! over one node returns its neighbors nearest-first.
//!
//! ## Features
//! - Multi-layer insert with greedy descent and per-layer beam search
//! - Top-K Euclidean search returning external names
//! - Lazy enumeration of a layer's edges
//! - Named graphs sharing one store, each with its own parameters
//!
//! ## Example
//!
//! ```no_run
//! use hnsw_graph::HnswIndex;
//!
//! let index = HnswIndex::open(std::path::Path::new("/tmp/vectors"))?;
//! let graph = index.create_graph("docs", 3, 5, 10)?;
//! graph.insert(b"a", &[0.0, 0.0, 1.0])?;
//! graph.insert(b"b", &[0.0, 1.0, 0.0])?;
//! let names = graph.search(&[0.0, 0.1, 0.9], 1, 10)?;
//! assert_eq!(names, vec![b"a".to_vec()]);
//! # Ok::<(), hnsw_graph::GraphError>(())
//! ```

pub mod distance;
pub mod distqueue;
pub mod error;
pub mod graph;
pub mod index;
pub mod layers;
pub mod vector_store;

pub use distance::euclidean;
pub use distqueue::{CappedMinQueue, MaxQueue, MinQueue};
pub use error::GraphError;
pub use graph::{Graph, GraphStats, SearchHit, ENTRY_POINT_ID};
pub use hnsw_types::{GraphParams, LayerEdge};
pub use index::{GraphInfo, HnswIndex};
pub use layers::LayerEdges;
pub use vector_store::VectorStore;
