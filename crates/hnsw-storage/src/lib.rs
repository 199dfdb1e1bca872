//! Storage layer for hnsw-index.
//!
//! Provides RocksDB-backed storage with:
//! - A binary key schema whose byte order matches the scans the graph needs
//! - Point reads, multi-gets and prefix-bounded forward iteration
//! - Atomic writes via WriteBatch
//!
//! Every graph shares one RocksDB instance; a graph's numeric id is part of
//! each of its keys, so graphs are disjoint key-space partitions.

pub mod db;
pub mod error;
pub mod keys;

pub use db::{Batch, PrefixIter, Storage};
pub use error::StorageError;
pub use keys::{GraphKey, GraphRecord, LayerKey, NameKey, NameRevKey, VectorKey};
