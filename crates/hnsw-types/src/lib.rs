//! # hnsw-types
//!
//! Shared domain types for the hnsw-index workspace.
//!
//! - Graph parameters and the derived level multiplier
//! - Layer edges as reported by layer enumeration
//! - Settings: layered configuration for the admin binary
//!
//! ## Usage
//!
//! ```rust
//! use hnsw_types::GraphParams;
//!
//! let params = GraphParams::new(50, 5, 10);
//! assert!(params.validate().is_ok());
//! ```

pub mod config;
pub mod error;
pub mod graph;

pub use config::{GraphDefaults, SearchDefaults, Settings};
pub use error::ConfigError;
pub use graph::{GraphParams, LayerEdge};
