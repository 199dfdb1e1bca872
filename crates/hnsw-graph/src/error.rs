//! Graph engine error types.

use hnsw_storage::StorageError;
use hnsw_types::ConfigError;
use thiserror::Error;

/// Errors that can occur during graph operations.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Lookup miss on a name, vector, id or graph
    #[error("Not found: {0}")]
    NotFound(String),

    /// Layer search was asked to start from the zero sentinel
    #[error("Invalid entry point id (0)")]
    InvalidEntryPoint,

    /// Bootstrapping an empty graph did not produce id 1
    #[error("Entry point initialization error: expected id 1, got {0}")]
    Initialization(u64),

    /// Id allocation produced the zero sentinel
    #[error("Invalid node id (0) generated")]
    InvalidNodeId,

    /// Vector length differs from the graph's dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector has a NaN or infinite component
    #[error("Non-finite vector component at index {index}")]
    NonFiniteVector { index: usize },

    /// External name already present in the graph
    #[error("Name already exists: {0}")]
    AlreadyExists(String),

    /// Graph name already registered
    #[error("Graph already exists: {0}")]
    GraphExists(String),

    /// Invalid graph parameters
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    /// Underlying store failure, surfaced unchanged
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Spawning the layer scan thread failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
