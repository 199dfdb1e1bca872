//! Graph parameter and edge types.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Construction parameters of a graph. Fixed for the lifetime of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphParams {
    /// Dimensionality of every stored vector
    pub dim: usize,
    /// Layer-count parameter M; also the entry point's recorded top layer
    pub m: u8,
    /// Beam width used while inserting, and the per-node neighbor fetch limit
    pub ef_construction: usize,
}

impl GraphParams {
    pub fn new(dim: usize, m: u8, ef_construction: usize) -> Self {
        Self {
            dim,
            m,
            ef_construction,
        }
    }

    /// Multiplier applied to `-ln(U)` when drawing a node's layer: `1 / ln(M)`.
    pub fn level_mult(&self) -> f64 {
        1.0 / f64::from(self.m).ln()
    }

    /// Validate parameter ranges.
    ///
    /// `m` must be at least 2, otherwise `ln(M)` is zero and the level
    /// multiplier is unbounded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dim == 0 {
            return Err(ConfigError::Invalid("dim must be > 0".to_string()));
        }
        if self.m < 2 {
            return Err(ConfigError::Invalid(format!(
                "m must be >= 2, got {}",
                self.m
            )));
        }
        if self.ef_construction == 0 {
            return Err(ConfigError::Invalid(
                "ef_construction must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// One directed edge of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerEdge {
    pub source: u64,
    pub dest: u64,
    pub distance: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mult() {
        let params = GraphParams::new(8, 16, 200);
        assert!((params.level_mult() - 1.0 / 16f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_validate() {
        assert!(GraphParams::new(50, 5, 10).validate().is_ok());
        assert!(GraphParams::new(0, 5, 10).validate().is_err());
        assert!(GraphParams::new(50, 1, 10).validate().is_err());
        assert!(GraphParams::new(50, 5, 0).validate().is_err());
    }

    #[test]
    fn test_layer_edge_serialization() {
        let edge = LayerEdge {
            source: 3,
            dest: 7,
            distance: 0.5,
        };
        let json = serde_json::to_string(&edge).unwrap();
        let decoded: LayerEdge = serde_json::from_str(&json).unwrap();
        assert_eq!(edge, decoded);
    }
}
