//! End-to-end test infrastructure for hnsw-index.
//!
//! Provides a shared TestHarness and helpers for building graphs from
//! random data and checking them against brute force.

use hnsw_graph::{euclidean, Graph, HnswIndex};
use rand::Rng;

/// Shared test harness for E2E tests.
///
/// Owns a temp directory and an index opened inside it.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub index: HnswIndex,
}

impl TestHarness {
    /// Create a new test harness with temp directory and index.
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let index = HnswIndex::open(temp_dir.path()).expect("Failed to open test index");
        Self {
            _temp_dir: temp_dir,
            index,
        }
    }

    /// Create a graph with M = 5 and ef_construction = 10.
    pub fn create_graph(&self, name: &str, dim: usize) -> Graph {
        self.index
            .create_graph(name, dim, 5, 10)
            .expect("Failed to create graph")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// `count` vectors with components uniform in [0, 1).
pub fn random_vectors<R: Rng>(rng: &mut R, count: usize, dim: usize) -> Vec<Vec<f32>> {
    (0..count)
        .map(|_| (0..dim).map(|_| rng.random::<f32>()).collect())
        .collect()
}

/// Insert `vectors[i]` under the name `i`.
pub fn insert_numbered(graph: &Graph, vectors: &[Vec<f32>]) {
    for (i, v) in vectors.iter().enumerate() {
        graph
            .insert(i.to_string().as_bytes(), v)
            .expect("Failed to insert vector");
    }
}

/// Indices of the `k` vectors nearest to `query`, nearest first.
pub fn brute_force(vectors: &[Vec<f32>], query: &[f32], k: usize) -> Vec<usize> {
    let mut scored: Vec<(f32, usize)> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| (euclidean(query, v), i))
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.into_iter().take(k).map(|(_, i)| i).collect()
}

/// Decode a numbered name back to its index.
pub fn name_index(name: &[u8]) -> usize {
    std::str::from_utf8(name)
        .expect("Name is not UTF-8")
        .parse()
        .expect("Name is not a number")
}
