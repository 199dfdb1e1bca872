//! HNSW insert and search over the stored graph.
//!
//! The entry point is always the first vector inserted (id 1). Its top layer
//! is taken to be the graph's M rather than the highest layer any node
//! reached, so descents always start at layer M.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use hnsw_storage::keys::{decode_id, encode_id};
use hnsw_storage::{Batch, LayerKey, Storage};
use hnsw_types::GraphParams;
use rand::distr::Open01;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::distance::euclidean;
use crate::distqueue::{CappedMinQueue, MinQueue};
use crate::error::GraphError;
use crate::layers::LayerEdges;
use crate::vector_store::{IdAllocator, VectorStore};

/// Id of the entry point: the first vector inserted into a graph
pub const ENTRY_POINT_ID: u64 = 1;

/// One search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: u64,
    pub name: Vec<u8>,
    pub distance: f32,
}

/// Graph statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphStats {
    /// Number of vectors stored
    pub vector_count: u64,
    /// Directed edge count per layer
    pub edges_per_layer: BTreeMap<u8, u64>,
}

/// Draw a node's top layer: `floor(-ln(U) * level_mult)` with U in (0, 1).
pub fn random_level<R: Rng + ?Sized>(level_mult: f64, rng: &mut R) -> u8 {
    let u: f64 = rng.sample(Open01);
    // float to int casts saturate
    (-u.ln() * level_mult).floor() as u8
}

/// Handle to one named graph.
///
/// Cheap to clone. Inserts through any handle obtained from the same
/// [`crate::HnswIndex`] are serialized by a shared writer lock; searches
/// take no lock.
#[derive(Clone)]
pub struct Graph {
    name: String,
    graph_id: u32,
    params: GraphParams,
    level_mult: f64,
    storage: Arc<Storage>,
    vectors: VectorStore,
    writer: Arc<Mutex<IdAllocator>>,
}

impl Graph {
    pub(crate) fn new(
        name: String,
        graph_id: u32,
        params: GraphParams,
        storage: Arc<Storage>,
        writer: Arc<Mutex<IdAllocator>>,
    ) -> Self {
        Self {
            name,
            graph_id,
            level_mult: params.level_mult(),
            params,
            vectors: VectorStore::new(storage.clone(), graph_id),
            storage,
            writer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u32 {
        self.graph_id
    }

    pub fn params(&self) -> &GraphParams {
        &self.params
    }

    pub fn vectors(&self) -> &VectorStore {
        &self.vectors
    }

    /// Insert `vector` under the external name `name`.
    ///
    /// The vector and its name mappings are written first and stay visible
    /// even if linking fails afterwards. All edges of the insert are then
    /// committed in one batch.
    ///
    /// Each construction layer searches from the nearest result of the layer
    /// above, not from the descent's entry node, so edge sets differ from a
    /// construction that reuses one entry node for every layer.
    ///
    /// A failure after the name mapping is written but before the reverse
    /// mapping leaves the name claimed: retries return `AlreadyExists` even
    /// though no vector answers to it.
    pub fn insert(&self, name: &[u8], vector: &[f32]) -> Result<(), GraphError> {
        self.check_vector(vector)?;

        let mut allocator = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        if self.vectors.lookup(name)?.is_some() {
            return Err(GraphError::AlreadyExists(
                String::from_utf8_lossy(name).into_owned(),
            ));
        }

        let level = random_level(self.level_mult, &mut rand::rng());

        let Some((top_layer, entry_vector)) = self.entry_point()? else {
            let id = self
                .vectors
                .allocate_and_insert(&mut allocator, name, vector)?;
            if id != ENTRY_POINT_ID {
                return Err(GraphError::Initialization(id));
            }
            info!(graph = %self.name, "Initialized entry point");
            return Ok(());
        };

        let id = self
            .vectors
            .allocate_and_insert(&mut allocator, name, vector)?;
        if id == 0 {
            return Err(GraphError::InvalidNodeId);
        }

        let mut ep = ENTRY_POINT_ID;
        let mut ep_dist = euclidean(vector, &entry_vector);
        if top_layer > level {
            (ep, ep_dist) = self.greedy_descent(vector, top_layer, level + 1, ep, ep_dist)?;
        }
        trace!(id, level, ep, ep_dist, "Descended to insertion layer");

        let mut batch = Batch::new();
        for layer in (0..=level).rev() {
            let (ids, dists) =
                self.layer_search(vector, layer, ep, self.params.ef_construction)?;
            for (&other, &dist) in ids.iter().zip(&dists) {
                batch.put(
                    &LayerKey::new(self.graph_id, layer, id, dist).to_bytes(),
                    &encode_id(other),
                );
                batch.put(
                    &LayerKey::new(self.graph_id, layer, other, dist).to_bytes(),
                    &encode_id(id),
                );
            }
            if let Some(&nearest) = ids.first() {
                ep = nearest;
            }
        }

        let edges = batch.len();
        self.storage.commit(batch)?;
        debug!(graph = %self.name, id, level, edges, "Inserted vector");
        Ok(())
    }

    /// External names of the (approximately) `k` nearest vectors to `query`,
    /// nearest first.
    pub fn search(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<Vec<u8>>, GraphError> {
        Ok(self
            .search_scored(query, k, ef)?
            .into_iter()
            .map(|hit| hit.name)
            .collect())
    }

    /// Like [`Graph::search`], keeping ids and distances.
    ///
    /// Results whose name cannot be resolved are skipped, so fewer than
    /// `min(k, ef)` hits may come back.
    pub fn search_scored(
        &self,
        query: &[f32],
        k: usize,
        ef: usize,
    ) -> Result<Vec<SearchHit>, GraphError> {
        self.check_vector(query)?;
        if k == 0 || ef == 0 {
            return Ok(Vec::new());
        }

        let Some((top_layer, entry_vector)) = self.entry_point()? else {
            debug!(graph = %self.name, "Search on empty graph");
            return Ok(Vec::new());
        };

        let ep_dist = euclidean(query, &entry_vector);
        let (ep, _) = self.greedy_descent(query, top_layer, 0, ENTRY_POINT_ID, ep_dist)?;
        let (ids, dists) = self.layer_search(query, 0, ep, ef)?;

        let mut hits = Vec::with_capacity(k.min(ids.len()));
        for (id, distance) in ids.into_iter().zip(dists).take(k) {
            match self.vectors.get_name(id) {
                Ok(name) => hits.push(SearchHit { id, name, distance }),
                Err(e) => {
                    warn!(graph = %self.name, id, error = %e, "Skipping unresolvable result")
                }
            }
        }

        debug!(graph = %self.name, k, ef, found = hits.len(), "Search complete");
        Ok(hits)
    }

    /// Beam search of one layer from `entry_point`, keeping the `k` nearest.
    ///
    /// Returns parallel (ids, distances), ascending by distance.
    pub fn layer_search(
        &self,
        query: &[f32],
        layer: u8,
        entry_point: u64,
        k: usize,
    ) -> Result<(Vec<u64>, Vec<f32>), GraphError> {
        if entry_point == 0 {
            return Err(GraphError::InvalidEntryPoint);
        }
        if k == 0 {
            return Ok((Vec::new(), Vec::new()));
        }

        let mut visited = HashSet::from([entry_point]);
        let mut candidates = MinQueue::new();
        let mut results = CappedMinQueue::new(k);

        let dist = euclidean(query, &self.vectors.get_vector(entry_point)?);
        candidates.insert(dist, entry_point);
        results.insert(dist, entry_point);

        while let Some((cdist, current)) = candidates.pop_min() {
            if results.is_full() && results.current_worst().is_some_and(|worst| cdist > worst) {
                break;
            }

            let neighbors: Vec<u64> = self
                .layer_neighbors(layer, current, self.params.ef_construction)?
                .into_iter()
                .filter(|n| visited.insert(*n))
                .collect();
            if neighbors.is_empty() {
                continue;
            }

            let vectors = self.vectors.get_vectors(&neighbors)?;
            for (neighbor, vector) in neighbors.into_iter().zip(vectors) {
                let d = euclidean(query, &vector);
                let admit = match results.current_worst() {
                    Some(worst) => !results.is_full() || d < worst,
                    None => true,
                };
                if admit {
                    results.insert(d, neighbor);
                    candidates.insert(d, neighbor);
                }
            }
        }

        Ok(results.into_parts())
    }

    /// Lazily enumerate the directed edges stored at `layer`.
    pub fn list_layer(&self, layer: u8) -> Result<LayerEdges, GraphError> {
        LayerEdges::spawn(self.storage.clone(), self.graph_id, layer)
    }

    pub fn stats(&self) -> Result<GraphStats, GraphError> {
        let mut edges_per_layer = BTreeMap::new();
        for item in self
            .storage
            .prefix_iter(&LayerKey::graph_prefix(self.graph_id))
        {
            let (key, _) = item?;
            *edges_per_layer
                .entry(LayerKey::from_bytes(&key)?.layer)
                .or_insert(0) += 1;
        }
        Ok(GraphStats {
            vector_count: self.vectors.count()?,
            edges_per_layer,
        })
    }

    /// Id assigned to an external name.
    pub fn lookup(&self, name: &[u8]) -> Result<Option<u64>, GraphError> {
        self.vectors.lookup(name)
    }

    pub fn get_vector(&self, id: u64) -> Result<Vec<f32>, GraphError> {
        self.vectors.get_vector(id)
    }

    pub fn get_name(&self, id: u64) -> Result<Vec<u8>, GraphError> {
        self.vectors.get_name(id)
    }

    /// Reject vectors of the wrong length or with NaN or infinite components.
    /// Stored distances must be finite and non-negative to sort as layer keys.
    fn check_vector(&self, vector: &[f32]) -> Result<(), GraphError> {
        if let Some(index) = vector.iter().position(|v| !v.is_finite()) {
            return Err(GraphError::NonFiniteVector { index });
        }
        if vector.len() != self.params.dim {
            return Err(GraphError::DimensionMismatch {
                expected: self.params.dim,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Entry point's recorded top layer and vector, `None` on an empty graph.
    fn entry_point(&self) -> Result<Option<(u8, Vec<f32>)>, GraphError> {
        Ok(self
            .vectors
            .find_vector(ENTRY_POINT_ID)?
            .map(|v| (self.params.m, v)))
    }

    /// Up to `count` neighbors of `node` at `layer`, nearest first.
    fn layer_neighbors(
        &self,
        layer: u8,
        node: u64,
        count: usize,
    ) -> Result<Vec<u64>, GraphError> {
        self.storage
            .prefix_iter(&LayerKey::node_prefix(self.graph_id, layer, node))
            .take(count)
            .map(|item| {
                let (_, value) = item?;
                Ok(decode_id(&value)?)
            })
            .collect()
    }

    /// Walk layers `from` down to `to` inclusive, at each layer moving to any
    /// strictly closer neighbor until none improves. Returns the best node
    /// and its distance.
    fn greedy_descent(
        &self,
        query: &[f32],
        from: u8,
        to: u8,
        mut best: u64,
        mut best_dist: f32,
    ) -> Result<(u64, f32), GraphError> {
        for layer in (to..=from).rev() {
            loop {
                let neighbors = self.layer_neighbors(layer, best, self.params.ef_construction)?;
                if neighbors.is_empty() {
                    break;
                }
                let vectors = self.vectors.get_vectors(&neighbors)?;

                let mut changed = false;
                for (neighbor, vector) in neighbors.into_iter().zip(vectors) {
                    let d = euclidean(query, &vector);
                    if d < best_dist {
                        best = neighbor;
                        best_dist = d;
                        changed = true;
                    }
                }
                if !changed {
                    break;
                }
            }
            trace!(layer, best, best_dist, "Greedy descent settled");
        }
        Ok((best, best_dist))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::HnswIndex;
    use hnsw_storage::NameRevKey;
    use hnsw_types::LayerEdge;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tempfile::TempDir;

    fn create_graph(dim: usize) -> (Graph, HnswIndex, TempDir) {
        let temp = TempDir::new().unwrap();
        let index = HnswIndex::open(temp.path()).unwrap();
        let graph = index.create_graph("test", dim, 5, 10).unwrap();
        (graph, index, temp)
    }

    // Edges sharing a source and an exact distance share a key, so the
    // fixtures avoid lattice points.
    fn sample_points() -> Vec<(String, Vec<f32>)> {
        let mut rng = StdRng::seed_from_u64(11);
        (0..30)
            .map(|i| {
                let v = vec![rng.random_range(0.0..100.0), rng.random_range(0.0..100.0)];
                (format!("p{}", i), v)
            })
            .collect()
    }

    fn populated_graph() -> (Graph, Vec<(String, Vec<f32>)>, HnswIndex, TempDir) {
        let (graph, index, temp) = create_graph(2);
        let points = sample_points();
        for (name, v) in &points {
            graph.insert(name.as_bytes(), v).unwrap();
        }
        (graph, points, index, temp)
    }

    fn collect_layer(graph: &Graph, layer: u8) -> Vec<LayerEdge> {
        graph
            .list_layer(layer)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_first_insert_becomes_entry_point() {
        let (graph, _index, _temp) = create_graph(3);
        graph.insert(b"first", &[1.0, 2.0, 3.0]).unwrap();

        assert_eq!(graph.lookup(b"first").unwrap(), Some(ENTRY_POINT_ID));
        assert_eq!(graph.get_name(ENTRY_POINT_ID).unwrap(), b"first".to_vec());
        assert!(graph.stats().unwrap().edges_per_layer.is_empty());
    }

    #[test]
    fn test_second_insert_links_both_ways() {
        let (graph, _index, _temp) = create_graph(2);
        graph.insert(b"a", &[0.0, 0.0]).unwrap();
        graph.insert(b"b", &[3.0, 4.0]).unwrap();

        let edges = collect_layer(&graph, 0);
        assert_eq!(edges.len(), 2);
        assert!(edges.contains(&LayerEdge { source: 1, dest: 2, distance: 5.0 }));
        assert!(edges.contains(&LayerEdge { source: 2, dest: 1, distance: 5.0 }));
    }

    #[test]
    fn test_entry_point_never_overwritten() {
        let (graph, points, _index, _temp) = populated_graph();
        assert_eq!(graph.get_name(ENTRY_POINT_ID).unwrap(), b"p0".to_vec());
        assert_eq!(graph.get_vector(ENTRY_POINT_ID).unwrap(), points[0].1);
        assert_eq!(graph.stats().unwrap().vector_count, 30);
    }

    #[test]
    fn test_every_edge_has_reverse() {
        let (graph, _points, _index, _temp) = populated_graph();

        let stats = graph.stats().unwrap();
        for (&layer, &count) in &stats.edges_per_layer {
            let edges = collect_layer(&graph, layer);
            assert_eq!(edges.len() as u64, count);
            let pairs: HashSet<(u64, u64)> = edges.iter().map(|e| (e.source, e.dest)).collect();
            for e in &edges {
                assert!(pairs.contains(&(e.dest, e.source)), "missing reverse of {:?}", e);
            }
        }
    }

    #[test]
    fn test_layer_edges_nearest_first_per_source() {
        let (graph, _points, _index, _temp) = populated_graph();

        let edges = collect_layer(&graph, 0);
        assert!(!edges.is_empty());
        for pair in edges.windows(2) {
            if pair[0].source == pair[1].source {
                assert!(pair[0].distance <= pair[1].distance);
            }
        }
        for e in &edges {
            let expected = euclidean(
                &graph.get_vector(e.source).unwrap(),
                &graph.get_vector(e.dest).unwrap(),
            );
            assert_eq!(e.distance, expected);
        }
    }

    #[test]
    fn test_list_layer_early_stop() {
        let (graph, _points, _index, _temp) = populated_graph();

        let first: Vec<LayerEdge> = graph
            .list_layer(0)
            .unwrap()
            .take(3)
            .map(Result::unwrap)
            .collect();
        assert_eq!(first.len(), 3);

        let all = collect_layer(&graph, 0);
        assert_eq!(&all[..3], &first[..]);
        assert_eq!(collect_layer(&graph, 200).len(), 0);
    }

    #[test]
    fn test_search_finds_exact_match() {
        // neighbor fetch limit above any node's degree makes the scan exhaustive
        let temp = TempDir::new().unwrap();
        let index = HnswIndex::open(temp.path()).unwrap();
        let graph = index.create_graph("exact", 2, 5, 40).unwrap();
        let points = sample_points();
        for (name, v) in &points {
            graph.insert(name.as_bytes(), v).unwrap();
        }

        let (name, query) = &points[17];
        let hits = graph.search_scored(query, 5, 40).unwrap();
        assert_eq!(hits.len(), 5);
        assert_eq!(hits[0].name, name.as_bytes().to_vec());
        assert_eq!(hits[0].distance, 0.0);
        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_search_length_bounded_by_k_and_ef() {
        let (graph, points, _index, _temp) = populated_graph();
        let query = &points[5].1;
        assert!(graph.search(query, 10, 4).unwrap().len() <= 4);
        assert_eq!(graph.search(query, 3, 20).unwrap().len(), 3);
        assert!(graph.search(query, 0, 20).unwrap().is_empty());
    }

    #[test]
    fn test_search_empty_graph() {
        let (graph, _index, _temp) = create_graph(4);
        assert!(graph.search(&[0.0; 4], 10, 20).unwrap().is_empty());
    }

    #[test]
    fn test_search_skips_unresolvable_names() {
        let (graph, _points, _index, _temp) = populated_graph();
        let full = graph.search_scored(&[0.0, 0.0], 10, 40).unwrap();
        assert_eq!(full.len(), 10);

        let victim = full[3].id;
        graph
            .storage
            .delete(&NameRevKey::new(graph.id(), victim).to_bytes())
            .unwrap();

        let hits = graph.search_scored(&[0.0, 0.0], 10, 40).unwrap();
        assert_eq!(hits.len(), 9);
        assert!(hits.iter().all(|h| h.id != victim));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let (graph, _index, _temp) = create_graph(2);
        graph.insert(b"a", &[0.0, 0.0]).unwrap();
        let err = graph.insert(b"a", &[9.0, 9.0]).unwrap_err();
        assert!(matches!(err, GraphError::AlreadyExists(_)));
        assert_eq!(graph.get_vector(ENTRY_POINT_ID).unwrap(), vec![0.0, 0.0]);
        assert_eq!(graph.stats().unwrap().vector_count, 1);
    }

    #[test]
    fn test_dimension_mismatch() {
        let (graph, _index, _temp) = create_graph(3);
        assert!(matches!(
            graph.insert(b"a", &[1.0]),
            Err(GraphError::DimensionMismatch { expected: 3, actual: 1 })
        ));
        assert!(matches!(
            graph.search(&[1.0, 2.0], 1, 1),
            Err(GraphError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_non_finite_insert_rejected() {
        let (graph, _index, _temp) = create_graph(2);
        graph.insert(b"a", &[1.0, 0.0]).unwrap();

        assert!(matches!(
            graph.insert(b"nan", &[f32::NAN, 0.0]),
            Err(GraphError::NonFiniteVector { index: 0 })
        ));
        assert!(matches!(
            graph.insert(b"inf", &[0.0, f32::INFINITY]),
            Err(GraphError::NonFiniteVector { index: 1 })
        ));
        assert_eq!(graph.lookup(b"nan").unwrap(), None);
        assert_eq!(graph.stats().unwrap().vector_count, 1);

        graph.insert(b"b", &[2.0, 0.0]).unwrap();
        let hits = graph.search_scored(&[0.9, 0.0], 2, 10).unwrap();
        let names: Vec<&[u8]> = hits.iter().map(|h| h.name.as_slice()).collect();
        assert_eq!(names, vec![b"a".as_slice(), b"b".as_slice()]);
        assert!(hits.iter().all(|h| h.distance.is_finite()));
    }

    #[test]
    fn test_non_finite_query_rejected() {
        let (graph, _index, _temp) = create_graph(2);
        graph.insert(b"a", &[1.0, 0.0]).unwrap();
        assert!(matches!(
            graph.search(&[0.0, f32::NAN], 1, 10),
            Err(GraphError::NonFiniteVector { index: 1 })
        ));
        assert!(matches!(
            graph.search(&[f32::NEG_INFINITY, 0.0], 1, 10),
            Err(GraphError::NonFiniteVector { index: 0 })
        ));
    }

    #[test]
    fn test_layer_search_rejects_zero_entry_point() {
        let (graph, _index, _temp) = create_graph(2);
        graph.insert(b"a", &[0.0, 0.0]).unwrap();
        assert!(matches!(
            graph.layer_search(&[0.0, 0.0], 0, 0, 5),
            Err(GraphError::InvalidEntryPoint)
        ));
    }

    #[test]
    fn test_layer_search_from_isolated_node() {
        let (graph, _index, _temp) = create_graph(2);
        graph.insert(b"a", &[1.0, 1.0]).unwrap();
        let (ids, dists) = graph.layer_search(&[1.0, 2.0], 3, ENTRY_POINT_ID, 5).unwrap();
        assert_eq!(ids, vec![ENTRY_POINT_ID]);
        assert_eq!(dists, vec![1.0]);
    }

    #[test]
    fn test_random_level_distribution() {
        let params = GraphParams::new(4, 5, 10);
        let mut rng = StdRng::seed_from_u64(42);
        let draws = 20_000;
        let mut counts = [0usize; 256];
        for _ in 0..draws {
            counts[random_level(params.level_mult(), &mut rng) as usize] += 1;
        }
        // P(level >= 1) = 1 / M
        let ground = counts[0] as f64 / draws as f64;
        assert!((0.75..0.85).contains(&ground), "ground fraction {}", ground);
        assert!(counts[1] > counts[2]);
    }
}
