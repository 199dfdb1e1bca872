//! Search quality E2E tests for hnsw-index.
//!
//! Builds graphs of random 50-dimensional vectors and checks that search
//! finds what brute force finds.

use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

use e2e_tests::{brute_force, insert_numbered, name_index, random_vectors, TestHarness};
use hnsw_graph::euclidean;

const DIM: usize = 50;
const COUNT: usize = 100;
const TRIALS: u64 = 10;

/// Querying with a stored vector finds that vector in at least 80% of
/// freshly built graphs.
#[test]
fn test_self_query_recall() {
    let mut found = 0;
    for trial in 0..TRIALS {
        let harness = TestHarness::new();
        let graph = harness.create_graph("recall", DIM);
        let mut rng = StdRng::seed_from_u64(trial);
        let vectors = random_vectors(&mut rng, COUNT, DIM);
        insert_numbered(&graph, &vectors);

        let names = graph.search(&vectors[10], 10, 20).unwrap();
        assert!(names.len() <= 10);
        if names.iter().any(|n| n.as_slice() == b"10") {
            found += 1;
        }
    }

    let recall = found as f64 / TRIALS as f64;
    assert!(recall >= 0.8, "recall {} below 0.8", recall);
}

/// Scored results are ordered and carry true distances.
#[test]
fn test_scored_results_match_stored_vectors() {
    let harness = TestHarness::new();
    let graph = harness.create_graph("scored", DIM);
    let mut rng = StdRng::seed_from_u64(99);
    let vectors = random_vectors(&mut rng, COUNT, DIM);
    insert_numbered(&graph, &vectors);

    let query = random_vectors(&mut rng, 1, DIM).remove(0);
    let hits = graph.search_scored(&query, 10, 20).unwrap();
    assert_eq!(hits.len(), 10);

    for pair in hits.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
    for hit in &hits {
        let idx = name_index(&hit.name);
        assert_eq!(graph.lookup(&hit.name).unwrap(), Some(hit.id));
        assert_eq!(hit.distance, euclidean(&query, &vectors[idx]));
    }
}

/// With a beam and neighbor fetch wider than the graph, layer 0 search is
/// exhaustive.
#[test]
fn test_wide_beam_matches_brute_force() {
    let harness = TestHarness::new();
    let graph = harness.index.create_graph("exact", 8, 5, 100).unwrap();
    let mut rng = StdRng::seed_from_u64(5);
    let vectors = random_vectors(&mut rng, 60, 8);
    insert_numbered(&graph, &vectors);

    let query = random_vectors(&mut rng, 1, 8).remove(0);
    let got: Vec<usize> = graph
        .search(&query, 5, 100)
        .unwrap()
        .iter()
        .map(|n| name_index(n))
        .collect();
    assert_eq!(got, brute_force(&vectors, &query, 5));
}
