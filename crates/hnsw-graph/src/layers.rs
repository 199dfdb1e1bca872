//! Lazy enumeration of a layer's edges.
//!
//! A background thread scans the layer prefix and feeds a bounded channel;
//! the consumer pulls edges as an iterator. Dropping the iterator closes the
//! channel, the producer's next send fails and the thread exits.

use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;

use hnsw_storage::keys::decode_id;
use hnsw_storage::{LayerKey, Storage, StorageError};
use hnsw_types::LayerEdge;
use tracing::trace;

use crate::error::GraphError;

/// Edges buffered between the scan thread and the consumer
pub const LAYER_SCAN_BUFFER: usize = 10;

/// Iterator over the directed edges of one layer, in key order: grouped by
/// source, nearest destination first within each group.
pub struct LayerEdges {
    rx: Receiver<Result<LayerEdge, StorageError>>,
}

impl LayerEdges {
    pub(crate) fn spawn(
        storage: Arc<Storage>,
        graph_id: u32,
        layer: u8,
    ) -> Result<Self, GraphError> {
        let (tx, rx) = mpsc::sync_channel(LAYER_SCAN_BUFFER);

        thread::Builder::new()
            .name(format!("hnsw-layer-scan-{}-{}", graph_id, layer))
            .spawn(move || {
                let prefix = LayerKey::layer_prefix(graph_id, layer);
                for item in storage.prefix_iter(&prefix) {
                    let edge = item.and_then(|(key, value)| decode_edge(&key, &value));
                    let failed = edge.is_err();
                    if tx.send(edge).is_err() {
                        trace!(graph_id, layer, "Layer scan consumer went away");
                        return;
                    }
                    if failed {
                        return;
                    }
                }
            })?;

        Ok(Self { rx })
    }
}

fn decode_edge(key: &[u8], value: &[u8]) -> Result<LayerEdge, StorageError> {
    let key = LayerKey::from_bytes(key)?;
    Ok(LayerEdge {
        source: key.source,
        dest: decode_id(value)?,
        distance: key.distance,
    })
}

impl Iterator for LayerEdges {
    type Item = Result<LayerEdge, GraphError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok().map(|r| r.map_err(GraphError::from))
    }
}
