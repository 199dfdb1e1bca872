//! Vector persistence and id allocation.
//!
//! Each inserted vector gets a graph-scoped id, allocated densely from 1.
//! Three records describe it: name -> id, id -> vector and id -> name.
//! They are written one after another, not as one atomic unit; a crash in
//! between can leave a name without its reverse mapping.

use std::sync::Arc;

use hnsw_storage::keys::{decode_id, decode_vector, encode_id, encode_vector};
use hnsw_storage::{NameKey, NameRevKey, Storage, VectorKey};
use tracing::debug;

use crate::error::GraphError;

/// Cached next id for one graph.
///
/// Starts empty; the first allocation scans the graph's name-reverse records
/// for the highest id, after which allocation is O(1). Callers must hold the
/// graph's writer lock while using it.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: Option<u64>,
}

impl IdAllocator {
    fn peek(&mut self, store: &VectorStore) -> Result<u64, GraphError> {
        if let Some(next) = self.next {
            return Ok(next);
        }
        let next = store.max_allocated_id()? + 1;
        self.next = Some(next);
        Ok(next)
    }

    fn advance(&mut self, allocated: u64) {
        self.next = Some(allocated + 1);
    }
}

/// Vector records of one graph.
#[derive(Clone)]
pub struct VectorStore {
    storage: Arc<Storage>,
    graph_id: u32,
}

impl VectorStore {
    pub fn new(storage: Arc<Storage>, graph_id: u32) -> Self {
        Self { storage, graph_id }
    }

    pub fn graph_id(&self) -> u32 {
        self.graph_id
    }

    /// Highest id ever allocated in this graph, 0 when none.
    ///
    /// Ids are stored little-endian, so the scan visits every record rather
    /// than trusting the last key.
    pub fn max_allocated_id(&self) -> Result<u64, GraphError> {
        let mut max_id = 0;
        for item in self
            .storage
            .prefix_iter(&NameRevKey::graph_prefix(self.graph_id))
        {
            let (key, _) = item?;
            max_id = max_id.max(NameRevKey::from_bytes(&key)?.vector_id);
        }
        Ok(max_id)
    }

    /// Number of vectors stored in this graph.
    pub fn count(&self) -> Result<u64, GraphError> {
        let mut count = 0;
        for item in self
            .storage
            .prefix_iter(&NameRevKey::graph_prefix(self.graph_id))
        {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Assign the next id to `name` and persist its three records.
    ///
    /// The allocator only advances once all three writes succeeded, so a
    /// failed insert leaves no gap in the id sequence.
    pub fn allocate_and_insert(
        &self,
        allocator: &mut IdAllocator,
        name: &[u8],
        vector: &[f32],
    ) -> Result<u64, GraphError> {
        let id = allocator.peek(self)?;

        self.storage.put(
            &NameKey::new(self.graph_id, name).to_bytes(),
            &encode_id(id),
        )?;
        self.storage.put(
            &VectorKey::new(self.graph_id, id).to_bytes(),
            &encode_vector(vector),
        )?;
        self.storage
            .put(&NameRevKey::new(self.graph_id, id).to_bytes(), name)?;

        allocator.advance(id);
        debug!(graph_id = self.graph_id, id, "Stored vector");
        Ok(id)
    }

    /// Id assigned to `name`, if any.
    pub fn lookup(&self, name: &[u8]) -> Result<Option<u64>, GraphError> {
        match self
            .storage
            .get(&NameKey::new(self.graph_id, name).to_bytes())?
        {
            Some(value) => Ok(Some(decode_id(&value)?)),
            None => Ok(None),
        }
    }

    /// Vector stored under `id`, `None` when absent.
    pub fn find_vector(&self, id: u64) -> Result<Option<Vec<f32>>, GraphError> {
        match self
            .storage
            .get(&VectorKey::new(self.graph_id, id).to_bytes())?
        {
            Some(value) => Ok(Some(decode_vector(&value)?)),
            None => Ok(None),
        }
    }

    pub fn get_vector(&self, id: u64) -> Result<Vec<f32>, GraphError> {
        self.find_vector(id)?.ok_or_else(|| {
            GraphError::NotFound(format!("vector {} in graph {}", id, self.graph_id))
        })
    }

    /// Vectors for several ids, in the order given. Any missing id fails the
    /// whole call.
    pub fn get_vectors(&self, ids: &[u64]) -> Result<Vec<Vec<f32>>, GraphError> {
        let keys: Vec<Vec<u8>> = ids
            .iter()
            .map(|id| VectorKey::new(self.graph_id, *id).to_bytes())
            .collect();
        self.storage
            .multi_get(&keys)?
            .into_iter()
            .zip(ids)
            .map(|(value, id)| match value {
                Some(bytes) => Ok(decode_vector(&bytes)?),
                None => Err(GraphError::NotFound(format!(
                    "vector {} in graph {}",
                    id, self.graph_id
                ))),
            })
            .collect()
    }

    pub fn get_name(&self, id: u64) -> Result<Vec<u8>, GraphError> {
        self.storage
            .get(&NameRevKey::new(self.graph_id, id).to_bytes())?
            .ok_or_else(|| {
                GraphError::NotFound(format!("name of {} in graph {}", id, self.graph_id))
            })
    }
}
