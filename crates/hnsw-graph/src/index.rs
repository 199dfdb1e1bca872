//! Store handle and graph registry.
//!
//! One [`HnswIndex`] owns the RocksDB instance. Graphs are registered by name
//! under the graph tag; each record carries the graph's numeric id, which
//! prefixes every other key belonging to that graph.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use hnsw_storage::{GraphKey, GraphRecord, Storage};
use hnsw_types::{ConfigError, GraphParams};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::GraphError;
use crate::graph::Graph;
use crate::vector_store::IdAllocator;

/// A registered graph as listed by [`HnswIndex::list_graphs`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphInfo {
    pub name: String,
    pub graph_id: u32,
    pub params: GraphParams,
}

/// Handle to the store holding every graph.
pub struct HnswIndex {
    storage: Arc<Storage>,
    /// Writer lock and id allocator per graph id, shared by all handles
    registry: Mutex<HashMap<u32, Arc<Mutex<IdAllocator>>>>,
}

impl HnswIndex {
    /// Open (or create) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, GraphError> {
        let storage = Storage::open(path)?;
        Ok(Self {
            storage: Arc::new(storage),
            registry: Mutex::new(HashMap::new()),
        })
    }

    /// Flush and release the store.
    ///
    /// If graph handles are still alive the store stays open until the last
    /// one is dropped; it is flushed either way.
    pub fn close(self) -> Result<(), GraphError> {
        match Arc::try_unwrap(self.storage) {
            Ok(storage) => storage.close()?,
            Err(shared) => {
                warn!(
                    handles = Arc::strong_count(&shared) - 1,
                    "Closing index with live graph handles"
                );
                shared.flush()?;
            }
        }
        Ok(())
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// Register a new graph and return a handle to it.
    pub fn create_graph(
        &self,
        name: &str,
        dim: usize,
        m: u8,
        ef_construction: usize,
    ) -> Result<Graph, GraphError> {
        let params = GraphParams::new(dim, m, ef_construction);
        params.validate()?;

        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);

        let key = GraphKey::new(name).to_bytes();
        if self.storage.get(&key)?.is_some() {
            return Err(GraphError::GraphExists(name.to_string()));
        }

        let graph_id = match self.max_graph_id()? {
            Some(max) => max.checked_add(1).ok_or_else(|| {
                GraphError::InvalidConfig(ConfigError::Invalid("graph ids exhausted".to_string()))
            })?,
            None => 0,
        };

        let record = GraphRecord {
            graph_id,
            m: u32::from(m),
            dim: to_u32(dim, "dim")?,
            ef_construction: to_u32(ef_construction, "ef_construction")?,
        };
        self.storage.put(&key, &record.to_bytes())?;

        info!(graph = name, graph_id, dim, m, ef_construction, "Created graph");
        Ok(self.handle(&mut registry, name, graph_id, params))
    }

    /// Handle to an existing graph.
    pub fn open_graph(&self, name: &str) -> Result<Graph, GraphError> {
        let record = self
            .read_record(name)?
            .ok_or_else(|| GraphError::NotFound(format!("graph {}", name)))?;
        let params = params_from_record(&record)?;

        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.handle(&mut registry, name, record.graph_id, params))
    }

    /// Open `name`, creating it with `params` when absent.
    ///
    /// An existing graph whose parameters differ from `params` is an error.
    pub fn open_or_create_graph(
        &self,
        name: &str,
        params: GraphParams,
    ) -> Result<Graph, GraphError> {
        match self.open_graph(name) {
            Ok(graph) => {
                if *graph.params() != params {
                    return Err(GraphError::InvalidConfig(ConfigError::Invalid(format!(
                        "graph {} exists with {:?}, requested {:?}",
                        name,
                        graph.params(),
                        params
                    ))));
                }
                Ok(graph)
            }
            Err(GraphError::NotFound(_)) => {
                self.create_graph(name, params.dim, params.m, params.ef_construction)
            }
            Err(e) => Err(e),
        }
    }

    /// Every registered graph, in name order.
    pub fn list_graphs(&self) -> Result<Vec<GraphInfo>, GraphError> {
        let mut graphs = Vec::new();
        for item in self.storage.prefix_iter(&GraphKey::prefix()) {
            let (key, value) = item?;
            let name = String::from_utf8_lossy(&GraphKey::from_bytes(&key)?.name).into_owned();
            let record = GraphRecord::from_bytes(&value)?;
            graphs.push(GraphInfo {
                name,
                graph_id: record.graph_id,
                params: params_from_record(&record)?,
            });
        }
        Ok(graphs)
    }

    fn read_record(&self, name: &str) -> Result<Option<GraphRecord>, GraphError> {
        match self.storage.get(&GraphKey::new(name).to_bytes())? {
            Some(value) => Ok(Some(GraphRecord::from_bytes(&value)?)),
            None => Ok(None),
        }
    }

    fn max_graph_id(&self) -> Result<Option<u32>, GraphError> {
        let mut max_id = None;
        for item in self.storage.prefix_iter(&GraphKey::prefix()) {
            let (_, value) = item?;
            let id = GraphRecord::from_bytes(&value)?.graph_id;
            max_id = max_id.max(Some(id));
        }
        Ok(max_id)
    }

    fn handle(
        &self,
        registry: &mut HashMap<u32, Arc<Mutex<IdAllocator>>>,
        name: &str,
        graph_id: u32,
        params: GraphParams,
    ) -> Graph {
        let writer = registry.entry(graph_id).or_default().clone();
        Graph::new(
            name.to_string(),
            graph_id,
            params,
            self.storage.clone(),
            writer,
        )
    }
}

fn to_u32(value: usize, field: &str) -> Result<u32, GraphError> {
    u32::try_from(value).map_err(|_| {
        GraphError::InvalidConfig(ConfigError::Invalid(format!(
            "{} too large: {}",
            field, value
        )))
    })
}

fn params_from_record(record: &GraphRecord) -> Result<GraphParams, GraphError> {
    let m = u8::try_from(record.m).map_err(|_| {
        GraphError::InvalidConfig(ConfigError::Invalid(format!(
            "stored m out of range: {}",
            record.m
        )))
    })?;
    Ok(GraphParams::new(
        record.dim as usize,
        m,
        record.ef_construction as usize,
    ))
}
