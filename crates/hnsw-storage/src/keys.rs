//! Binary key schema for the graph.
//!
//! Every key starts with a one-byte tag naming its family:
//!
//! | tag | key                                              | value               |
//! |-----|--------------------------------------------------|---------------------|
//! | `g` | name                                             | graph record        |
//! | `e` | graph_id(4 LE) name                              | vector_id(8 LE)     |
//! | `E` | graph_id(4 LE) vector_id(8 LE)                   | name                |
//! | `v` | graph_id(4 LE) vector_id(8 LE)                   | f32 components (BE) |
//! | `l` | graph_id(4 LE) layer(1) source(8 LE) dist(4 BE)  | dest(8 LE)          |
//!
//! The layer key stores the IEEE-754 bit pattern of the distance big-endian.
//! For non-negative floats that byte order agrees with numeric order, so a
//! scan over `(graph_id, layer, source)` yields neighbors nearest-first.
//! The trick does not hold for negative values.
//!
//! Ids are little-endian; no ordering on raw id bytes is relied upon other
//! than fixed width, which keeps each source's edges contiguous.

use crate::error::StorageError;

pub const GRAPH_TAG: u8 = b'g';
pub const NAME_TAG: u8 = b'e';
pub const NAME_REV_TAG: u8 = b'E';
pub const VECTOR_TAG: u8 = b'v';
pub const LAYER_TAG: u8 = b'l';

const GRAPH_PREFIX_LEN: usize = 5;
const ID_KEY_LEN: usize = 13;
const LAYER_NODE_PREFIX_LEN: usize = 14;
const LAYER_KEY_LEN: usize = 18;

fn graph_prefix(tag: u8, graph_id: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(ID_KEY_LEN);
    out.push(tag);
    out.extend_from_slice(&graph_id.to_le_bytes());
    out
}

fn check_key(bytes: &[u8], tag: u8, min_len: usize, family: &str) -> Result<(), StorageError> {
    if bytes.len() < min_len || bytes[0] != tag {
        return Err(StorageError::Key(format!(
            "Invalid {} key: {} bytes",
            family,
            bytes.len()
        )));
    }
    Ok(())
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}

/// Encode a vector id value (name key, layer key values).
pub fn encode_id(id: u64) -> [u8; 8] {
    id.to_le_bytes()
}

/// Decode a vector id value.
pub fn decode_id(bytes: &[u8]) -> Result<u64, StorageError> {
    if bytes.len() != 8 {
        return Err(StorageError::Key(format!(
            "Invalid id value: {} bytes",
            bytes.len()
        )));
    }
    Ok(read_u64(bytes, 0))
}

/// Encode vector components, each f32 big-endian, densely packed.
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        out.extend_from_slice(&v.to_bits().to_be_bytes());
    }
    out
}

/// Decode vector components; the dimension is `bytes.len() / 4`.
pub fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>, StorageError> {
    if bytes.len() % 4 != 0 {
        return Err(StorageError::Key(format!(
            "Vector value length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_bits(u32::from_be_bytes([c[0], c[1], c[2], c[3]])))
        .collect())
}

/// Key for the graph registry: graph name to its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphKey {
    pub name: Vec<u8>,
}

impl GraphKey {
    pub fn new(name: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into() }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.name.len() + 1);
        out.push(GRAPH_TAG);
        out.extend_from_slice(&self.name);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        check_key(bytes, GRAPH_TAG, 1, "graph")?;
        Ok(Self {
            name: bytes[1..].to_vec(),
        })
    }

    /// Prefix shared by every graph key
    pub fn prefix() -> Vec<u8> {
        vec![GRAPH_TAG]
    }
}

/// Value stored under a [`GraphKey`].
///
/// Layout: graph_id, m, dim, ef_construction; each u32 little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphRecord {
    pub graph_id: u32,
    pub m: u32,
    pub dim: u32,
    pub ef_construction: u32,
}

impl GraphRecord {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        out.extend_from_slice(&self.graph_id.to_le_bytes());
        out.extend_from_slice(&self.m.to_le_bytes());
        out.extend_from_slice(&self.dim.to_le_bytes());
        out.extend_from_slice(&self.ef_construction.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        if bytes.len() != 16 {
            return Err(StorageError::Key(format!(
                "Invalid graph record: {} bytes",
                bytes.len()
            )));
        }
        Ok(Self {
            graph_id: read_u32(bytes, 0),
            m: read_u32(bytes, 4),
            dim: read_u32(bytes, 8),
            ef_construction: read_u32(bytes, 12),
        })
    }
}

/// Key mapping an external name to its vector id within a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameKey {
    pub graph_id: u32,
    pub name: Vec<u8>,
}

impl NameKey {
    pub fn new(graph_id: u32, name: impl Into<Vec<u8>>) -> Self {
        Self {
            graph_id,
            name: name.into(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = graph_prefix(NAME_TAG, self.graph_id);
        out.extend_from_slice(&self.name);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        check_key(bytes, NAME_TAG, GRAPH_PREFIX_LEN, "name")?;
        Ok(Self {
            graph_id: read_u32(bytes, 1),
            name: bytes[GRAPH_PREFIX_LEN..].to_vec(),
        })
    }

    pub fn graph_prefix(graph_id: u32) -> Vec<u8> {
        graph_prefix(NAME_TAG, graph_id)
    }
}

/// Key mapping a vector id back to its external name.
///
/// Scanning [`NameRevKey::graph_prefix`] enumerates every id ever allocated
/// in a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameRevKey {
    pub graph_id: u32,
    pub vector_id: u64,
}

impl NameRevKey {
    pub fn new(graph_id: u32, vector_id: u64) -> Self {
        Self {
            graph_id,
            vector_id,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = graph_prefix(NAME_REV_TAG, self.graph_id);
        out.extend_from_slice(&self.vector_id.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        check_key(bytes, NAME_REV_TAG, ID_KEY_LEN, "name-reverse")?;
        Ok(Self {
            graph_id: read_u32(bytes, 1),
            vector_id: read_u64(bytes, 5),
        })
    }

    pub fn graph_prefix(graph_id: u32) -> Vec<u8> {
        graph_prefix(NAME_REV_TAG, graph_id)
    }
}

/// Key of a stored vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorKey {
    pub graph_id: u32,
    pub vector_id: u64,
}

impl VectorKey {
    pub fn new(graph_id: u32, vector_id: u64) -> Self {
        Self {
            graph_id,
            vector_id,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = graph_prefix(VECTOR_TAG, self.graph_id);
        out.extend_from_slice(&self.vector_id.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        check_key(bytes, VECTOR_TAG, ID_KEY_LEN, "vector")?;
        Ok(Self {
            graph_id: read_u32(bytes, 1),
            vector_id: read_u64(bytes, 5),
        })
    }
}

/// Key of one directed layer edge; the value is the destination id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerKey {
    pub graph_id: u32,
    pub layer: u8,
    pub source: u64,
    /// Must be non-negative for scans to come back sorted
    pub distance: f32,
}

impl LayerKey {
    pub fn new(graph_id: u32, layer: u8, source: u64, distance: f32) -> Self {
        Self {
            graph_id,
            layer,
            source,
            distance,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Self::node_prefix(self.graph_id, self.layer, self.source);
        out.extend_from_slice(&self.distance.to_bits().to_be_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        check_key(bytes, LAYER_TAG, LAYER_KEY_LEN, "layer")?;
        let d = &bytes[LAYER_NODE_PREFIX_LEN..LAYER_KEY_LEN];
        Ok(Self {
            graph_id: read_u32(bytes, 1),
            layer: bytes[5],
            source: read_u64(bytes, 6),
            distance: f32::from_bits(u32::from_be_bytes([d[0], d[1], d[2], d[3]])),
        })
    }

    /// Prefix of every edge leaving `source` at `layer`
    pub fn node_prefix(graph_id: u32, layer: u8, source: u64) -> Vec<u8> {
        let mut out = Self::layer_prefix(graph_id, layer);
        out.extend_from_slice(&source.to_le_bytes());
        out
    }

    /// Prefix of every edge at `layer`
    pub fn layer_prefix(graph_id: u32, layer: u8) -> Vec<u8> {
        let mut out = graph_prefix(LAYER_TAG, graph_id);
        out.push(layer);
        out
    }

    /// Prefix of every edge of the graph, all layers
    pub fn graph_prefix(graph_id: u32) -> Vec<u8> {
        graph_prefix(LAYER_TAG, graph_id)
    }
}
