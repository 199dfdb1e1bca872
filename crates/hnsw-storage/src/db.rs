//! RocksDB wrapper for hnsw-index storage.
//!
//! Provides:
//! - Database open/close
//! - Single-key reads and writes, multi-gets
//! - Lazy forward iteration bounded by a key prefix
//! - Atomic write batches

use rocksdb::{DBIteratorWithThreadMode, Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use tracing::{debug, info};

use crate::error::StorageError;

/// Main storage interface. One instance holds every graph.
pub struct Storage {
    db: DB,
}

impl Storage {
    /// Open storage at the given path, creating it if necessary
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening storage at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.set_max_background_jobs(4);

        let db = DB::open(&db_opts, path)?;
        Ok(Self { db })
    }

    /// Flush memtables and release the database.
    pub fn close(self) -> Result<(), StorageError> {
        self.flush()?;
        info!("Closed storage at {:?}", self.db.path());
        Ok(())
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.db.get(key)?)
    }

    /// Read several keys at once; results are in the order of `keys`.
    pub fn multi_get<K: AsRef<[u8]>>(
        &self,
        keys: &[K],
    ) -> Result<Vec<Option<Vec<u8>>>, StorageError> {
        self.db
            .multi_get(keys.iter().map(|k| k.as_ref()))
            .into_iter()
            .map(|r| r.map_err(StorageError::from))
            .collect()
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.db.put(key, value)?;
        Ok(())
    }

    pub fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
        self.db.delete(key)?;
        Ok(())
    }

    /// Iterate entries whose key starts with `prefix`, in byte order.
    ///
    /// The iterator seeks to `prefix` and stops at the first key that does
    /// not share it. Entries are read lazily.
    pub fn prefix_iter(&self, prefix: &[u8]) -> PrefixIter<'_> {
        let inner = self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward));
        PrefixIter {
            inner,
            prefix: prefix.to_vec(),
            done: false,
        }
    }

    /// Commit a batch atomically: all of its writes become visible together
    /// or none do.
    pub fn commit(&self, batch: Batch) -> Result<(), StorageError> {
        let count = batch.len();
        self.db.write(batch.inner)?;
        debug!(writes = count, "Committed batch");
        Ok(())
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

/// A group of writes committed with [`Storage::commit`].
///
/// Dropping an uncommitted batch discards it.
#[derive(Default)]
pub struct Batch {
    inner: WriteBatch,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.inner.put(key, value);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Forward iterator over the entries sharing a key prefix.
pub struct PrefixIter<'a> {
    inner: DBIteratorWithThreadMode<'a, DB>,
    prefix: Vec<u8>,
    done: bool,
}

impl Iterator for PrefixIter<'_> {
    type Item = Result<(Box<[u8]>, Box<[u8]>), StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next()? {
            Ok((key, value)) => {
                if key.starts_with(&self.prefix) {
                    Some(Ok((key, value)))
                } else {
                    self.done = true;
                    None
                }
            }
            Err(e) => {
                self.done = true;
                Some(Err(e.into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{encode_id, LayerKey};
    use tempfile::TempDir;

    fn create_test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::open(temp_dir.path()).unwrap();
        (storage, temp_dir)
    }

    #[test]
    fn test_put_and_get() {
        let (storage, _temp) = create_test_storage();
        storage.put(b"key", b"value").unwrap();
        assert_eq!(storage.get(b"key").unwrap(), Some(b"value".to_vec()));
        assert_eq!(storage.get(b"missing").unwrap(), None);

        storage.delete(b"key").unwrap();
        assert_eq!(storage.get(b"key").unwrap(), None);
    }

    #[test]
    fn test_multi_get_preserves_order() {
        let (storage, _temp) = create_test_storage();
        storage.put(b"a", b"1").unwrap();
        storage.put(b"c", b"3").unwrap();

        let keys: [&[u8]; 3] = [b"c", b"b", b"a"];
        let values = storage.multi_get(&keys).unwrap();
        assert_eq!(values, vec![Some(b"3".to_vec()), None, Some(b"1".to_vec())]);
    }

    #[test]
    fn test_prefix_iter_stops_at_prefix_end() {
        let (storage, _temp) = create_test_storage();
        storage.put(b"aa", b"0").unwrap();
        storage.put(b"ab1", b"1").unwrap();
        storage.put(b"ab2", b"2").unwrap();
        storage.put(b"ac", b"3").unwrap();

        let keys: Vec<Vec<u8>> = storage
            .prefix_iter(b"ab")
            .map(|r| r.unwrap().0.to_vec())
            .collect();
        assert_eq!(keys, vec![b"ab1".to_vec(), b"ab2".to_vec()]);

        assert_eq!(storage.prefix_iter(b"zz").count(), 0);
    }

    #[test]
    fn test_batch_commit() {
        let (storage, _temp) = create_test_storage();
        let mut batch = Batch::new();
        assert!(batch.is_empty());
        batch.put(b"x", b"1");
        batch.put(b"y", b"2");
        assert_eq!(batch.len(), 2);

        assert_eq!(storage.get(b"x").unwrap(), None);
        storage.commit(batch).unwrap();
        assert_eq!(storage.get(b"x").unwrap(), Some(b"1".to_vec()));
        assert_eq!(storage.get(b"y").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn test_dropped_batch_writes_nothing() {
        let (storage, _temp) = create_test_storage();
        {
            let mut batch = Batch::new();
            batch.put(b"x", b"1");
        }
        assert_eq!(storage.get(b"x").unwrap(), None);
    }

    #[test]
    fn test_layer_keys_iterate_in_order() {
        let (storage, _temp) = create_test_storage();
        let data: [(u64, &[f32]); 3] = [
            (1, &[13.0, 16.0, 23.0, 67.0, 3000.0]),
            (2, &[1.0, 73.0, 1023.0, 6.0]),
            (4048, &[1023.0, 1.0, 6.0, 73.0]),
        ];
        for (source, dists) in data {
            for d in dists {
                storage
                    .put(&LayerKey::new(1, 2, source, *d).to_bytes(), &encode_id(0))
                    .unwrap();
            }
        }

        let mut seen_sources: Vec<u64> = Vec::new();
        let mut cur_dist = 0.0f32;
        let mut count = 0;
        for item in storage.prefix_iter(&LayerKey::layer_prefix(1, 2)) {
            let (key, _) = item.unwrap();
            let parsed = LayerKey::from_bytes(&key).unwrap();
            assert_eq!(parsed.layer, 2);
            if seen_sources.last() != Some(&parsed.source) {
                assert!(
                    !seen_sources.contains(&parsed.source),
                    "edges of source {} are not contiguous",
                    parsed.source
                );
                seen_sources.push(parsed.source);
                cur_dist = 0.0;
            }
            assert!(cur_dist <= parsed.distance);
            cur_dist = parsed.distance;
            count += 1;
        }
        assert_eq!(count, 13);
        assert_eq!(seen_sources, vec![1, 2, 4048]);
    }

    #[test]
    fn test_node_prefix_scan_is_nearest_first() {
        use rand::Rng;

        let (storage, _temp) = create_test_storage();
        let mut rng = rand::rng();
        let mut expected: Vec<f32> = (0..50).map(|_| rng.random_range(0.0..100.0)).collect();
        for (i, d) in expected.iter().enumerate() {
            storage
                .put(&LayerKey::new(0, 0, 5, *d).to_bytes(), &encode_id(i as u64))
                .unwrap();
            storage
                .put(&LayerKey::new(0, 0, 6, *d).to_bytes(), &encode_id(i as u64))
                .unwrap();
        }
        expected.sort_by(f32::total_cmp);

        let got: Vec<f32> = storage
            .prefix_iter(&LayerKey::node_prefix(0, 0, 5))
            .map(|r| LayerKey::from_bytes(&r.unwrap().0).unwrap().distance)
            .collect();
        assert_eq!(got, expected);
    }
}
