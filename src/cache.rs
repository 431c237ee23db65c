//! Time-limited in-memory cache of loaded datasets.
//!
//! Re-reading a multi-day harp log is the slow part of interactive work, so
//! loaded datasets are kept keyed by path for a fixed time-to-live. The cache
//! is an ordinary value owned by the caller; there is no process-wide state.

use crate::constants::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_SECS};
use crate::dataset::HarpDataset;
use crate::error::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug)]
struct Entry {
    dataset: Arc<HarpDataset>,
    loaded_at: Instant,
}

/// Bounded TTL cache of datasets keyed by source path
#[derive(Debug)]
pub struct DatasetCache {
    capacity: usize,
    ttl: Duration,
    entries: HashMap<PathBuf, Entry>,
    hits: usize,
    misses: usize,
}

impl Default for DatasetCache {
    fn default() -> Self {
        Self::new(
            DEFAULT_CACHE_CAPACITY,
            Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        )
    }
}

impl DatasetCache {
    /// `capacity` of zero disables caching
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Cached dataset for `path`, or the result of `load` if absent or expired
    pub fn get_or_load<F>(&mut self, path: &Path, load: F) -> Result<Arc<HarpDataset>>
    where
        F: FnOnce(&Path) -> Result<HarpDataset>,
    {
        self.get_or_load_at(path, Instant::now(), load)
    }

    /// As [`get_or_load`](Self::get_or_load) with an explicit clock reading
    pub fn get_or_load_at<F>(
        &mut self,
        path: &Path,
        now: Instant,
        load: F,
    ) -> Result<Arc<HarpDataset>>
    where
        F: FnOnce(&Path) -> Result<HarpDataset>,
    {
        if let Some(entry) = self.entries.get(path) {
            if now.saturating_duration_since(entry.loaded_at) < self.ttl {
                self.hits += 1;
                debug!("Cache hit for {}", path.display());
                return Ok(Arc::clone(&entry.dataset));
            }
            debug!("Cache entry for {} expired", path.display());
            self.entries.remove(path);
        }

        self.misses += 1;
        let dataset = Arc::new(load(path)?);
        if self.capacity == 0 {
            return Ok(dataset);
        }

        while self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.loaded_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    debug!("Evicting {} from dataset cache", key.display());
                    self.entries.remove(&key);
                }
                None => break,
            }
        }

        self.entries.insert(
            path.to_path_buf(),
            Entry {
                dataset: Arc::clone(&dataset),
                loaded_at: now,
            },
        );
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// (hits, misses) since creation
    pub fn counters(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Variable;
    use crate::error::HarpError;
    use chrono::NaiveDate;
    use ndarray::Array3;
    use std::cell::Cell;

    fn tiny_dataset() -> HarpDataset {
        let time = vec![
            NaiveDate::from_ymd_opt(2019, 1, 24)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        ];
        HarpDataset::new(
            time,
            vec![0],
            vec![0],
            vec![Variable::new("r16", "Ohm", Array3::zeros((1, 1, 1)))],
        )
        .unwrap()
    }

    #[test]
    fn test_hit_within_ttl_returns_same_dataset() {
        let mut cache = DatasetCache::new(1, Duration::from_secs(600));
        let loads = Cell::new(0);
        let load = |_: &Path| {
            loads.set(loads.get() + 1);
            Ok::<_, HarpError>(tiny_dataset())
        };
        let now = Instant::now();

        let first = cache.get_or_load_at(Path::new("a.dat"), now, load).unwrap();
        let second = cache
            .get_or_load_at(Path::new("a.dat"), now + Duration::from_secs(599), load)
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.get(), 1);
        assert_eq!(cache.counters(), (1, 1));
    }

    #[test]
    fn test_expired_entry_is_reloaded() {
        let mut cache = DatasetCache::new(1, Duration::from_secs(600));
        let now = Instant::now();

        let first = cache
            .get_or_load_at(Path::new("a.dat"), now, |_| Ok(tiny_dataset()))
            .unwrap();
        let second = cache
            .get_or_load_at(Path::new("a.dat"), now + Duration::from_secs(600), |_| {
                Ok(tiny_dataset())
            })
            .unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(cache.counters(), (0, 2));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut cache = DatasetCache::new(1, Duration::from_secs(600));
        let now = Instant::now();

        cache
            .get_or_load_at(Path::new("a.dat"), now, |_| Ok(tiny_dataset()))
            .unwrap();
        cache
            .get_or_load_at(Path::new("b.dat"), now + Duration::from_secs(1), |_| {
                Ok(tiny_dataset())
            })
            .unwrap();

        assert_eq!(cache.len(), 1);
        cache
            .get_or_load_at(Path::new("a.dat"), now + Duration::from_secs(2), |_| {
                Ok(tiny_dataset())
            })
            .unwrap();
        assert_eq!(cache.counters(), (0, 3));
    }

    #[test]
    fn test_zero_capacity_never_caches() {
        let mut cache = DatasetCache::new(0, Duration::from_secs(600));
        cache
            .get_or_load(Path::new("a.dat"), |_| Ok(tiny_dataset()))
            .unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let mut cache = DatasetCache::default();
        let result = cache.get_or_load(Path::new("missing.dat"), |path| {
            Err(HarpError::FileNotFound {
                path: path.to_path_buf(),
            })
        });
        assert!(result.is_err());
        assert!(cache.is_empty());
    }
}
