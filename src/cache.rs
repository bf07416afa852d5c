//! Non-authoritative source-size memoization, keyed by source path.
//!
//! A miss falls back to direct measurement, so evicting or disabling the
//! cache can never affect correctness; it only saves `stat` calls when the
//! same source is inspected and then stripped.

use std::num::NonZeroUsize;
use std::path::Path;

use lru::LruCache;

#[derive(Debug)]
pub(crate) struct SizeCache {
    inner: Option<LruCache<String, u64>>,
}

impl SizeCache {
    pub(crate) fn new(entries: usize) -> Self {
        Self {
            inner: NonZeroUsize::new(entries).map(LruCache::new),
        }
    }

    /// Cached size, or a fresh measurement (which is then cached).
    pub(crate) fn measure(&mut self, path: &Path) -> std::io::Result<u64> {
        let key = path.to_string_lossy().into_owned();
        if let Some(cache) = self.inner.as_mut() {
            if let Some(size) = cache.get(&key) {
                tracing::trace!(%key, size, "size cache hit");
                return Ok(*size);
            }
        }

        let size = std::fs::metadata(path)?.len();
        if let Some(cache) = self.inner.as_mut() {
            cache.put(key, size);
        }
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn measures_and_caches() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        file.flush().unwrap();

        let mut cache = SizeCache::new(4);
        assert_eq!(cache.measure(file.path()).unwrap(), 10);
        // Second read is served from cache even if the file went away.
        let path = file.path().to_owned();
        assert_eq!(cache.measure(&path).unwrap(), 10);
    }

    #[test]
    fn zero_capacity_disables_without_breaking() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        file.flush().unwrap();

        let mut cache = SizeCache::new(0);
        assert_eq!(cache.measure(file.path()).unwrap(), 3);
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut cache = SizeCache::new(4);
        assert!(cache.measure(Path::new("/no/such/file")).is_err());
    }
}
