//! In-memory file cache backed by an on-disk store.
//!
//! Provides a thread-safe read-through cache:
//! - Lookups consult the in-memory map first, falling back to the store
//! - File creation writes through to the store before caching
//! - When inserting would exceed capacity, the whole cache is cleared

use bytes::Bytes;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::{debug, trace};

/// Byte store that file contents are fetched from and written to.
///
/// Implemented by [`DiskStore`] for production use; tests substitute
/// in-memory stubs to observe read/write traffic.
pub trait BackingStore: Send + Sync {
    /// Read the full contents of the named file.
    fn read(&self, name: &str) -> io::Result<Vec<u8>>;

    /// Write the full contents of the named file, replacing any existing.
    fn write(&self, name: &str, data: &[u8]) -> io::Result<()>;
}

/// Filesystem-backed store rooted at a directory.
///
/// Names are joined against the root with `Path::join` and handed to the
/// filesystem as-is. A name containing `..` can therefore resolve outside
/// the root; callers that need sandboxing must validate names themselves.
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Create a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BackingStore for DiskStore {
    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.root.join(name))
    }

    fn write(&self, name: &str, data: &[u8]) -> io::Result<()> {
        std::fs::write(self.root.join(name), data)
    }
}

/// Cache operation errors
#[derive(Debug)]
pub enum CacheError {
    /// The backing store has no file under that name.
    NotFound,
    /// Any other backing-store failure.
    Io(io::Error),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::NotFound => write!(f, "file not found"),
            CacheError::Io(e) => write!(f, "store I/O error: {}", e),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<io::Error> for CacheError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            CacheError::NotFound
        } else {
            CacheError::Io(e)
        }
    }
}

/// Thread-safe read-through file cache.
///
/// Holds at most `capacity` entries. Rather than evicting selectively,
/// the entire map is discarded and replaced the moment an insert would
/// exceed capacity. The lock is held only for map operations; store I/O
/// happens outside it, so two tasks racing on the same miss may both
/// fetch and both insert. Last writer wins, which is harmless because
/// the fetched content is idempotent.
pub struct FileCache<S> {
    /// Cached file contents by name.
    entries: RwLock<HashMap<String, Bytes>>,
    /// Maximum entry count before the cache is cleared.
    capacity: usize,
    /// The store misses are fetched from and creations written to.
    store: S,
}

impl<S: BackingStore> FileCache<S> {
    /// Create a new cache over the given store.
    pub fn new(store: S, capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
            store,
        })
    }

    /// Fetch a file, consulting the cache before the backing store.
    ///
    /// On a hit the store is not touched. On a miss the content is read
    /// from the store and cached for subsequent calls.
    pub fn get(&self, name: &str) -> Result<Bytes, CacheError> {
        {
            let entries = self.entries.read().unwrap();
            if let Some(data) = entries.get(name) {
                trace!(name, "Cache hit");
                return Ok(data.clone());
            }
        }

        trace!(name, "Cache miss, reading from store");
        let data = Bytes::from(self.store.read(name)?);
        self.insert(name, data.clone());
        Ok(data)
    }

    /// Create a file, writing through to the backing store.
    ///
    /// The store write happens first; on failure the cache is left
    /// untouched and the error propagates.
    pub fn put(&self, name: &str, data: Bytes) -> Result<(), CacheError> {
        self.store.write(name, &data)?;
        self.insert(name, data);
        Ok(())
    }

    /// Number of entries currently cached.
    #[allow(dead_code)] // exercised by tests
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Check whether the cache is empty.
    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert an entry, clearing the whole cache first if it is full.
    fn insert(&self, name: &str, data: Bytes) {
        let mut entries = self.entries.write().unwrap();
        if entries.len() >= self.capacity {
            debug!(dropped = entries.len(), "Cache full, clearing all entries");
            *entries = HashMap::with_capacity(self.capacity);
        }
        entries.insert(name.to_string(), data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread;

    /// In-memory store that counts read/write traffic.
    struct StubStore {
        files: Mutex<HashMap<String, Vec<u8>>>,
        reads: AtomicUsize,
        writes: AtomicUsize,
        fail_writes: bool,
    }

    impl StubStore {
        fn new() -> Self {
            Self {
                files: Mutex::new(HashMap::new()),
                reads: AtomicUsize::new(0),
                writes: AtomicUsize::new(0),
                fail_writes: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail_writes: true,
                ..Self::new()
            }
        }

        fn with_file(self, name: &str, data: &[u8]) -> Self {
            self.files
                .lock()
                .unwrap()
                .insert(name.to_string(), data.to_vec());
            self
        }

        fn read_count(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl BackingStore for StubStore {
        fn read(&self, name: &str) -> io::Result<Vec<u8>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.files
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }

        fn write(&self, name: &str, data: &[u8]) -> io::Result<()> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.files
                .lock()
                .unwrap()
                .insert(name.to_string(), data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_put_then_get_skips_store() {
        let cache = FileCache::new(StubStore::new(), 10);

        cache.put("a.txt", Bytes::from_static(b"data")).unwrap();
        let data = cache.get("a.txt").unwrap();

        assert_eq!(&data[..], b"data");
        assert_eq!(cache.store.read_count(), 0);
    }

    #[test]
    fn test_read_through_populates() {
        let store = StubStore::new().with_file("a.txt", b"on disk");
        let cache = FileCache::new(store, 10);

        assert_eq!(&cache.get("a.txt").unwrap()[..], b"on disk");
        assert_eq!(cache.store.read_count(), 1);

        // Second get is served from the cache
        assert_eq!(&cache.get("a.txt").unwrap()[..], b"on disk");
        assert_eq!(cache.store.read_count(), 1);
    }

    #[test]
    fn test_get_missing() {
        let cache = FileCache::new(StubStore::new(), 10);
        assert!(matches!(cache.get("nope.txt"), Err(CacheError::NotFound)));
    }

    #[test]
    fn test_clear_on_overflow() {
        let cache = FileCache::new(StubStore::new(), 3);

        cache.put("a", Bytes::from_static(b"1")).unwrap();
        cache.put("b", Bytes::from_static(b"2")).unwrap();
        cache.put("c", Bytes::from_static(b"3")).unwrap();
        assert_eq!(cache.len(), 3);

        // Fourth distinct key clears everything before inserting
        cache.put("d", Bytes::from_static(b"4")).unwrap();
        assert_eq!(cache.len(), 1);

        // Previously cached key now requires a fresh store read
        assert_eq!(cache.store.read_count(), 0);
        assert_eq!(&cache.get("a").unwrap()[..], b"1");
        assert_eq!(cache.store.read_count(), 1);
    }

    #[test]
    fn test_overwrite_does_not_grow() {
        let cache = FileCache::new(StubStore::new(), 10);

        cache.put("a", Bytes::from_static(b"old")).unwrap();
        cache.put("a", Bytes::from_static(b"new")).unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(&cache.get("a").unwrap()[..], b"new");
    }

    #[test]
    fn test_put_failure_leaves_cache_untouched() {
        let cache = FileCache::new(StubStore::failing(), 10);

        assert!(matches!(
            cache.put("a", Bytes::from_static(b"data")),
            Err(CacheError::Io(_))
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_get_put() {
        let store = StubStore::new();
        {
            let mut files = store.files.lock().unwrap();
            for i in 0..100 {
                files.insert(format!("read-{i}"), format!("content-{i}").into_bytes());
            }
        }
        let cache = FileCache::new(store, 10_000);

        let mut handles = Vec::new();
        for t in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    if t % 2 == 0 {
                        let data = cache.get(&format!("read-{i}")).unwrap();
                        assert_eq!(&data[..], format!("content-{i}").as_bytes());
                    } else {
                        let name = format!("write-{t}-{i}");
                        cache.put(&name, Bytes::from(format!("value-{t}-{i}"))).unwrap();
                        assert_eq!(
                            &cache.get(&name).unwrap()[..],
                            format!("value-{t}-{i}").as_bytes()
                        );
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Every written key survives with its own value
        for t in (1..8).step_by(2) {
            for i in 0..100 {
                let name = format!("write-{t}-{i}");
                assert_eq!(
                    &cache.get(&name).unwrap()[..],
                    format!("value-{t}-{i}").as_bytes()
                );
            }
        }
    }

    #[test]
    fn test_disk_store_roundtrip() {
        let root = std::env::temp_dir().join(format!("serve-a-file-test-{}", std::process::id()));
        std::fs::create_dir_all(&root).unwrap();

        let store = DiskStore::new(&root);
        store.write("hello.txt", b"hello from disk").unwrap();
        assert_eq!(store.read("hello.txt").unwrap(), b"hello from disk");
        assert_eq!(
            store.read("missing.txt").unwrap_err().kind(),
            io::ErrorKind::NotFound
        );

        let _ = std::fs::remove_dir_all(&root);
    }
}
