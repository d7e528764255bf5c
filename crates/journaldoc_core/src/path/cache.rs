//! Memoized path compilation.

use crate::error::CoreResult;
use crate::path::DocumentPath;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Caches compiled [`DocumentPath`]s by their exact path string.
///
/// The set of distinct paths used by a producer is small and fixed, so
/// entries are never evicted. Failed compilations are not cached.
///
/// A cache is an ordinary value: share one through an `Arc` between the
/// documents that should reuse compiled paths.
#[derive(Debug, Default)]
pub struct PathCache {
    paths: RwLock<HashMap<String, Arc<DocumentPath>>>,
    /// Number of times a path string was actually tokenized.
    compilations: AtomicU64,
}

impl PathCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the compiled form of `path`, compiling it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::InvalidPath`] if the path is malformed.
    pub fn compile(&self, path: &str) -> CoreResult<Arc<DocumentPath>> {
        if let Some(compiled) = self.paths.read().get(path) {
            return Ok(Arc::clone(compiled));
        }

        let compiled = Arc::new(DocumentPath::parse(path)?);
        self.compilations.fetch_add(1, Ordering::Relaxed);

        let mut paths = self.paths.write();
        Ok(Arc::clone(
            paths.entry(path.to_string()).or_insert(compiled),
        ))
    }

    /// Returns how many path strings have been tokenized so far.
    #[must_use]
    pub fn compilations(&self) -> u64 {
        self.compilations.load(Ordering::Relaxed)
    }

    /// Returns the number of cached paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.read().len()
    }

    /// Returns true if nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.read().is_empty()
    }
}
