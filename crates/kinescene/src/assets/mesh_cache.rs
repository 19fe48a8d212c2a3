//! Convex hull cache for deduplicating loaded collision meshes
//!
//! Provides a caching layer on top of a [`MeshLoader`] so that every path is
//! parsed at most once; all shapes built from the same file share one
//! immutable hull.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::obj_hull::ObjHullLoader;
use super::AssetError;
use crate::physics::geometry::ConvexMesh;

/// Parses a file into one or more convex hulls
pub trait MeshLoader: Send + Sync {
    /// Load every convex part found in `path`
    fn load_parts(&self, path: &Path) -> Result<Vec<ConvexMesh>, AssetError>;
}

/// Thread-safe hull cache keyed by path
pub struct MeshCache {
    loader: Box<dyn MeshLoader>,
    cache: RwLock<HashMap<PathBuf, Arc<[Arc<ConvexMesh>]>>>,
}

impl MeshCache {
    /// Create a cache that parses Wavefront OBJ hulls
    pub fn new() -> Self {
        Self::with_loader(Box::new(ObjHullLoader))
    }

    /// Create a cache using a custom loader
    pub fn with_loader(loader: Box<dyn MeshLoader>) -> Self {
        Self {
            loader,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// First convex part of a file
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Arc<ConvexMesh>, AssetError> {
        let path = path.as_ref();
        let parts = self.load_group(path)?;
        parts
            .first()
            .cloned()
            .ok_or_else(|| AssetError::Empty(path.display().to_string()))
    }

    /// Every convex part of a file
    pub fn load_group(&self, path: impl AsRef<Path>) -> Result<Arc<[Arc<ConvexMesh>]>, AssetError> {
        let path = path.as_ref();
        if let Some(parts) = self.read().get(path) {
            log::trace!("Mesh cache hit: {}", path.display());
            return Ok(Arc::clone(parts));
        }

        let loaded = self.loader.load_parts(path)?;
        if loaded.is_empty() {
            return Err(AssetError::Empty(path.display().to_string()));
        }
        let parts: Arc<[Arc<ConvexMesh>]> = loaded.into_iter().map(Arc::new).collect();
        log::debug!("Loaded {} convex part(s) from {}", parts.len(), path.display());

        // Another caller may have raced us; keep whichever landed first
        let mut cache = self.write();
        let entry = cache
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::clone(&parts));
        Ok(Arc::clone(entry))
    }

    /// Register in-memory hulls under a path
    pub fn insert(&self, path: impl Into<PathBuf>, parts: Vec<ConvexMesh>) {
        let parts: Arc<[Arc<ConvexMesh>]> = parts.into_iter().map(Arc::new).collect();
        self.write().insert(path.into(), parts);
    }

    /// Whether a path is cached
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.read().contains_key(path.as_ref())
    }

    /// Number of cached paths
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Drop every cached hull (shapes already built keep theirs alive)
    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<PathBuf, Arc<[Arc<ConvexMesh>]>>> {
        self.cache.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<PathBuf, Arc<[Arc<ConvexMesh>]>>> {
        self.cache.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for MeshCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MeshCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshCache")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLoader {
        calls: Arc<AtomicUsize>,
    }

    impl MeshLoader for CountingLoader {
        fn load_parts(&self, path: &Path) -> Result<Vec<ConvexMesh>, AssetError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if path.ends_with("missing.obj") {
                return Err(AssetError::NotFound(path.display().to_string()));
            }
            Ok(vec![
                ConvexMesh::cuboid(Vec3::new(1.0, 1.0, 1.0)),
                ConvexMesh::cuboid(Vec3::new(0.5, 0.5, 0.5)),
            ])
        }
    }

    fn counting_cache() -> (MeshCache, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = MeshCache::with_loader(Box::new(CountingLoader {
            calls: Arc::clone(&calls),
        }));
        (cache, calls)
    }

    #[test]
    fn test_repeated_loads_parse_once() {
        let (cache, calls) = counting_cache();
        let first = cache.load("hull.obj").unwrap();
        let second = cache.load("hull.obj").unwrap();
        let group = cache.load_group("hull.obj").unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &group[0]));
        assert_eq!(group.len(), 2);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let (cache, calls) = counting_cache();
        assert!(cache.load("missing.obj").is_err());
        assert!(cache.load("missing.obj").is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_inserted_geometry_bypasses_loader() {
        let (cache, calls) = counting_cache();
        cache.insert("memory://box", vec![ConvexMesh::cuboid(Vec3::new(2.0, 2.0, 2.0))]);
        let hull = cache.load("memory://box").unwrap();
        assert_eq!(hull.vertices()[6], Vec3::new(2.0, 2.0, 2.0));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
