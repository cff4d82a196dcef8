//! On-disk cache of depth-1 landscapes.
//!
//! Entries are JSON files named after a hash of the problem identity and
//! the grid. The cache is advisory: anything that goes wrong while reading
//! or writing is logged and the landscape is recomputed.

use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::landscape::{GridSpec, Landscape};

/// Cached landscape together with what it was computed for.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    identity: String,
    landscape: Landscape,
}

/// Directory of cached landscapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandscapeCache {
    dir: PathBuf,
}

impl LandscapeCache {
    /// Cache rooted at `dir`; created on first store.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache under the user cache directory, if there is one.
    pub fn default_location() -> Option<Self> {
        dirs::cache_dir().map(|d| Self::new(d.join("arvak").join("landscapes")))
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a problem identity and grid.
    pub fn key(identity: &str, grid: &GridSpec) -> String {
        let mut hasher = FxHasher::default();
        identity.hash(&mut hasher);
        grid.resolution.hash(&mut hasher);
        for class in grid.bounds.classes() {
            class.name.hash(&mut hasher);
            class.lower.to_bits().hash(&mut hasher);
            class.upper.to_bits().hash(&mut hasher);
            class.periodic.hash(&mut hasher);
        }
        format!("{:016x}.json", hasher.finish())
    }

    fn path(&self, identity: &str, grid: &GridSpec) -> PathBuf {
        self.dir.join(Self::key(identity, grid))
    }

    /// Load a landscape; `None` on miss or on any mismatch.
    pub fn load(&self, identity: &str, grid: &GridSpec) -> Option<Landscape> {
        let path = self.path(identity, grid);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "landscape cache miss");
                return None;
            }
        };
        let entry: CacheEntry = match serde_json::from_str(&text) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable landscape cache entry");
                return None;
            }
        };
        if entry.identity != identity || entry.landscape.grid() != grid {
            warn!(path = %path.display(), "ignoring stale landscape cache entry");
            return None;
        }
        Some(entry.landscape)
    }

    /// Store a landscape; returns whether it was written.
    pub fn store(&self, identity: &str, landscape: &Landscape) -> bool {
        let path = self.path(identity, landscape.grid());
        let entry = CacheEntry {
            identity: identity.to_string(),
            landscape: landscape.clone(),
        };
        let result = fs::create_dir_all(&self.dir)
            .map_err(|e| e.to_string())
            .and_then(|_| serde_json::to_string(&entry).map_err(|e| e.to_string()))
            .and_then(|json| fs::write(&path, json).map_err(|e| e.to_string()));
        match result {
            Ok(()) => {
                debug!(path = %path.display(), "stored landscape");
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not store landscape");
                false
            }
        }
    }
}
