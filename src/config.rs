//! Explicit per-invocation configuration
//!
//! The upgrade directory is configuration passed in at construction rather
//! than a process-wide mutable default, so concurrent callers can target
//! different directories (and tests can target a tempdir) without touching
//! shared state.

use std::path::{Path, PathBuf};

use crate::{DEFAULT_UPGRADE_DIR, MANIFEST_SUFFIX};

/// Configuration for manifest materialization
#[derive(Clone, Debug)]
pub struct UpgradeConfig {
    /// Directory the node-local static pod watcher observes
    pub upgrade_dir: PathBuf,
}

impl UpgradeConfig {
    /// Create a configuration targeting the given upgrade directory
    pub fn new(upgrade_dir: impl Into<PathBuf>) -> Self {
        Self {
            upgrade_dir: upgrade_dir.into(),
        }
    }

    /// Deterministic manifest path for a static pod
    ///
    /// `<upgrade_dir>/<static_name>.yaml` - the filename is the join key the
    /// watcher and the upgrade source record share.
    pub fn manifest_path(&self, static_name: &str) -> PathBuf {
        self.upgrade_dir
            .join(format!("{static_name}{MANIFEST_SUFFIX}"))
    }
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self::new(Path::new(DEFAULT_UPGRADE_DIR))
    }
}
