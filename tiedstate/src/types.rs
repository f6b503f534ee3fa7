//! Core types for tiedstate

use crate::error::{ConfigError, Result};
use std::path::{Path, PathBuf};

/// Root directory of an acoustic model on the local filesystem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelDir {
    root: PathBuf,
}

impl ModelDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path relative to the model root, failing if nothing exists there.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let path = self.root.join(relative);
        if path.exists() {
            Ok(path)
        } else {
            Err(ConfigError::ResourceNotFound { path }.into())
        }
    }
}
