use sideload_config::constants::ARTIFACT_FILE_NAME;
use std::path::{Path, PathBuf};

/// On-disk location of cached packages, one directory per app
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the cached package for `identifier`
    #[must_use]
    pub fn package_path(&self, identifier: &str) -> PathBuf {
        self.root
            .join(sanitize(identifier))
            .join(ARTIFACT_FILE_NAME)
    }

    /// Whether a cached package exists for `identifier`
    pub async fn exists(&self, identifier: &str) -> bool {
        tokio::fs::try_exists(self.package_path(identifier))
            .await
            .unwrap_or(false)
    }
}

// Identifiers come from the catalog; keep them inside `root`
fn sanitize(identifier: &str) -> String {
    let cleaned = identifier.replace(['/', '\\'], "_");
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        format!("_{cleaned}")
    } else {
        cleaned
    }
}
