//! Package resigning

use async_trait::async_trait;
use sideload_errors::Error;
use sideload_events::ProgressTracker;
use sideload_types::{App, SigningCredential};
use std::path::{Path, PathBuf};

/// Output of a successful resign
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResignedApp {
    pub path: PathBuf,
    pub resigned_identifier: String,
}

#[async_trait]
pub trait AppSigner: Send + Sync {
    async fn resign(
        &self,
        app: &App,
        package: &Path,
        credential: &SigningCredential,
        progress: &ProgressTracker,
    ) -> Result<ResignedApp, Error>;
}
