use crate::context::AppOperationContext;
use crate::stage::Stage;
use async_trait::async_trait;
use sideload_errors::Error;
use sideload_events::{ProgressTracker, StageKind};
use sideload_platform::AppDownloader;
use std::path::PathBuf;
use std::sync::Arc;

/// Fetches the app's package into its artifact location
pub struct DownloadStage {
    context: Arc<AppOperationContext>,
    downloader: Arc<dyn AppDownloader>,
    destination: PathBuf,
}

impl DownloadStage {
    pub fn new(
        context: Arc<AppOperationContext>,
        downloader: Arc<dyn AppDownloader>,
        destination: PathBuf,
    ) -> Self {
        Self {
            context,
            downloader,
            destination,
        }
    }
}

#[async_trait]
impl Stage for DownloadStage {
    type Output = PathBuf;

    fn kind(&self) -> StageKind {
        StageKind::Download
    }

    async fn execute(&self, progress: &ProgressTracker) -> Result<PathBuf, Error> {
        self.downloader
            .download(self.context.app(), &self.destination, progress)
            .await?;
        Ok(self.destination.clone())
    }
}
