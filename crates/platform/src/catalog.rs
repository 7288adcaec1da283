//! App catalog and package download

use async_trait::async_trait;
use sideload_errors::Error;
use sideload_events::ProgressTracker;
use sideload_types::App;
use std::path::Path;

#[async_trait]
pub trait AppCatalog: Send + Sync {
    /// Human readable location of the catalog, used in events
    fn source(&self) -> String;

    async fn list_apps(&self) -> Result<Vec<App>, Error>;
}

#[async_trait]
pub trait AppDownloader: Send + Sync {
    /// Fetch the package for `app` into `destination`, reporting bytes on
    /// `progress`. The destination only exists after a successful return.
    async fn download(
        &self,
        app: &App,
        destination: &Path,
        progress: &ProgressTracker,
    ) -> Result<(), Error>;
}
