//! Installed-app persistence

use async_trait::async_trait;
use sideload_errors::Error;
use sideload_types::InstalledApp;

#[async_trait]
pub trait InstalledAppStore: Send + Sync {
    async fn get(&self, identifier: &str) -> Result<Option<InstalledApp>, Error>;

    async fn exists(&self, identifier: &str) -> Result<bool, Error>;

    /// Insert or replace the record keyed by its identifier
    async fn save(&self, app: &InstalledApp) -> Result<(), Error>;

    /// Returns whether a record was removed
    async fn delete(&self, identifier: &str) -> Result<bool, Error>;

    async fn list(&self) -> Result<Vec<InstalledApp>, Error>;
}
