//! Helper discovery, transfer and on-device installation

use async_trait::async_trait;
use sideload_errors::Error;
use sideload_events::ProgressTracker;
use sideload_types::{App, Endpoint};
use std::path::Path;

#[async_trait]
pub trait EndpointDiscovery: Send + Sync {
    /// Currently reachable helpers, best first. Empty means none was found.
    async fn discovered_endpoints(&self) -> Vec<Endpoint>;
}

/// An open session with a helper after the package bytes were sent
#[async_trait]
pub trait TransferConnection: Send + Sync {
    fn endpoint(&self) -> &Endpoint;

    /// Ask the helper to install the transferred package
    async fn install(&mut self, progress: &ProgressTracker) -> Result<(), Error>;
}

#[async_trait]
pub trait DeviceTransport: Send + Sync {
    async fn send(
        &self,
        endpoint: &Endpoint,
        app: &App,
        package: &Path,
        progress: &ProgressTracker,
    ) -> Result<Box<dyn TransferConnection>, Error>;
}

/// Answers whether an app is still present on the device
#[async_trait]
pub trait InstallVerifier: Send + Sync {
    async fn is_installed(&self, resigned_identifier: &str) -> Result<bool, Error>;
}
