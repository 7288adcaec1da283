use crate::manager::{AppManager, Inner};
use dashmap::DashMap;
use sideload_errors::{Error, OpsError};
use sideload_events::EventSender;
use sideload_install::{ArtifactStore, PipelineSettings};
use sideload_platform::{
    AppCatalog, AppDownloader, AppSigner, CredentialProvider, DeviceTransport, EndpointDiscovery,
    InstalledAppStore,
};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};

/// Builder for [`AppManager`]
///
/// Every collaborator is required. Settings fall back to the defaults and
/// events are dropped when no sender is set.
#[derive(Default)]
pub struct AppManagerBuilder {
    credentials: Option<Arc<dyn CredentialProvider>>,
    catalog: Option<Arc<dyn AppCatalog>>,
    downloader: Option<Arc<dyn AppDownloader>>,
    signer: Option<Arc<dyn AppSigner>>,
    discovery: Option<Arc<dyn EndpointDiscovery>>,
    transport: Option<Arc<dyn DeviceTransport>>,
    store: Option<Arc<dyn InstalledAppStore>>,
    artifacts: Option<ArtifactStore>,
    settings: Option<PipelineSettings>,
    tx: Option<EventSender>,
}

fn missing(component: &str) -> Error {
    OpsError::MissingComponent {
        component: component.to_string(),
    }
    .into()
}

impl AppManagerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn AppCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    #[must_use]
    pub fn with_downloader(mut self, downloader: Arc<dyn AppDownloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn AppSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    #[must_use]
    pub fn with_discovery(mut self, discovery: Arc<dyn EndpointDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn DeviceTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Installed-app records
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn InstalledAppStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_artifacts(mut self, artifacts: ArtifactStore) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    /// Build the manager
    ///
    /// # Errors
    ///
    /// Returns an error if any required component is missing.
    pub fn build(self) -> Result<AppManager, Error> {
        let settings = self.settings.unwrap_or_default();
        Ok(AppManager::from_inner(Inner {
            credentials: self.credentials.ok_or_else(|| missing("credentials"))?,
            catalog: self.catalog.ok_or_else(|| missing("catalog"))?,
            downloader: self.downloader.ok_or_else(|| missing("downloader"))?,
            signer: self.signer.ok_or_else(|| missing("signer"))?,
            discovery: self.discovery.ok_or_else(|| missing("discovery"))?,
            transport: self.transport.ok_or_else(|| missing("transport"))?,
            store: self.store.ok_or_else(|| missing("store"))?,
            artifacts: self.artifacts.ok_or_else(|| missing("artifacts"))?,
            pool: Arc::new(Semaphore::new(settings.max_concurrent_stages.max(1))),
            settings,
            installation_progress: DashMap::new(),
            refresh_progress: DashMap::new(),
            finalize_lock: Mutex::new(()),
            tx: self.tx,
        }))
    }
}
