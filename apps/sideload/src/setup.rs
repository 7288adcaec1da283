//! System setup and component wiring

use crate::error::CliError;
use sideload_config::Config;
use sideload_events::EventSender;
use sideload_net::{HttpCatalog, HttpDownloader, NetClient, NetConfig};
use sideload_ops::{AppManager, AppManagerBuilder, PipelineSettings};
use sideload_platform::{EndpointDiscovery, TokioProcess};
use sideload_signing::{AccountCredentialProvider, CommandSigner};
use sideload_state::StateManager;
use sideload_transport::{HelperVerifier, StaticDiscovery, TcpTransport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Everything a command needs, built once per invocation
pub struct SystemSetup {
    config: Config,
    state: StateManager,
    discovery: Arc<StaticDiscovery>,
    manager: AppManager,
}

impl SystemSetup {
    /// Open the state database and build the app manager
    pub async fn initialize(config: Config, tx: EventSender) -> Result<Self, CliError> {
        info!("Initializing sideload components");

        let apps_dir = config.apps_dir();
        tokio::fs::create_dir_all(&apps_dir).await?;
        debug!(apps_dir = %apps_dir.display(), "Artifact directory ready");

        let state = StateManager::open(&config.db_path(), Some(tx.clone())).await?;
        let net = NetClient::new(NetConfig::from(&config.network))?;
        let catalog = HttpCatalog::new(net.clone(), config.catalog.source_url.clone())?;
        let discovery = Arc::new(StaticDiscovery::new(
            config.endpoints(),
            probe_timeout(&config),
        ));

        let manager = AppManagerBuilder::new()
            .with_credentials(Arc::new(AccountCredentialProvider::new(state.clone())))
            .with_catalog(Arc::new(catalog))
            .with_downloader(Arc::new(HttpDownloader::new(net)))
            .with_signer(Arc::new(CommandSigner::new(
                config.signing.command.clone(),
                config.signing.args.clone(),
                Arc::new(TokioProcess),
            )))
            .with_discovery(discovery.clone())
            .with_transport(Arc::new(TcpTransport::new(probe_timeout(&config))))
            .with_store(Arc::new(state.clone()))
            .with_artifacts(sideload_ops::ArtifactStore::new(apps_dir))
            .with_settings(PipelineSettings::from_config(&config))
            .with_event_sender(tx)
            .build()?;

        Ok(Self {
            config,
            state,
            discovery,
            manager,
        })
    }

    pub fn manager(&self) -> &AppManager {
        &self.manager
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Verifier talking to the first reachable helper, if any
    pub async fn verifier(&self) -> Option<HelperVerifier> {
        let endpoint = self.discovery.discovered_endpoints().await.into_iter().next()?;
        debug!(helper = %endpoint, "Using helper for reconciliation");
        Some(HelperVerifier::new(endpoint, probe_timeout(&self.config)))
    }
}

fn probe_timeout(config: &Config) -> Duration {
    Duration::from_millis(config.discovery.probe_timeout_ms)
}
