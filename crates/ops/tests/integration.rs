//! End-to-end behaviour of the app manager against in-memory collaborators

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use sideload_errors::{AuthError, ConnectionError, Error, ErrorKind, NetworkError, SigningError};
use sideload_events::{AppEvent, CatalogEvent, EventReceiver, ProgressTracker};
use sideload_install::{AppOperationContext, ArtifactStore, BatchGroup, Operation};
use sideload_ops::{AppManager, AppManagerBuilder, PipelineSettings};
use sideload_platform::{
    AppCatalog, AppDownloader, AppSigner, CredentialProvider, DeviceTransport, EndpointDiscovery,
    InstallVerifier, InstalledAppStore, Presenter, ResignedApp, TransferConnection,
};
use sideload_types::{Account, App, Endpoint, InstalledApp, SigningCredential};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;

#[derive(Default)]
struct MemoryStore {
    records: Mutex<HashMap<String, InstalledApp>>,
    saves: AtomicUsize,
}

#[async_trait]
impl InstalledAppStore for MemoryStore {
    async fn get(&self, identifier: &str) -> Result<Option<InstalledApp>, Error> {
        Ok(self.records.lock().unwrap().get(identifier).cloned())
    }

    async fn exists(&self, identifier: &str) -> Result<bool, Error> {
        Ok(self.records.lock().unwrap().contains_key(identifier))
    }

    async fn save(&self, app: &InstalledApp) -> Result<(), Error> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .unwrap()
            .insert(app.identifier.clone(), app.clone());
        Ok(())
    }

    async fn delete(&self, identifier: &str) -> Result<bool, Error> {
        Ok(self.records.lock().unwrap().remove(identifier).is_some())
    }

    async fn list(&self) -> Result<Vec<InstalledApp>, Error> {
        let mut records: Vec<_> = self.records.lock().unwrap().values().cloned().collect();
        records.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(records)
    }
}

struct Credentials {
    fail: bool,
    delay: Duration,
    calls: AtomicUsize,
}

#[async_trait]
impl CredentialProvider for Credentials {
    async fn credential(
        &self,
        _presenter: Option<&dyn Presenter>,
    ) -> Result<SigningCredential, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(AuthError::NoAccount.into());
        }
        Ok(SigningCredential {
            account: Account {
                email: "dev@example.com".to_string(),
                team_identifier: "TEAM123".to_string(),
            },
            certificate_identifier: "CERT".to_string(),
            private_key: vec![1, 2, 3],
        })
    }
}

struct Catalog {
    apps: Option<Vec<App>>,
}

#[async_trait]
impl AppCatalog for Catalog {
    fn source(&self) -> String {
        "memory".to_string()
    }

    async fn list_apps(&self) -> Result<Vec<App>, Error> {
        self.apps.clone().ok_or_else(|| {
            NetworkError::InvalidCatalog("not available".to_string()).into()
        })
    }
}

/// Writes a small package once the gate hands out a permit
struct Downloader {
    gate: Arc<Semaphore>,
    calls: AtomicUsize,
}

#[async_trait]
impl AppDownloader for Downloader {
    async fn download(
        &self,
        app: &App,
        destination: &Path,
        progress: &ProgressTracker,
    ) -> Result<(), Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _permit = self.gate.acquire().await.unwrap();
        progress.set_total(4);
        tokio::fs::create_dir_all(destination.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(destination, app.identifier.as_bytes())
            .await
            .unwrap();
        progress.finish();
        Ok(())
    }
}

struct Signer {
    reject: Option<String>,
    calls: AtomicUsize,
}

#[async_trait]
impl AppSigner for Signer {
    async fn resign(
        &self,
        app: &App,
        package: &Path,
        credential: &SigningCredential,
        _progress: &ProgressTracker,
    ) -> Result<ResignedApp, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject.as_deref() == Some(app.identifier.as_str()) {
            return Err(SigningError::SignerFailed {
                app: app.identifier.clone(),
                message: "entitlements rejected".to_string(),
            }
            .into());
        }
        Ok(ResignedApp {
            path: package.to_path_buf(),
            resigned_identifier: format!(
                "{}.{}",
                app.identifier, credential.account.team_identifier
            ),
        })
    }
}

struct Discovery {
    endpoints: Vec<Endpoint>,
}

#[async_trait]
impl EndpointDiscovery for Discovery {
    async fn discovered_endpoints(&self) -> Vec<Endpoint> {
        self.endpoints.clone()
    }
}

struct Connection {
    endpoint: Endpoint,
    explode: bool,
}

#[async_trait]
impl TransferConnection for Connection {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn install(&mut self, progress: &ProgressTracker) -> Result<(), Error> {
        assert!(!self.explode, "helper closed the session");
        progress.finish();
        Ok(())
    }
}

#[derive(Default)]
struct Transport {
    sends: AtomicUsize,
    explode: AtomicBool,
}

#[async_trait]
impl DeviceTransport for Transport {
    async fn send(
        &self,
        endpoint: &Endpoint,
        _app: &App,
        _package: &Path,
        _progress: &ProgressTracker,
    ) -> Result<Box<dyn TransferConnection>, Error> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Connection {
            endpoint: endpoint.clone(),
            explode: self.explode.load(Ordering::SeqCst),
        }))
    }
}

struct Verifier {
    installed: Vec<String>,
}

#[async_trait]
impl InstallVerifier for Verifier {
    async fn is_installed(&self, resigned_identifier: &str) -> Result<bool, Error> {
        Ok(self.installed.iter().any(|id| id == resigned_identifier))
    }
}

struct Harness {
    _dir: TempDir,
    manager: AppManager,
    artifacts: ArtifactStore,
    store: Arc<MemoryStore>,
    credentials: Arc<Credentials>,
    downloader: Arc<Downloader>,
    signer: Arc<Signer>,
    transport: Arc<Transport>,
    gate: Arc<Semaphore>,
}

struct Options {
    auth_fails: bool,
    auth_delay: Duration,
    stage_timeout: Duration,
    discovered: bool,
    gated: bool,
    reject: Option<String>,
    catalog: Option<Vec<App>>,
    events: Option<sideload_events::EventSender>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            auth_fails: false,
            auth_delay: Duration::ZERO,
            stage_timeout: Duration::from_secs(30),
            discovered: true,
            gated: false,
            reject: None,
            catalog: Some(Vec::new()),
            events: None,
        }
    }
}

fn harness(options: Options) -> Harness {
    let dir = TempDir::new().unwrap();
    let artifacts = ArtifactStore::new(dir.path().join("apps"));
    let gate = Arc::new(Semaphore::new(if options.gated { 0 } else { 64 }));
    let store = Arc::new(MemoryStore::default());
    let credentials = Arc::new(Credentials {
        fail: options.auth_fails,
        delay: options.auth_delay,
        calls: AtomicUsize::new(0),
    });
    let downloader = Arc::new(Downloader {
        gate: Arc::clone(&gate),
        calls: AtomicUsize::new(0),
    });
    let signer = Arc::new(Signer {
        reject: options.reject,
        calls: AtomicUsize::new(0),
    });
    let transport = Arc::new(Transport::default());
    let endpoints = if options.discovered {
        vec![Endpoint::new("desk", "127.0.0.1", 27015)]
    } else {
        Vec::new()
    };

    let mut builder = AppManagerBuilder::new()
        .with_credentials(credentials.clone())
        .with_catalog(Arc::new(Catalog {
            apps: options.catalog,
        }))
        .with_downloader(downloader.clone())
        .with_signer(signer.clone())
        .with_discovery(Arc::new(Discovery { endpoints }))
        .with_transport(transport.clone())
        .with_store(store.clone())
        .with_artifacts(artifacts.clone())
        .with_settings(PipelineSettings {
            max_concurrent_stages: 4,
            stage_timeout: options.stage_timeout,
            profile_validity: ChronoDuration::days(7),
        });
    if let Some(tx) = options.events {
        builder = builder.with_event_sender(tx);
    }

    Harness {
        _dir: dir,
        manager: builder.build().unwrap(),
        artifacts,
        store,
        credentials,
        downloader,
        signer,
        transport,
        gate,
    }
}

fn app(identifier: &str) -> App {
    App::new(
        identifier,
        identifier,
        "1.0",
        format!("https://apps.example.com/{identifier}.ipa"),
    )
}

fn record(identifier: &str) -> InstalledApp {
    let installed = Utc::now() - ChronoDuration::days(6);
    InstalledApp {
        identifier: identifier.to_string(),
        name: identifier.to_string(),
        version: "1.0".to_string(),
        resigned_identifier: format!("{identifier}.TEAM123"),
        installed_date: installed,
        refreshed_date: installed,
        expiration_date: installed + ChronoDuration::days(7),
        download_url: Some(format!("https://apps.example.com/{identifier}.ipa")),
    }
}

async fn cache_package(h: &Harness, identifier: &str) {
    let path = h.artifacts.package_path(identifier);
    tokio::fs::create_dir_all(path.parent().unwrap())
        .await
        .unwrap();
    tokio::fs::write(&path, b"cached").await.unwrap();
}

#[tokio::test]
async fn install_downloads_signs_and_saves_the_record() {
    let h = harness(Options::default());

    let handle = h.manager.install(app("com.example.notes"), None).await;
    let installed = handle.wait().await.unwrap();

    assert_eq!(installed.identifier, "com.example.notes");
    assert_eq!(installed.resigned_identifier, "com.example.notes.TEAM123");
    assert_eq!(
        installed.expiration_date - installed.refreshed_date,
        ChronoDuration::days(7)
    );
    assert_eq!(h.downloader.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.saves.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.store.get("com.example.notes").await.unwrap(),
        Some(installed)
    );

    assert_eq!(handle.progress().total_unit_count(), 100);
    assert!(handle.progress().is_finished());
    assert!(h.manager.installation_progress("com.example.notes").is_none());
}

#[tokio::test]
async fn install_always_downloads_even_with_a_cached_package() {
    let h = harness(Options::default());
    h.store.save(&record("com.example.notes")).await.unwrap();
    cache_package(&h, "com.example.notes").await;

    let handle = h.manager.install(app("com.example.notes"), None).await;
    handle.wait().await.unwrap();

    assert_eq!(h.downloader.calls.load(Ordering::SeqCst), 1);
    assert_eq!(handle.progress().total_unit_count(), 100);
}

#[tokio::test]
async fn duplicate_install_returns_the_running_handle() {
    let h = harness(Options {
        gated: true,
        ..Options::default()
    });

    let first = h.manager.install(app("com.example.notes"), None).await;
    let second = h.manager.install(app("com.example.notes"), None).await;
    assert!(first.ptr_eq(&second));
    assert!(h
        .manager
        .installation_progress("com.example.notes")
        .is_some_and(|handle| handle.ptr_eq(&first)));

    h.gate.add_permits(8);
    let a = first.wait().await.unwrap();
    let b = second.wait().await.unwrap();
    assert_eq!(a, b);
    assert_eq!(h.downloader.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.saves.load(Ordering::SeqCst), 1);

    // Once finished, a new install starts fresh work
    let third = h.manager.install(app("com.example.notes"), None).await;
    assert!(!third.ptr_eq(&first));
    third.wait().await.unwrap();
    assert_eq!(h.downloader.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn refresh_reuses_the_cached_package() {
    let h = harness(Options::default());
    let previous = record("com.example.notes");
    h.store.save(&previous).await.unwrap();
    cache_package(&h, "com.example.notes").await;

    let group = h.manager.refresh(&[previous.clone()], None, None).await;
    let results = group.wait().await.unwrap();

    let refreshed = results["com.example.notes"].clone().unwrap();
    assert_eq!(refreshed.installed_date, previous.installed_date);
    assert!(refreshed.refreshed_date > previous.refreshed_date);
    assert_eq!(h.downloader.calls.load(Ordering::SeqCst), 0);

    let progress = group.app_progress("com.example.notes").unwrap();
    assert_eq!(progress.total_unit_count(), 60);
    assert!(progress.is_finished());
    assert!(group.progress().is_finished());
    assert!(h.manager.refresh_progress("com.example.notes").is_none());
}

#[tokio::test]
async fn refresh_downloads_when_the_package_is_missing() {
    let h = harness(Options::default());
    let previous = record("com.example.notes");
    h.store.save(&previous).await.unwrap();

    let group = h.manager.refresh(&[previous], None, None).await;
    let results = group.wait().await.unwrap();

    assert!(results["com.example.notes"].is_ok());
    assert_eq!(h.downloader.calls.load(Ordering::SeqCst), 1);
    let progress = group.app_progress("com.example.notes").unwrap();
    assert_eq!(progress.total_unit_count(), 100);
}

#[tokio::test]
async fn authentication_failure_fails_every_app_without_signing() {
    let h = harness(Options {
        auth_fails: true,
        ..Options::default()
    });
    let records = [record("com.example.notes"), record("com.example.timer")];

    let calls = Arc::new(AtomicUsize::new(0));
    let group = h.manager.refresh(&records, None, None).await;
    let counter = Arc::clone(&calls);
    group.set_completion_handler(Box::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    let results = group.wait().await.unwrap();

    assert_eq!(results.len(), 2);
    for result in results.values() {
        let err = result.as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
    }
    assert_eq!(h.credentials.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.signer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.downloader.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.store.saves.load(Ordering::SeqCst), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_helper_fails_the_batch_before_any_stage() {
    let h = harness(Options {
        discovered: false,
        ..Options::default()
    });
    let records = [record("com.example.notes"), record("com.example.timer")];

    let group = h.manager.refresh(&records, None, None).await;
    let err = group.wait().await.unwrap_err();

    assert!(matches!(
        err,
        Error::Connection(ConnectionError::ServerNotFound)
    ));
    assert_eq!(err.kind(), ErrorKind::ServerNotFound);
    assert_eq!(h.credentials.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.downloader.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.signer.calls.load(Ordering::SeqCst), 0);
    assert!(h.manager.refresh_progress("com.example.notes").is_none());
    assert!(h.manager.refresh_progress("com.example.timer").is_none());

    let handle = h.manager.install(app("com.example.notes"), None).await;
    let err = handle.wait().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServerNotFound);
}

#[tokio::test]
async fn one_failing_app_does_not_fail_its_sibling() {
    let h = harness(Options {
        reject: Some("com.example.timer".to_string()),
        ..Options::default()
    });
    let records = [record("com.example.notes"), record("com.example.timer")];

    let fired = Arc::new(AtomicUsize::new(0));
    let group = h.manager.refresh(&records, None, None).await;
    let counter = Arc::clone(&fired);
    group.set_completion_handler(Box::new(move |outcome| {
        assert_eq!(outcome.unwrap().len(), 2);
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    let results = group.wait().await.unwrap();

    assert!(results["com.example.notes"].is_ok());
    let err = results["com.example.timer"].as_ref().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SigningFailed);
    assert_eq!(h.transport.sends.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.saves.load(Ordering::SeqCst), 1);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(group.result_count(), 2);
}

#[tokio::test]
async fn slow_sign_in_times_out_as_an_authentication_failure() {
    let h = harness(Options {
        auth_delay: Duration::from_secs(5),
        stage_timeout: Duration::from_millis(50),
        ..Options::default()
    });
    let records = [record("com.example.notes"), record("com.example.timer")];

    let group = h.manager.refresh(&records, None, None).await;
    let results = group.wait().await.unwrap();

    assert_eq!(results.len(), 2);
    for result in results.values() {
        let err = result.as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        assert!(matches!(
            err,
            Error::Auth(AuthError::CredentialFetchFailed { .. })
        ));
    }
    assert_eq!(h.signer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn panicking_helper_session_still_finalizes_the_install() {
    let h = harness(Options::default());
    h.transport.explode.store(true, Ordering::SeqCst);

    let first = h.manager.install(app("com.example.notes"), None).await;
    let err = first.wait().await.unwrap_err();
    assert!(matches!(err, Error::Internal(_)));
    assert_eq!(err.kind(), ErrorKind::Unknown);
    assert!(h.manager.installation_progress("com.example.notes").is_none());
    assert_eq!(h.store.saves.load(Ordering::SeqCst), 0);

    h.transport.explode.store(false, Ordering::SeqCst);
    let second = h.manager.install(app("com.example.notes"), None).await;
    assert!(!second.ptr_eq(&first));
    second.wait().await.unwrap();
    assert_eq!(h.store.saves.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn mixed_batch_skips_download_only_for_the_cached_app() {
    let h = harness(Options::default());
    let cached = record("com.example.notes");
    let missing = record("com.example.timer");
    h.store.save(&cached).await.unwrap();
    h.store.save(&missing).await.unwrap();
    cache_package(&h, "com.example.notes").await;

    let fired = Arc::new(AtomicUsize::new(0));
    let group = h.manager.refresh(&[cached, missing], None, None).await;
    let counter = Arc::clone(&fired);
    group.set_completion_handler(Box::new(move |outcome| {
        assert_eq!(outcome.unwrap().len(), 2);
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    let results = group.wait().await.unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.values().all(Result::is_ok));
    let notes = group.app_progress("com.example.notes").unwrap();
    let timer = group.app_progress("com.example.timer").unwrap();
    assert_eq!(notes.total_unit_count(), 60);
    assert_eq!(timer.total_unit_count(), 100);
    assert_eq!(h.downloader.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.credentials.calls.load(Ordering::SeqCst), 1);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_finalization_has_a_single_effect() {
    let h = harness(Options::default());
    let group = BatchGroup::new();
    let progress = group.register_app("com.example.notes").unwrap();
    let context = Arc::new(AppOperationContext::new(
        app("com.example.notes"),
        Operation::Refresh,
        Arc::clone(&group),
        progress,
        None,
    ));
    context.set_installed_app(record("com.example.notes"));

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    group.set_completion_handler(Box::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let manager = h.manager.clone();
            let context = Arc::clone(&context);
            tokio::spawn(async move { manager.finish_app_operation(&context).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert!(context.is_finished());
    assert_eq!(h.store.saves.load(Ordering::SeqCst), 1);
    assert_eq!(group.result_count(), 1);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refresh_joins_a_running_group_and_shares_authentication() {
    let h = harness(Options {
        gated: true,
        ..Options::default()
    });

    let group = h
        .manager
        .refresh(&[record("com.example.notes")], None, None)
        .await;
    let joined = h
        .manager
        .refresh(
            &[record("com.example.timer")],
            None,
            Some(Arc::clone(&group)),
        )
        .await;
    assert!(Arc::ptr_eq(&group, &joined));
    assert_eq!(group.expected_count(), 2);

    h.gate.add_permits(8);
    let results = group.wait().await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.values().all(Result::is_ok));
    assert_eq!(h.credentials.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refresh_skips_apps_already_refreshing() {
    let h = harness(Options {
        gated: true,
        ..Options::default()
    });

    let first = h
        .manager
        .refresh(&[record("com.example.notes")], None, None)
        .await;
    assert!(h.manager.refresh_progress("com.example.notes").is_some());

    let second = h
        .manager
        .refresh(&[record("com.example.notes")], None, None)
        .await;
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(second.wait().await.unwrap().is_empty());

    h.gate.add_permits(8);
    assert_eq!(first.wait().await.unwrap().len(), 1);
    assert_eq!(h.downloader.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn completed_group_is_not_reused() {
    let h = harness(Options::default());
    let first = h
        .manager
        .refresh(&[record("com.example.notes")], None, None)
        .await;
    first.wait().await.unwrap();

    let second = h
        .manager
        .refresh(&[record("com.example.timer")], None, Some(Arc::clone(&first)))
        .await;
    assert!(!Arc::ptr_eq(&first, &second));
    let results = second.wait().await.unwrap();
    assert!(results.contains_key("com.example.timer"));
    assert_eq!(first.result_count(), 1);
}

#[tokio::test]
async fn records_without_a_catalog_source_are_not_refreshed() {
    let h = harness(Options::default());
    let mut local = record("com.example.local");
    local.download_url = None;

    let group = h.manager.refresh(&[local], None, None).await;
    assert!(group.wait().await.unwrap().is_empty());
    assert_eq!(h.credentials.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancelling_an_install_finishes_it_as_cancelled() {
    let h = harness(Options {
        gated: true,
        ..Options::default()
    });

    let handle = h.manager.install(app("com.example.notes"), None).await;
    handle.cancel();
    let err = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .unwrap()
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(h.store.saves.load(Ordering::SeqCst), 0);
    assert!(h.manager.installation_progress("com.example.notes").is_none());
}

fn drain(rx: &mut EventReceiver) -> Vec<AppEvent> {
    let mut events = Vec::new();
    while let Ok(message) = rx.try_recv() {
        events.push(message.event);
    }
    events
}

#[tokio::test]
async fn fetch_apps_announces_only_successful_fetches() {
    let (tx, mut rx) = sideload_events::channel();
    let h = harness(Options {
        catalog: Some(vec![app("com.example.notes"), app("com.example.timer")]),
        events: Some(tx),
        ..Options::default()
    });
    let apps = h.manager.fetch_apps().await.unwrap();
    assert_eq!(apps.len(), 2);
    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        AppEvent::Catalog(CatalogEvent::AppsFetched { count: 2, .. })
    )));

    let (tx, mut rx) = sideload_events::channel();
    let h = harness(Options {
        catalog: None,
        events: Some(tx),
        ..Options::default()
    });
    assert!(h.manager.fetch_apps().await.is_err());
    let events = drain(&mut rx);
    assert!(!events
        .iter()
        .any(|e| matches!(e, AppEvent::Catalog(CatalogEvent::AppsFetched { .. }))));
    assert!(events
        .iter()
        .any(|e| matches!(e, AppEvent::Catalog(CatalogEvent::FetchFailed { .. }))));
}

#[tokio::test]
async fn update_removes_records_missing_from_the_device() {
    let h = harness(Options::default());
    h.store.save(&record("com.example.notes")).await.unwrap();
    h.store.save(&record("com.example.timer")).await.unwrap();

    let skipped = h.manager.update(None).await.unwrap();
    assert_eq!(skipped.checked, 0);
    assert_eq!(h.manager.installed_apps().await.unwrap().len(), 2);

    let verifier = Verifier {
        installed: vec!["com.example.notes.TEAM123".to_string()],
    };
    let report = h.manager.update(Some(&verifier)).await.unwrap();
    assert_eq!(report.checked, 2);
    assert_eq!(report.removed, vec!["com.example.timer".to_string()]);

    let remaining = h.manager.installed_apps().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].identifier, "com.example.notes");
}

#[tokio::test]
async fn authenticate_surfaces_the_provider_error() {
    let h = harness(Options {
        auth_fails: true,
        ..Options::default()
    });
    let err = h.manager.authenticate(None).await.unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::NoAccount)));

    let h = harness(Options::default());
    let credential = h.manager.authenticate(None).await.unwrap();
    assert_eq!(credential.account.team_identifier, "TEAM123");
}

#[tokio::test]
async fn builder_requires_every_component() {
    let err = AppManagerBuilder::new().build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unknown);
}
