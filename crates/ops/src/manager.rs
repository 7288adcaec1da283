//! Install and refresh entry points

use crate::handle::InstallHandle;
use crate::pipeline::PendingApp;
use dashmap::DashMap;
use sideload_errors::Error;
use sideload_events::{EventEmitter, EventSender, ProgressTracker};
use sideload_install::{ArtifactStore, BatchGroup, Operation, PipelineSettings};
use sideload_platform::{
    AppCatalog, AppDownloader, AppSigner, CredentialProvider, DeviceTransport, EndpointDiscovery,
    InstalledAppStore, Presenter,
};
use sideload_types::{App, InstalledApp};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};

pub(crate) struct Inner {
    pub(crate) credentials: Arc<dyn CredentialProvider>,
    pub(crate) catalog: Arc<dyn AppCatalog>,
    pub(crate) downloader: Arc<dyn AppDownloader>,
    pub(crate) signer: Arc<dyn AppSigner>,
    pub(crate) discovery: Arc<dyn EndpointDiscovery>,
    pub(crate) transport: Arc<dyn DeviceTransport>,
    pub(crate) store: Arc<dyn InstalledAppStore>,
    pub(crate) artifacts: ArtifactStore,
    pub(crate) settings: PipelineSettings,
    /// Worker pool shared by the stages of every batch
    pub(crate) pool: Arc<Semaphore>,
    pub(crate) installation_progress: DashMap<String, InstallHandle>,
    pub(crate) refresh_progress: DashMap<String, ProgressTracker>,
    /// Serializes finalization and in-flight bookkeeping across all batches
    pub(crate) finalize_lock: Mutex<()>,
    pub(crate) tx: Option<EventSender>,
}

/// Orchestrates app installs and refreshes
///
/// Cheap to clone; clones share the in-flight maps and the worker pool.
#[derive(Clone)]
pub struct AppManager {
    pub(crate) inner: Arc<Inner>,
}

impl EventEmitter for AppManager {
    fn event_sender(&self) -> Option<&EventSender> {
        self.inner.tx.as_ref()
    }
}

impl std::fmt::Debug for AppManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppManager")
            .field("settings", &self.inner.settings)
            .field("installing", &self.inner.installation_progress.len())
            .field("refreshing", &self.inner.refresh_progress.len())
            .finish_non_exhaustive()
    }
}

impl AppManager {
    pub(crate) fn from_inner(inner: Inner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Install `app`, always downloading a fresh package.
    ///
    /// If an install of the same app is already running its handle is
    /// returned and no new work starts.
    pub async fn install(&self, app: App, presenter: Option<Arc<dyn Presenter>>) -> InstallHandle {
        let (group, handle, sender) = {
            let _guard = self.inner.finalize_lock.lock().await;
            if let Some(existing) = self.inner.installation_progress.get(&app.identifier) {
                return existing.value().clone();
            }
            let (group, progress) = BatchGroup::single(&app.identifier);
            let (handle, sender) = InstallHandle::new(progress);
            self.inner
                .installation_progress
                .insert(app.identifier.clone(), handle.clone());
            (group, handle, sender)
        };

        let identifier = app.identifier.clone();
        group.set_completion_handler(Box::new(move |outcome| {
            let result = outcome.and_then(|mut results| {
                results
                    .remove(&identifier)
                    .unwrap_or_else(|| Err(Error::internal("batch completed without a result")))
            });
            sender.send_replace(Some(result));
        }));

        let pending = vec![PendingApp {
            app,
            progress: handle.progress().clone(),
        }];
        self.build_pipeline(&group, pending, true, presenter, Operation::Install)
            .await;
        handle
    }

    /// Refresh installed apps, reusing cached packages where possible.
    ///
    /// Apps already being refreshed are skipped. Passing `group` adds the
    /// apps to that batch so they share its authentication; a group that
    /// already completed is not reused. Returns without waiting for the
    /// batch; use [`BatchGroup::wait`] or a completion handler.
    pub async fn refresh(
        &self,
        installed_apps: &[InstalledApp],
        presenter: Option<Arc<dyn Presenter>>,
        group: Option<Arc<BatchGroup>>,
    ) -> Arc<BatchGroup> {
        let (group, pending, completion) = {
            let _guard = self.inner.finalize_lock.lock().await;
            let group = match group {
                Some(group) if !group.is_completed() => group,
                Some(group) => {
                    self.emit_debug(format!(
                        "batch {} already completed, starting a new one",
                        group.id()
                    ));
                    BatchGroup::new()
                }
                None => BatchGroup::new(),
            };

            let mut pending = Vec::new();
            for record in installed_apps {
                let Some(app) = record.app() else {
                    self.emit_debug(format!(
                        "{} has no catalog source, not refreshing",
                        record.identifier
                    ));
                    continue;
                };
                if self.inner.refresh_progress.contains_key(&app.identifier) {
                    continue;
                }
                let Some(progress) = group.register_app(&app.identifier) else {
                    continue;
                };
                self.inner
                    .refresh_progress
                    .insert(app.identifier.clone(), progress.clone());
                pending.push(PendingApp { app, progress });
            }
            let completion = group.complete_if_empty();
            (group, pending, completion)
        };

        if let Some(completion) = completion {
            group.deliver(completion);
        }
        if !pending.is_empty() {
            self.build_pipeline(&group, pending, false, presenter, Operation::Refresh)
                .await;
        }
        group
    }

    /// Handle of the running install of `identifier`, if any
    pub fn installation_progress(&self, identifier: &str) -> Option<InstallHandle> {
        self.inner
            .installation_progress
            .get(identifier)
            .map(|entry| entry.value().clone())
    }

    /// Progress of the running refresh of `identifier`, if any
    pub fn refresh_progress(&self, identifier: &str) -> Option<ProgressTracker> {
        self.inner
            .refresh_progress
            .get(identifier)
            .map(|entry| entry.value().clone())
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.inner.settings
    }
}
