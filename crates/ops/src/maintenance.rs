//! Catalog, account and record maintenance

use crate::manager::AppManager;
use serde::{Deserialize, Serialize};
use sideload_errors::Error;
use sideload_events::{
    AppEvent, CatalogEvent, EventEmitter, FailureContext, ProgressTracker, StateEvent,
};
use sideload_install::stages::AuthenticateStage;
use sideload_install::Stage;
use sideload_platform::{InstallVerifier, Presenter};
use sideload_types::{App, InstalledApp, SigningCredential};
use std::sync::Arc;

/// Outcome of reconciling stored records with the device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub checked: usize,
    /// Identifiers whose records were removed
    pub removed: Vec<String>,
}

impl AppManager {
    /// List the apps offered by the configured catalog.
    ///
    /// # Errors
    ///
    /// Returns the catalog error; `AppsFetched` is only published on success.
    pub async fn fetch_apps(&self) -> Result<Vec<App>, Error> {
        let source = self.inner.catalog.source();
        self.emit(AppEvent::Catalog(CatalogEvent::FetchStarted {
            source: source.clone(),
        }));
        match self.inner.catalog.list_apps().await {
            Ok(apps) => {
                self.emit(AppEvent::Catalog(CatalogEvent::AppsFetched {
                    source,
                    count: apps.len(),
                }));
                Ok(apps)
            }
            Err(err) => {
                self.emit(AppEvent::Catalog(CatalogEvent::FetchFailed {
                    source,
                    failure: FailureContext::from_error(&err),
                }));
                Err(err)
            }
        }
    }

    /// Resolve the signing credential outside of any batch.
    ///
    /// # Errors
    ///
    /// Same failures as the authenticate stage of a pipeline.
    pub async fn authenticate(
        &self,
        presenter: Option<Arc<dyn Presenter>>,
    ) -> Result<SigningCredential, Error> {
        self.emit_operation_started("authenticate");
        let stage = AuthenticateStage::new(Arc::clone(&self.inner.credentials), presenter);
        let result = stage
            .execute(&ProgressTracker::new("authenticate", 1))
            .await;
        match &result {
            Ok(_) => self.emit_operation_completed("authenticate", true),
            Err(err) => self.emit_operation_failed("authenticate", err),
        }
        result
    }

    /// Stored records of every installed app
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn installed_apps(&self) -> Result<Vec<InstalledApp>, Error> {
        self.inner.store.list().await
    }

    /// Drop records of apps the device no longer reports as installed.
    ///
    /// Without a verifier nothing is checked. A record whose status cannot
    /// be determined is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored records cannot be listed.
    pub async fn update(
        &self,
        verifier: Option<&dyn InstallVerifier>,
    ) -> Result<ReconcileReport, Error> {
        let Some(verifier) = verifier else {
            self.emit_debug("no helper available, skipping reconciliation");
            return Ok(ReconcileReport::default());
        };

        let mut report = ReconcileReport::default();
        for record in self.inner.store.list().await? {
            report.checked += 1;
            match verifier.is_installed(&record.resigned_identifier).await {
                Ok(true) => {}
                Ok(false) => match self.inner.store.delete(&record.identifier).await {
                    Ok(_) => report.removed.push(record.identifier),
                    Err(err) => self.emit_warning_with_context(
                        format!("failed to remove the record of {}", record.identifier),
                        err.to_string(),
                    ),
                },
                Err(err) => self.emit_warning_with_context(
                    format!("could not check whether {} is installed", record.identifier),
                    err.to_string(),
                ),
            }
        }

        self.emit(AppEvent::State(StateEvent::ReconciliationCompleted {
            checked: report.checked,
            removed: report.removed.len(),
        }));
        Ok(report)
    }
}
