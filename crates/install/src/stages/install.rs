use crate::context::AppOperationContext;
use crate::stage::Stage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sideload_errors::{ConnectionError, Error};
use sideload_events::{ProgressTracker, StageKind};
use sideload_types::{App, InstalledApp};
use std::sync::Arc;

/// Asks the helper to install the transferred package
///
/// Produces the installed-app record with fresh refresh and expiry dates.
pub struct InstallStage {
    context: Arc<AppOperationContext>,
    validity: chrono::Duration,
}

impl InstallStage {
    pub fn new(context: Arc<AppOperationContext>, validity: chrono::Duration) -> Self {
        Self { context, validity }
    }
}

#[async_trait]
impl Stage for InstallStage {
    type Output = InstalledApp;

    fn kind(&self) -> StageKind {
        StageKind::Install
    }

    async fn execute(&self, progress: &ProgressTracker) -> Result<InstalledApp, Error> {
        let identifier = self.context.identifier().to_string();
        let mut connection = self
            .context
            .take_connection()
            .ok_or_else(|| ConnectionError::MissingConnection {
                app: identifier.clone(),
            })?;
        let resigned = self
            .context
            .resigned()
            .ok_or(ConnectionError::MissingResignedFile { app: identifier })?;

        connection.install(progress).await?;

        Ok(installed_record(
            self.context.app(),
            self.context.previous(),
            resigned.resigned_identifier,
            Utc::now(),
            self.validity,
        ))
    }
}

fn installed_record(
    app: &App,
    previous: Option<&InstalledApp>,
    resigned_identifier: String,
    now: DateTime<Utc>,
    validity: chrono::Duration,
) -> InstalledApp {
    InstalledApp {
        identifier: app.identifier.clone(),
        name: app.name.clone(),
        version: app.version.clone(),
        resigned_identifier,
        installed_date: previous.map_or(now, |record| record.installed_date),
        refreshed_date: now,
        expiration_date: now + validity,
        download_url: (!app.download_url.is_empty()).then(|| app.download_url.clone()),
    }
}
