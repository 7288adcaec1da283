//! State manager implementation

use crate::queries;
use async_trait::async_trait;
use sideload_errors::Error;
use sideload_events::{AppEvent, EventEmitter, EventSender, StateEvent};
use sideload_platform::InstalledAppStore;
use sideload_types::{InstalledApp, SigningCredential};
use sqlx::{Pool, Sqlite};
use std::path::Path;

/// Handle to the installed-app records and the stored account
#[derive(Clone)]
pub struct StateManager {
    pool: Pool<Sqlite>,
    tx: Option<EventSender>,
}

impl EventEmitter for StateManager {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl StateManager {
    /// Open (creating if needed) the database at `db_path` and migrate it
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory, the pool or a migration fails.
    pub async fn open(db_path: &Path, tx: Option<EventSender>) -> Result<Self, Error> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(&e, parent))?;
        }

        let pool = crate::create_pool(db_path).await?;
        crate::run_migrations(&pool).await?;

        let manager = Self::with_pool(pool, tx);
        manager.emit(AppEvent::State(StateEvent::Initialized {
            database: db_path.display().to_string(),
        }));
        Ok(manager)
    }

    /// Wrap an existing, already migrated pool
    #[must_use]
    pub fn with_pool(pool: Pool<Sqlite>, tx: Option<EventSender>) -> Self {
        Self { pool, tx }
    }

    /// Stored signing credential, if an account is signed in
    pub async fn credential(&self) -> Result<Option<SigningCredential>, Error> {
        let mut tx = self.pool.begin().await?;
        let credential = queries::get_credential(&mut tx).await?;
        tx.commit().await?;
        Ok(credential)
    }

    /// Replace the stored account
    pub async fn save_credential(&self, credential: &SigningCredential) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        queries::save_credential(&mut tx, credential).await?;
        tx.commit().await?;

        self.emit(AppEvent::State(StateEvent::AccountSaved {
            email: credential.account.email.clone(),
        }));
        Ok(())
    }

    /// Forget the signed-in account
    pub async fn reset(&self) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        queries::clear_credential(&mut tx).await?;
        tx.commit().await?;

        self.emit(AppEvent::State(StateEvent::AccountReset));
        Ok(())
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl InstalledAppStore for StateManager {
    async fn get(&self, identifier: &str) -> Result<Option<InstalledApp>, Error> {
        let mut tx = self.pool.begin().await?;
        let app = queries::get_installed_app(&mut tx, identifier).await?;
        tx.commit().await?;
        Ok(app)
    }

    async fn exists(&self, identifier: &str) -> Result<bool, Error> {
        let mut tx = self.pool.begin().await?;
        let exists = queries::installed_app_exists(&mut tx, identifier).await?;
        tx.commit().await?;
        Ok(exists)
    }

    async fn save(&self, app: &InstalledApp) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        queries::upsert_installed_app(&mut tx, app).await?;
        tx.commit().await?;

        self.emit(AppEvent::State(StateEvent::RecordSaved {
            identifier: app.identifier.clone(),
        }));
        Ok(())
    }

    async fn delete(&self, identifier: &str) -> Result<bool, Error> {
        let mut tx = self.pool.begin().await?;
        let removed = queries::delete_installed_app(&mut tx, identifier).await?;
        tx.commit().await?;

        if removed {
            self.emit(AppEvent::State(StateEvent::RecordRemoved {
                identifier: identifier.to_string(),
            }));
        }
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<InstalledApp>, Error> {
        let mut tx = self.pool.begin().await?;
        let apps = queries::list_installed_apps(&mut tx).await?;
        tx.commit().await?;
        Ok(apps)
    }
}
