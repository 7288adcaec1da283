//! Per-app state shared by the stages of one pipeline

use crate::group::BatchGroup;
use sideload_errors::Error;
use sideload_events::ProgressTracker;
use sideload_platform::{ResignedApp, TransferConnection};
use sideload_types::{App, InstalledApp};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Why a pipeline was started, used to pick the in-flight map to clear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Install,
    Refresh,
}

#[derive(Default)]
struct ContextState {
    error: Option<Error>,
    package: Option<PathBuf>,
    resigned: Option<ResignedApp>,
    installed_app: Option<InstalledApp>,
    connection: Option<Box<dyn TransferConnection>>,
    finished: bool,
}

/// Mutable state of one app inside a batch
///
/// Stages write artifacts here through their result handlers. The first
/// recorded error is the app's terminal error; later ones are dropped.
pub struct AppOperationContext {
    app: App,
    operation: Operation,
    group: Arc<BatchGroup>,
    progress: ProgressTracker,
    previous: Option<InstalledApp>,
    state: Mutex<ContextState>,
}

impl AppOperationContext {
    pub fn new(
        app: App,
        operation: Operation,
        group: Arc<BatchGroup>,
        progress: ProgressTracker,
        previous: Option<InstalledApp>,
    ) -> Self {
        Self {
            app,
            operation,
            group,
            progress,
            previous,
            state: Mutex::new(ContextState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn identifier(&self) -> &str {
        &self.app.identifier
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn group(&self) -> &Arc<BatchGroup> {
        &self.group
    }

    /// Root tracker of this app's stages
    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Record stored before this run started, if any
    pub fn previous(&self) -> Option<&InstalledApp> {
        self.previous.as_ref()
    }

    /// Record `error` unless an earlier one exists. Returns whether it was kept.
    pub fn set_error(&self, error: Error) -> bool {
        let mut state = self.state();
        if state.error.is_some() || state.finished {
            return false;
        }
        state.error = Some(error);
        true
    }

    pub fn error(&self) -> Option<Error> {
        self.state().error.clone()
    }

    /// Local package the resign stage should read
    pub fn set_package(&self, path: PathBuf) {
        self.state().package = Some(path);
    }

    pub fn package(&self) -> Option<PathBuf> {
        self.state().package.clone()
    }

    pub fn set_resigned(&self, resigned: ResignedApp) {
        self.state().resigned = Some(resigned);
    }

    pub fn resigned(&self) -> Option<ResignedApp> {
        self.state().resigned.clone()
    }

    pub fn set_installed_app(&self, installed: InstalledApp) {
        self.state().installed_app = Some(installed);
    }

    pub fn installed_app(&self) -> Option<InstalledApp> {
        self.state().installed_app.clone()
    }

    /// Session opened by the send stage
    pub fn set_connection(&self, connection: Box<dyn TransferConnection>) {
        self.state().connection = Some(connection);
    }

    pub fn take_connection(&self) -> Option<Box<dyn TransferConnection>> {
        self.state().connection.take()
    }

    /// Transition to finished. Returns `false` if it already was.
    pub fn mark_finished(&self) -> bool {
        let mut state = self.state();
        if state.finished {
            return false;
        }
        state.finished = true;
        true
    }

    pub fn is_finished(&self) -> bool {
        self.state().finished
    }
}

impl std::fmt::Debug for AppOperationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("AppOperationContext")
            .field("app", &self.app.identifier)
            .field("operation", &self.operation)
            .field("group", &self.group.id())
            .field("error", &state.error)
            .field("finished", &state.finished)
            .finish_non_exhaustive()
    }
}
