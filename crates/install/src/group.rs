//! Batches of app pipelines sharing authentication and an endpoint

use crate::graph::StageSignal;
use crate::progress::APP_UNITS;
use dashmap::DashMap;
use sideload_errors::{Error, SigningError};
use sideload_events::ProgressTracker;
use sideload_types::{Endpoint, InstalledApp, SigningCredential};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tokio::sync::watch;
use uuid::Uuid;

/// Terminal result per app identifier
pub type BatchResults = HashMap<String, Result<InstalledApp, Error>>;

/// Per-app results, or the error that failed the whole batch
pub type BatchOutcome = Result<BatchResults, Error>;

pub type CompletionHandler = Box<dyn FnOnce(BatchOutcome) + Send>;

/// A completed batch taken out of its group, ready to be delivered
///
/// Produced at most once per group.
pub struct BatchCompletion {
    outcome: BatchOutcome,
    handler: Option<CompletionHandler>,
}

impl BatchCompletion {
    pub fn outcome(&self) -> &BatchOutcome {
        &self.outcome
    }
}

#[derive(Default)]
struct GroupState {
    expected: usize,
    results: BatchResults,
    handler: Option<CompletionHandler>,
    outcome: Option<BatchOutcome>,
}

/// One batch of app pipelines
///
/// The endpoint and credential are written once and read by every app's
/// stages afterwards. Completion fires when every registered app has a
/// result, exactly once.
pub struct BatchGroup {
    id: Uuid,
    progress: ProgressTracker,
    auth_progress: ProgressTracker,
    endpoint: OnceLock<Endpoint>,
    credential: OnceLock<Result<SigningCredential, Error>>,
    auth_signal: OnceLock<StageSignal>,
    app_progress: DashMap<String, ProgressTracker>,
    state: Mutex<GroupState>,
    done: watch::Sender<Option<BatchOutcome>>,
}

impl BatchGroup {
    #[must_use]
    pub fn new() -> Arc<Self> {
        let progress = ProgressTracker::new("batch", 0);
        let auth_progress = progress.child("authenticate", 1, 0);
        let (done, _) = watch::channel(None);
        Arc::new(Self {
            id: Uuid::new_v4(),
            progress,
            auth_progress,
            endpoint: OnceLock::new(),
            credential: OnceLock::new(),
            auth_signal: OnceLock::new(),
            app_progress: DashMap::new(),
            state: Mutex::new(GroupState::default()),
            done,
        })
    }

    /// New batch holding exactly one app
    #[must_use]
    pub fn single(identifier: &str) -> (Arc<Self>, ProgressTracker) {
        let group = Self::new();
        let tracker = group.mount_app(identifier, &mut group.state());
        (group, tracker)
    }

    fn state(&self) -> MutexGuard<'_, GroupState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Root tracker, one unit per app
    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn auth_progress(&self) -> &ProgressTracker {
        &self.auth_progress
    }

    /// Add an app to the batch and mount its tracker.
    ///
    /// Returns `None` if the app is already part of the batch or the batch
    /// has completed.
    pub fn register_app(&self, identifier: &str) -> Option<ProgressTracker> {
        let mut state = self.state();
        if state.outcome.is_some() || self.app_progress.contains_key(identifier) {
            return None;
        }
        Some(self.mount_app(identifier, &mut state))
    }

    fn mount_app(&self, identifier: &str, state: &mut GroupState) -> ProgressTracker {
        let tracker = self.progress.child(identifier, APP_UNITS, 1);
        self.progress.extend_total(1);
        self.app_progress
            .insert(identifier.to_string(), tracker.clone());
        state.expected += 1;
        tracker
    }

    pub fn app_progress(&self, identifier: &str) -> Option<ProgressTracker> {
        self.app_progress
            .get(identifier)
            .map(|entry| entry.value().clone())
    }

    pub fn app_identifiers(&self) -> Vec<String> {
        self.app_progress
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.get()
    }

    /// Set the endpoint unless one is already set. Returns the stored one.
    pub fn set_endpoint(&self, endpoint: Endpoint) -> &Endpoint {
        self.endpoint.get_or_init(|| endpoint)
    }

    /// Credential resolved by the batch's authentication stage
    ///
    /// # Errors
    ///
    /// Returns the authentication error, or `MissingCredential` if
    /// authentication has not resolved yet.
    pub fn credential(&self) -> Result<SigningCredential, Error> {
        match self.credential.get() {
            Some(Ok(credential)) => Ok(credential.clone()),
            Some(Err(err)) => Err(err.clone()),
            None => Err(SigningError::MissingCredential.into()),
        }
    }

    /// Returns `false` if authentication already resolved
    pub fn set_credential(&self, result: Result<SigningCredential, Error>) -> bool {
        self.credential.set(result).is_ok()
    }

    /// Signal of the authentication stage, once a pipeline built one
    pub fn auth_signal(&self) -> Option<StageSignal> {
        self.auth_signal.get().cloned()
    }

    pub fn set_auth_signal(&self, signal: StageSignal) -> bool {
        self.auth_signal.set(signal).is_ok()
    }

    pub fn expected_count(&self) -> usize {
        self.state().expected
    }

    pub fn result_count(&self) -> usize {
        self.state().results.len()
    }

    pub fn results(&self) -> BatchResults {
        self.state().results.clone()
    }

    pub fn is_completed(&self) -> bool {
        self.state().outcome.is_some()
    }

    /// Record the terminal result of one app.
    ///
    /// Only the first result per app is kept. Returns the completion once
    /// every registered app has a result.
    pub fn record_result(
        &self,
        identifier: &str,
        result: Result<InstalledApp, Error>,
    ) -> Option<BatchCompletion> {
        let mut state = self.state();
        if state.outcome.is_some() || state.results.contains_key(identifier) {
            return None;
        }
        state.results.insert(identifier.to_string(), result);
        if state.results.len() < state.expected {
            return None;
        }
        let outcome = Ok(state.results.clone());
        Some(Self::complete(&mut state, outcome))
    }

    /// Fail the whole batch, e.g. when no helper was found
    pub fn fail(&self, error: Error) -> Option<BatchCompletion> {
        let mut state = self.state();
        if state.outcome.is_some() {
            return None;
        }
        Some(Self::complete(&mut state, Err(error)))
    }

    /// Complete a batch that ended up with no apps at all
    pub fn complete_if_empty(&self) -> Option<BatchCompletion> {
        let mut state = self.state();
        if state.outcome.is_some() || state.expected > 0 {
            return None;
        }
        Some(Self::complete(&mut state, Ok(BatchResults::new())))
    }

    fn complete(state: &mut GroupState, outcome: BatchOutcome) -> BatchCompletion {
        state.outcome = Some(outcome.clone());
        BatchCompletion {
            outcome,
            handler: state.handler.take(),
        }
    }

    /// Hand a completion to the handler and to every waiter
    pub fn deliver(&self, completion: BatchCompletion) {
        let BatchCompletion { outcome, handler } = completion;
        self.done.send_replace(Some(outcome.clone()));
        if let Some(handler) = handler {
            handler(outcome);
        }
    }

    /// Install the completion handler, replacing any earlier one.
    ///
    /// If the batch already completed the handler runs right away.
    pub fn set_completion_handler(&self, handler: CompletionHandler) {
        let mut state = self.state();
        match state.outcome.clone() {
            Some(outcome) => {
                drop(state);
                handler(outcome);
            }
            None => state.handler = Some(handler),
        }
    }

    /// Wait for the batch to complete
    pub async fn wait(&self) -> BatchOutcome {
        let mut rx = self.done.subscribe();
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => Option::clone(&outcome),
            Err(_) => return Err(Error::internal("batch dropped before completing")),
        };
        outcome.unwrap_or_else(|| Err(Error::internal("batch completed without an outcome")))
    }
}

impl std::fmt::Debug for BatchGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("BatchGroup")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint.get())
            .field("expected", &state.expected)
            .field("results", &state.results.len())
            .field("completed", &state.outcome.is_some())
            .finish_non_exhaustive()
    }
}
