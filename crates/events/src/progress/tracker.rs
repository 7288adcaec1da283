use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;

/// Shared handle to one node of a progress tree
#[derive(Clone)]
pub struct ProgressTracker {
    inner: Arc<Inner>,
}

struct Inner {
    id: Uuid,
    label: String,
    cancel: CancellationToken,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    total: u64,
    completed: u64,
    finished: bool,
    children: Vec<Child>,
}

#[derive(Clone)]
struct Child {
    tracker: ProgressTracker,
    pending: u64,
}

impl ProgressTracker {
    /// Create a root tracker with `total` units of work
    pub fn new(label: impl Into<String>, total: u64) -> Self {
        Self::with_token(label.into(), total, CancellationToken::new())
    }

    fn with_token(label: String, total: u64, cancel: CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                label,
                cancel,
                state: Mutex::new(State {
                    total,
                    ..State::default()
                }),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Mount a new child that accounts for `pending` of this tracker's units
    pub fn child(&self, label: impl Into<String>, total: u64, pending: u64) -> Self {
        let child = Self::with_token(label.into(), total, self.inner.cancel.child_token());
        self.state().children.push(Child {
            tracker: child.clone(),
            pending,
        });
        child
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn total_unit_count(&self) -> u64 {
        self.state().total
    }

    /// Change the unit total, e.g. once a download learns its content length
    pub fn set_total(&self, total: u64) {
        let mut state = self.state();
        state.total = total;
        state.completed = state.completed.min(total);
    }

    /// Grow the total by `units`, used when a batch gains apps
    pub fn extend_total(&self, units: u64) {
        let mut state = self.state();
        state.total = state.total.saturating_add(units);
    }

    /// Record `units` of directly completed work
    pub fn advance(&self, units: u64) {
        let mut state = self.state();
        state.completed = state.completed.saturating_add(units).min(state.total);
    }

    pub fn set_completed(&self, units: u64) {
        let mut state = self.state();
        state.completed = units.min(state.total);
    }

    /// Mark all units done
    pub fn finish(&self) {
        let mut state = self.state();
        state.completed = state.total;
        state.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.fraction_completed() >= 1.0
    }

    /// Units completed directly plus the pending units of finished children
    pub fn completed_unit_count(&self) -> u64 {
        let (completed, children) = self.snapshot();
        children
            .iter()
            .filter(|child| child.tracker.is_finished())
            .fold(completed, |acc, child| acc.saturating_add(child.pending))
    }

    /// Fraction in `0.0..=1.0`, crediting children proportionally
    pub fn fraction_completed(&self) -> f64 {
        let (total, completed, finished, children) = {
            let state = self.state();
            (
                state.total,
                state.completed,
                state.finished,
                state.children.clone(),
            )
        };
        if total == 0 {
            return if finished { 1.0 } else { 0.0 };
        }
        let credited = children.iter().fold(completed as f64, |acc, child| {
            acc + child.pending as f64 * child.tracker.fraction_completed()
        });
        (credited / total as f64).clamp(0.0, 1.0)
    }

    /// Labels and pending units of the mounted children, in mount order
    pub fn child_weights(&self) -> Vec<(String, u64)> {
        self.snapshot()
            .1
            .iter()
            .map(|child| (child.tracker.label().to_string(), child.pending))
            .collect()
    }

    fn snapshot(&self) -> (u64, Vec<Child>) {
        let state = self.state();
        (state.completed, state.children.clone())
    }

    /// Cancel this tracker and every tracker below it
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Resolves once this tracker or an ancestor is cancelled
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.inner.cancel.cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Whether both handles refer to the same tracker
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("ProgressTracker")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("total", &state.total)
            .field("completed", &state.completed)
            .field("children", &state.children.len())
            .field("cancelled", &self.inner.cancel.is_cancelled())
            .finish()
    }
}
