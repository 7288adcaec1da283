use sideload_errors::Error;
use sideload_events::ProgressTracker;
use sideload_types::InstalledApp;
use tokio::sync::watch;

type ResultSender = watch::Sender<Option<Result<InstalledApp, Error>>>;

/// Progress and eventual result of one app install
///
/// Clones observe the same install. A duplicate `install` call for an app
/// already in flight returns a clone of the first handle.
#[derive(Clone)]
pub struct InstallHandle {
    progress: ProgressTracker,
    result: watch::Receiver<Option<Result<InstalledApp, Error>>>,
}

impl InstallHandle {
    pub(crate) fn new(progress: ProgressTracker) -> (Self, ResultSender) {
        let (tx, result) = watch::channel(None);
        (Self { progress, result }, tx)
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Whether both handles track the same install
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.progress.ptr_eq(&other.progress)
    }

    /// Cancel every stage of this app that has not finished yet
    pub fn cancel(&self) {
        self.progress.cancel();
    }

    /// The result, if the install already finished
    pub fn try_result(&self) -> Option<Result<InstalledApp, Error>> {
        self.result.borrow().clone()
    }

    /// Wait for the install to finish
    ///
    /// # Errors
    ///
    /// Returns the app's terminal error.
    pub async fn wait(&self) -> Result<InstalledApp, Error> {
        let mut rx = self.result.clone();
        let result = match rx.wait_for(Option::is_some).await {
            Ok(result) => Option::clone(&result),
            Err(_) => return Err(Error::internal("install was dropped before finishing")),
        };
        result.unwrap_or_else(|| Err(Error::internal("install finished without a result")))
    }
}

impl std::fmt::Debug for InstallHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallHandle")
            .field("progress", &self.progress)
            .field("finished", &self.result.borrow().is_some())
            .finish()
    }
}
