//! Progress weights of a per-app pipeline
//!
//! Each app owns a tracker of [`APP_UNITS`] units. Every stage is mounted as
//! a child worth a fixed share of those units. When the cached package is
//! reused the download child is never mounted and its share is removed
//! from the app total.

use sideload_events::{ProgressTracker, StageKind};

pub const APP_UNITS: u64 = 100;
pub const RESIGN_UNITS: u64 = 20;
pub const DOWNLOAD_UNITS: u64 = 40;
pub const SEND_UNITS: u64 = 10;
pub const INSTALL_UNITS: u64 = 30;

/// Units the given stage contributes to its app
#[must_use]
pub fn stage_units(kind: StageKind) -> u64 {
    match kind {
        StageKind::Authenticate => 0,
        StageKind::Download => DOWNLOAD_UNITS,
        StageKind::Resign => RESIGN_UNITS,
        StageKind::Send => SEND_UNITS,
        StageKind::Install => INSTALL_UNITS,
    }
}

/// Drop the download share from an app tracker that will not download
pub fn skip_download(app: &ProgressTracker) {
    app.set_total(APP_UNITS - DOWNLOAD_UNITS);
}

/// Mount the tracker for one stage under its app
#[must_use]
pub fn mount_stage(app: &ProgressTracker, kind: StageKind) -> ProgressTracker {
    app.child(kind.as_str(), 1, stage_units(kind))
}
