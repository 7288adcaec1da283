#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! App install and refresh orchestration for sideload
//!
//! [`AppManager`] is the entry point used by the CLI. It builds batches of
//! app pipelines, keeps at most one in-flight operation per app, and
//! finalizes every app exactly once.

mod builder;
mod handle;
mod manager;
mod maintenance;
mod pipeline;

pub use builder::AppManagerBuilder;
pub use handle::InstallHandle;
pub use maintenance::ReconcileReport;
pub use manager::AppManager;

pub use sideload_install::{ArtifactStore, BatchGroup, BatchOutcome, BatchResults, PipelineSettings};
