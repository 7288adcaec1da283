#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Pipeline engine for app installation and refresh
//!
//! A batch is a [`BatchGroup`] sharing one authentication stage and one
//! helper endpoint. Every app in it gets an [`AppOperationContext`] and a
//! chain of stages (download, resign, send, install) wired into a
//! [`PipelineGraph`]. The graph runs stages on a bounded worker pool once
//! their dependencies have resolved.

mod artifacts;
mod context;
mod graph;
mod group;
pub mod progress;
mod settings;
mod stage;
pub mod stages;

pub use artifacts::ArtifactStore;
pub use context::{AppOperationContext, Operation};
pub use graph::{PipelineGraph, PipelineRun, StageId, StageSignal};
pub use group::{BatchCompletion, BatchGroup, BatchOutcome, BatchResults, CompletionHandler};
pub use settings::PipelineSettings;
pub use stage::Stage;
