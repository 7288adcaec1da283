#![allow(
    clippy::cast_precision_loss, // Unit counts are converted to fractions
    clippy::must_use_candidate
)]

//! Weighted hierarchical progress
//!
//! A [`ProgressTracker`] counts discrete units of work. Children are mounted
//! with a number of the parent's units ("pending units"); a child's fraction
//! of completion is credited to the parent proportionally, so a child mounted
//! with 40 of 100 units that is half done contributes 20 units.
//!
//! ```rust
//! use sideload_events::ProgressTracker;
//!
//! let app = ProgressTracker::new("com.example.app", 100);
//! let download = app.child("download", 1_000, 40);
//! let resign = app.child("resign", 1, 20);
//!
//! download.advance(500);
//! assert!((app.fraction_completed() - 0.2).abs() < f64::EPSILON);
//!
//! download.finish();
//! resign.finish();
//! assert_eq!(app.completed_unit_count(), 60);
//! ```
//!
//! Every tracker owns a cancellation token derived from its parent's, so
//! cancelling a tracker cancels its whole subtree.

mod tracker;

pub use tracker::ProgressTracker;
