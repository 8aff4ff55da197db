//! Progress reporting for running operations.
//!
//! Transforms report fractional completion through a [`ProgressReporter`].
//! The executor routes those updates into the
//! [`ProgressTracker`](crate::tracker::ProgressTracker), where clients poll
//! them; nothing is pushed.
//!
//! # Example
//!
//! ```rust,ignore
//! use scrub_processing::{ClosureProgressReporter, ProgressUpdate};
//!
//! let reporter = ClosureProgressReporter::new(|update: ProgressUpdate| {
//!     println!("[{:.0}%] {}", update.fraction * 100.0, update.message);
//! });
//! ```

use serde::{Deserialize, Serialize};

use crate::types::OperationKind;

/// A progress sample emitted while an operation runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Operation the sample belongs to.
    pub operation: OperationKind,

    /// Overall completion (0.0 - 1.0).
    pub fraction: f32,

    /// Human-readable description of the current activity.
    pub message: String,

    /// Rows processed so far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    /// Rows to process in total.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl ProgressUpdate {
    /// Creates an update without item counts.
    pub fn new(operation: OperationKind, fraction: f32, message: impl Into<String>) -> Self {
        Self {
            operation,
            fraction: fraction.clamp(0.0, 1.0),
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    /// Creates an update from item counts; zero total counts as done.
    pub fn with_items(
        operation: OperationKind,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let fraction = if total > 0 {
            current as f32 / total as f32
        } else {
            1.0
        };
        Self {
            operation,
            fraction: fraction.clamp(0.0, 1.0),
            message: message.into(),
            items_processed: Some(current),
            items_total: Some(total),
        }
    }
}

/// Receiver of progress updates.
///
/// Implementations must be `Send + Sync`: the server runs transforms on the
/// blocking pool while handlers read the tracker.
pub trait ProgressReporter: Send + Sync {
    /// Called periodically while an operation runs. Must not block for long.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

/// Reporter that drops every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _update: ProgressUpdate) {}
}

/// Emits a row-count update every `interval` rows.
pub(crate) struct RowTicker<'a> {
    reporter: &'a dyn ProgressReporter,
    operation: OperationKind,
    interval: usize,
    total: usize,
}

impl<'a> RowTicker<'a> {
    pub(crate) fn new(
        reporter: &'a dyn ProgressReporter,
        operation: OperationKind,
        interval: usize,
        total: usize,
    ) -> Self {
        Self {
            reporter,
            operation,
            interval: interval.max(1),
            total,
        }
    }

    /// Report if `done` rows falls on an interval boundary.
    pub(crate) fn tick(&self, done: usize) {
        if done > 0 && done % self.interval == 0 && done < self.total {
            self.reporter.report(ProgressUpdate::with_items(
                self.operation,
                done,
                self.total,
                format!("{}: {}/{} rows", self.operation.display_name(), done, self.total),
            ));
        }
    }

    /// Final update once every row has been visited.
    pub(crate) fn finish(&self) {
        self.reporter.report(ProgressUpdate::with_items(
            self.operation,
            self.total,
            self.total,
            format!("{}: done", self.operation.display_name()),
        ));
    }
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);
static_assertions::assert_impl_all!(NoopReporter: ProgressReporter);
