//! EVTrack engine - project-level rollups, forecasting, and snapshot diffing.
//!
//! Everything here is a pure, synchronous computation over immutable
//! in-memory snapshots: the engine never performs I/O, and warnings flow
//! through an injected diagnostic sink rather than a global logger.

#![warn(missing_docs)]

pub mod diagnostics;
pub mod diff;
pub mod project;

pub use diagnostics::{DiagnosticSink, MemorySink, TracingSink};
pub use diff::{
    AssigneeDiff, DiffKind, ProjectDiff, SnapshotDiffEngine, StatisticsRecord, TaskDiff,
    DEFAULT_SPAN_WARNING_DAYS,
};
pub use project::{
    CompletionForecast, Confidence, DelayedTask, ForecastOptions, Project, Statistics,
    DEFAULT_LOOKBACK_DAYS, DEFAULT_MAX_FORECAST_DAYS, PATH_SEPARATOR,
};
