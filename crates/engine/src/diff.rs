//! Snapshot diffing - task, assignee, and project-level deltas between
//! two points in time of the same logical project.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use evtrack_core::{Task, TaskId};

use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::project::{Project, Statistics};

/// Span between oldest and newest snapshot beyond which recent-SPI
/// averaging warns, in calendar days.
pub const DEFAULT_SPAN_WARNING_DAYS: i64 = 30;

/// Kind of change a task underwent between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    /// Present only in the current snapshot
    Added,
    /// Present in both with at least one non-zero delta
    Modified,
    /// Present only in the previous snapshot
    Removed,
    /// Present in both, no change
    #[serde(rename = "none")]
    Unchanged,
}

/// Change record for one leaf task across two snapshots.
///
/// Deltas are `current - previous`. When a value exists on only one
/// side, the delta is that value's full magnitude, signed negative for
/// the previous-only case: appearing or disappearing counts as a full
/// change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDiff {
    /// Task identity shared across both snapshots
    pub id: TaskId,

    /// Task name (from the side the task exists on, current preferred)
    pub name: String,

    /// Assignee (current preferred)
    pub assignee: Option<String>,

    /// How the task changed
    pub kind: DiffKind,

    /// Change in progress rate
    pub progress_delta: Option<f64>,

    /// Change in planned value
    pub pv_delta: Option<f64>,

    /// Change in earned value
    pub ev_delta: Option<f64>,

    /// Whether this row represents any change at all
    pub has_diff: bool,
}

/// Summed deltas and change counts over a set of task diffs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectDiff {
    /// Summed progress-rate delta
    pub progress_delta: f64,

    /// Summed planned-value delta
    pub pv_delta: f64,

    /// Summed earned-value delta
    pub ev_delta: f64,

    /// Tasks changed in place
    pub modified_count: usize,

    /// Tasks new in the current snapshot
    pub added_count: usize,

    /// Tasks gone from the current snapshot
    pub removed_count: usize,
}

/// Per-assignee aggregation of task diffs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssigneeDiff {
    /// Assignee the rows belong to; `None` is the unassigned bucket
    pub assignee: Option<String>,

    /// Aggregated deltas for that assignee
    pub diff: ProjectDiff,
}

/// One statistics record in a time series, keyed by its base date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsRecord {
    /// The as-of date the statistics were computed against
    pub base_date: NaiveDate,

    /// The computed aggregate
    pub stats: Statistics,
}

/// Compares project snapshots and maintains statistic series.
pub struct SnapshotDiffEngine {
    diagnostics: Arc<dyn DiagnosticSink>,
    span_warning_days: i64,
}

impl Default for SnapshotDiffEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Delta between two optional values; one-sided values count in full.
fn delta(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
    match (current, previous) {
        (Some(current), Some(previous)) => Some(current - previous),
        (Some(current), None) => Some(current),
        (None, Some(previous)) => Some(-previous),
        (None, None) => None,
    }
}

fn is_nonzero(value: Option<f64>) -> bool {
    matches!(value, Some(v) if v != 0.0)
}

impl SnapshotDiffEngine {
    /// Create an engine with tracing diagnostics and the default span
    /// warning threshold.
    pub fn new() -> Self {
        Self::with_diagnostics(Arc::new(TracingSink))
    }

    /// Create an engine with an injected diagnostic sink.
    pub fn with_diagnostics(diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            diagnostics,
            span_warning_days: DEFAULT_SPAN_WARNING_DAYS,
        }
    }

    /// Override the recent-SPI span warning threshold.
    pub fn with_span_threshold(mut self, days: i64) -> Self {
        self.span_warning_days = days;
        self
    }

    /// Diff the leaf tasks of two snapshots of the same logical project.
    ///
    /// Every leaf id present in either snapshot appears exactly once.
    /// Grouping nodes are excluded entirely. Rows come in current-snapshot
    /// order, removed tasks last in previous-snapshot order.
    pub fn diff_tasks(&self, current: &Project, previous: &Project) -> Vec<TaskDiff> {
        let previous_by_id: HashMap<&TaskId, &Task> = previous
            .tree()
            .leaves()
            .map(|task| (&task.id, task))
            .collect();

        let mut seen: HashSet<&TaskId> = HashSet::new();
        let mut diffs = Vec::new();

        for task in current.tree().leaves() {
            match previous_by_id.get(&task.id) {
                Some(before) => {
                    seen.insert(&task.id);
                    let progress_delta = delta(task.progress_rate, before.progress_rate);
                    let pv_delta = delta(task.pv, before.pv);
                    let ev_delta = delta(task.ev, before.ev);
                    let changed = is_nonzero(progress_delta)
                        || is_nonzero(pv_delta)
                        || is_nonzero(ev_delta);
                    diffs.push(TaskDiff {
                        id: task.id.clone(),
                        name: task.name.clone(),
                        assignee: task.assignee.clone(),
                        kind: if changed {
                            DiffKind::Modified
                        } else {
                            DiffKind::Unchanged
                        },
                        progress_delta,
                        pv_delta,
                        ev_delta,
                        has_diff: changed,
                    });
                }
                None => {
                    diffs.push(TaskDiff {
                        id: task.id.clone(),
                        name: task.name.clone(),
                        assignee: task.assignee.clone(),
                        kind: DiffKind::Added,
                        progress_delta: delta(task.progress_rate, None),
                        pv_delta: delta(task.pv, None),
                        ev_delta: delta(task.ev, None),
                        has_diff: true,
                    });
                }
            }
        }

        for task in previous.tree().leaves() {
            if seen.contains(&task.id) {
                continue;
            }
            diffs.push(TaskDiff {
                id: task.id.clone(),
                name: task.name.clone(),
                assignee: task.assignee.clone(),
                kind: DiffKind::Removed,
                progress_delta: delta(None, task.progress_rate),
                pv_delta: delta(None, task.pv),
                ev_delta: delta(None, task.ev),
                // A disappeared task is always a difference, even with no
                // recorded values.
                has_diff: true,
            });
        }

        diffs
    }

    /// Sum deltas and change counts over all rows that carry a change.
    pub fn aggregate_project_diff(&self, diffs: &[TaskDiff]) -> ProjectDiff {
        let mut aggregate = ProjectDiff::default();
        for diff in diffs.iter().filter(|diff| diff.has_diff) {
            aggregate.progress_delta += diff.progress_delta.unwrap_or(0.0);
            aggregate.pv_delta += diff.pv_delta.unwrap_or(0.0);
            aggregate.ev_delta += diff.ev_delta.unwrap_or(0.0);
            match diff.kind {
                DiffKind::Modified => aggregate.modified_count += 1,
                DiffKind::Added => aggregate.added_count += 1,
                DiffKind::Removed => aggregate.removed_count += 1,
                DiffKind::Unchanged => {}
            }
        }
        aggregate
    }

    /// The same aggregation, grouped by assignee.
    pub fn aggregate_assignee_diffs(&self, diffs: &[TaskDiff]) -> Vec<AssigneeDiff> {
        let mut groups: BTreeMap<Option<String>, Vec<&TaskDiff>> = BTreeMap::new();
        for diff in diffs {
            groups.entry(diff.assignee.clone()).or_default().push(diff);
        }
        groups
            .into_iter()
            .map(|(assignee, rows)| {
                let rows: Vec<TaskDiff> = rows.into_iter().cloned().collect();
                AssigneeDiff {
                    assignee,
                    diff: self.aggregate_project_diff(&rows),
                }
            })
            .collect()
    }

    /// Mean SPI across the given snapshots, ignoring undefined values.
    ///
    /// `None` when the list is empty or no snapshot has a defined SPI.
    /// Warns (non-fatally) when two or more snapshots span more than the
    /// configured threshold, since a long window makes a "recent" average
    /// misleading; the computation still proceeds.
    pub fn recent_spi(&self, projects: &[&Project], filter: Option<&str>) -> Option<f64> {
        if projects.is_empty() {
            return None;
        }

        if projects.len() >= 2 {
            let oldest = projects.iter().map(|p| p.base_date()).min()?;
            let newest = projects.iter().map(|p| p.base_date()).max()?;
            let span = (newest - oldest).num_days();
            if span > self.span_warning_days {
                self.diagnostics.warn(&format!(
                    "recent SPI averages {} snapshots spanning {span} days \
                     (threshold {}); the result may not reflect recent performance",
                    projects.len(),
                    self.span_warning_days
                ));
            }
        }

        let spis: Vec<f64> = projects
            .iter()
            .filter_map(|project| project.statistics_for(filter).spi)
            .collect();
        if spis.is_empty() {
            return None;
        }
        Some(spis.iter().sum::<f64>() / spis.len() as f64)
    }

    /// Upsert incoming records into a series keyed by base date.
    ///
    /// An incoming record with the same base date overwrites the existing
    /// one. The result is sorted by base date descending.
    pub fn merge_statistics_series(
        &self,
        existing: Vec<StatisticsRecord>,
        incoming: Vec<StatisticsRecord>,
    ) -> Vec<StatisticsRecord> {
        let mut by_date: BTreeMap<NaiveDate, StatisticsRecord> = existing
            .into_iter()
            .map(|record| (record.base_date, record))
            .collect();
        for record in incoming {
            by_date.insert(record.base_date, record);
        }
        by_date.into_values().rev().collect()
    }

    /// Forward-fill calendar gaps in a statistics series.
    ///
    /// Every missing date between consecutive records gets a synthetic
    /// copy of the preceding real record with its base date advanced.
    /// The result is sorted by base date descending.
    pub fn fill_missing_dates(&self, series: Vec<StatisticsRecord>) -> Vec<StatisticsRecord> {
        let mut ascending = series;
        ascending.sort_by_key(|record| record.base_date);

        let mut filled: Vec<StatisticsRecord> = Vec::with_capacity(ascending.len());
        for record in ascending {
            if let Some(last) = filled.last().cloned() {
                let mut day = last.base_date;
                loop {
                    day = match day.succ_opt() {
                        Some(next) if next < record.base_date => next,
                        _ => break,
                    };
                    let mut synthetic = last.clone();
                    synthetic.base_date = day;
                    filled.push(synthetic);
                }
            }
            filled.push(record);
        }

        filled.reverse();
        filled
    }
}
