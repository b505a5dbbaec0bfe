//! Project snapshots - statistic rollups, filtering, and completion forecasting.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use evtrack_core::{is_weekday, next_working_day, weekdays_between, Task, TaskId, TaskTree};

use crate::diagnostics::{DiagnosticSink, TracingSink};

/// Separator used when joining ancestor names into a path.
pub const PATH_SEPARATOR: &str = "/";

/// Working days sampled by recent-daily-PV when no lookback is given.
pub const DEFAULT_LOOKBACK_DAYS: usize = 14;

/// Bound on the forecast day-walk, in working days.
pub const DEFAULT_MAX_FORECAST_DAYS: u32 = 730;

/// Aggregate earned-value statistics for one scope.
///
/// A scope is the whole project, one assignee, or a filtered task subset;
/// only leaf tasks ever contribute to the sums. Recomputed on every call,
/// never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Number of leaf tasks in scope
    pub task_count: usize,

    /// Budget at completion: summed planned workload
    pub total_workload: f64,

    /// Summed cumulative planned value as of the base date
    pub total_pv: f64,

    /// Summed earned value
    pub total_ev: f64,

    /// Schedule performance index: EV / PV.
    ///
    /// `Some(0.0)` is a valid value when PV > 0 and no value was earned;
    /// `None` only when PV is zero.
    pub spi: Option<f64>,

    /// Estimate to complete: (BAC - EV) / SPI.
    ///
    /// Infinite when SPI is zero.
    pub etc_prime: Option<f64>,

    /// Leaf tasks past their planned end
    pub delayed_task_count: usize,

    /// Mean delay over delayed tasks, in days
    pub average_delay_days: Option<f64>,

    /// Largest delay in scope, in days
    pub max_delay_days: Option<i64>,
}

/// A leaf task past its planned end date, with the measured delay.
#[derive(Debug, Clone)]
pub struct DelayedTask<'a> {
    /// The delayed task
    pub task: &'a Task,

    /// Whole days between planned end and the base date
    pub delay_days: i64,
}

/// How much trust to place in a completion forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// An override pinned the inputs
    High,
    /// Computed SPI sits in the normal band
    Medium,
    /// Computed SPI is extreme or unavailable
    Low,
}

/// Options for [`Project::completion_forecast`].
#[derive(Debug, Clone, Default)]
pub struct ForecastOptions {
    /// Restrict the forecast to tasks matching this filter
    pub filter: Option<String>,

    /// Use this SPI instead of the computed one (ignored unless > 0)
    pub spi_override: Option<f64>,

    /// Use this daily PV instead of the recent average (ignored if zero)
    pub daily_pv_override: Option<f64>,

    /// Working days sampled for the recent-daily-PV fallback
    pub lookback_days: Option<usize>,

    /// Cap on the forecast day-walk; `None` means the default of 730
    pub max_forecast_days: Option<u32>,
}

/// A resolved completion forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionForecast {
    /// SPI the projection used
    pub used_spi: f64,

    /// Daily planned value the projection used
    pub used_daily_pv: f64,

    /// Effective daily progress: daily PV x SPI
    pub daily_burn_rate: f64,

    /// Unearned budget: max(BAC - EV, 0)
    pub remaining_work: f64,

    /// Estimate to complete: remaining work / SPI
    pub etc_prime: f64,

    /// Projected completion date
    pub forecast_date: NaiveDate,

    /// Trust level for this projection
    pub confidence: Confidence,

    /// Which branch produced the confidence level
    pub confidence_reason: String,
}

/// An immutable snapshot of a project plan as of one reporting date.
///
/// Owns the task forest and the base date all statistics and forecasts
/// are computed against. Construction emits one diagnostic per leaf that
/// cannot participate in metrics; afterwards every operation is a pure
/// read.
#[derive(Clone)]
pub struct Project {
    name: String,
    tree: TaskTree,
    base_date: NaiveDate,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    holidays: Vec<NaiveDate>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.name)
            .field("base_date", &self.base_date)
            .field("tasks", &self.tree.len())
            .finish()
    }
}

impl Project {
    /// Create a project snapshot with the default tracing diagnostics.
    pub fn new(name: impl Into<String>, tree: TaskTree, base_date: NaiveDate) -> Self {
        Self::with_diagnostics(name, tree, base_date, Arc::new(TracingSink))
    }

    /// Create a project snapshot with an injected diagnostic sink.
    pub fn with_diagnostics(
        name: impl Into<String>,
        tree: TaskTree,
        base_date: NaiveDate,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let project = Self {
            name: name.into(),
            tree,
            base_date,
            start_date: None,
            end_date: None,
            holidays: Vec::new(),
            diagnostics,
        };
        project.report_incomplete_leaves();
        project
    }

    /// Attach planned project bounds.
    pub fn with_bounds(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    /// Attach holiday dates.
    ///
    /// Informational only: forecasting walks a plain Mon-Fri calendar and
    /// does not consult these.
    pub fn with_holidays(mut self, holidays: Vec<NaiveDate>) -> Self {
        self.holidays = holidays;
        self
    }

    /// Project name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The as-of date for all statistics and forecasts.
    pub fn base_date(&self) -> NaiveDate {
        self.base_date
    }

    /// Planned project start, if known.
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    /// Planned project end, if known.
    pub fn end_date(&self) -> Option<NaiveDate> {
        self.end_date
    }

    /// Holiday dates carried with the snapshot.
    pub fn holidays(&self) -> &[NaiveDate] {
        &self.holidays
    }

    /// The underlying task forest.
    pub fn tree(&self) -> &TaskTree {
        &self.tree
    }

    /// Warn once per leaf that cannot produce metrics.
    fn report_incomplete_leaves(&self) {
        for leaf in self.tree.leaves() {
            if let Err(error) = leaf.validity() {
                self.diagnostics.warn(&error.to_string());
            } else if leaf.workload_per_day().is_none() {
                self.diagnostics.warn(&format!(
                    "task {}: workload or scheduled work days missing, no daily planned value",
                    leaf.id
                ));
            }
        }
    }

    /// Full hierarchical name of a task: ancestor names joined by `/`.
    pub fn full_task_name(&self, id: &TaskId) -> Option<String> {
        let path = self.tree.path_to(id)?;
        Some(
            path.iter()
                .map(|task| task.name.as_str())
                .collect::<Vec<_>>()
                .join(PATH_SEPARATOR),
        )
    }

    /// Tasks whose own name or full path name contains `filter`.
    ///
    /// Case-sensitive substring match; an empty or whitespace-only filter
    /// returns every task, leaves and grouping nodes alike.
    pub fn filter_tasks(&self, filter: Option<&str>) -> Vec<&Task> {
        let Some(needle) = filter.map(str::trim).filter(|f| !f.is_empty()) else {
            return self.tree.tasks().collect();
        };
        self.tree
            .tasks()
            .filter(|task| {
                task.name.contains(needle)
                    || self
                        .full_task_name(&task.id)
                        .is_some_and(|path| path.contains(needle))
            })
            .collect()
    }

    /// Leaf tasks that fail the validity check, with their reasons.
    ///
    /// Grouping nodes are never excluded; their own field state is not
    /// consulted because their metrics are not used directly.
    pub fn excluded_tasks(&self) -> Vec<(&Task, String)> {
        self.tree
            .leaves()
            .filter_map(|leaf| {
                leaf.validity()
                    .err()
                    .map(|error| (leaf, error.to_string()))
            })
            .collect()
    }

    /// Leaf tasks delayed by strictly more than `min_days` at the base
    /// date, sorted by descending delay.
    pub fn delayed_tasks(&self, min_days: i64) -> Vec<DelayedTask<'_>> {
        let leaves: Vec<&Task> = self.tree.leaves().collect();
        self.delayed_in(&leaves, min_days)
    }

    fn delayed_in<'a>(&self, leaves: &[&'a Task], min_days: i64) -> Vec<DelayedTask<'a>> {
        let mut delayed: Vec<DelayedTask<'a>> = leaves
            .iter()
            .copied()
            .filter(|task| !task.is_finished())
            .filter_map(|task| {
                let end = task.end_date?;
                let delay_days = (self.base_date - end).num_days();
                (delay_days > min_days).then_some(DelayedTask {
                    task,
                    delay_days,
                })
            })
            .collect();
        delayed.sort_by(|a, b| b.delay_days.cmp(&a.delay_days));
        delayed
    }

    /// Statistics over the whole project.
    pub fn statistics(&self) -> Statistics {
        let tasks: Vec<&Task> = self.tree.tasks().collect();
        self.statistics_of(&tasks)
    }

    /// Statistics over tasks matching a substring filter.
    pub fn statistics_for(&self, filter: Option<&str>) -> Statistics {
        let tasks = self.filter_tasks(filter);
        self.statistics_of(&tasks)
    }

    /// Statistics over a pre-filtered task list.
    ///
    /// The aggregate is always restricted to the leaf tasks of the given
    /// list; grouping nodes contribute nothing.
    pub fn statistics_of(&self, tasks: &[&Task]) -> Statistics {
        let leaves: Vec<&Task> = tasks.iter().copied().filter(|task| task.is_leaf).collect();

        let total_workload: f64 = leaves.iter().filter_map(|task| task.workload).sum();
        let total_pv: f64 = leaves
            .iter()
            .map(|task| task.cumulative_pv(self.base_date))
            .sum();
        let total_ev: f64 = leaves.iter().filter_map(|task| task.ev).sum();

        let spi = if total_pv > 0.0 && total_pv.is_finite() {
            let ratio = total_ev / total_pv;
            ratio.is_finite().then_some(ratio)
        } else {
            None
        };
        let etc_prime = spi.map(|spi| (total_workload - total_ev) / spi);

        let delayed = self.delayed_in(&leaves, 0);
        let delayed_task_count = delayed.len();
        let average_delay_days = (!delayed.is_empty()).then(|| {
            delayed.iter().map(|d| d.delay_days as f64).sum::<f64>() / delayed.len() as f64
        });
        let max_delay_days = delayed.iter().map(|d| d.delay_days).max();

        Statistics {
            task_count: leaves.len(),
            total_workload,
            total_pv,
            total_ev,
            spi,
            etc_prime,
            delayed_task_count,
            average_delay_days,
            max_delay_days,
        }
    }

    /// Per-assignee statistics, with an explicit unassigned bucket.
    pub fn statistics_by_assignee(
        &self,
        filter: Option<&str>,
    ) -> BTreeMap<Option<String>, Statistics> {
        let mut groups: BTreeMap<Option<String>, Vec<&Task>> = BTreeMap::new();
        for task in self.filter_tasks(filter) {
            if task.is_leaf {
                groups.entry(task.assignee.clone()).or_default().push(task);
            }
        }
        groups
            .into_iter()
            .map(|(assignee, tasks)| (assignee, self.statistics_of(&tasks)))
            .collect()
    }

    /// Weekdays between the planned project bounds, inclusive.
    ///
    /// Zero when either bound is missing.
    pub fn planned_work_days(&self) -> u32 {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => weekdays_between(start, end),
            _ => 0,
        }
    }

    /// Average daily planned value over the most recent working days.
    ///
    /// Sums `pv_on` across all leaves for each of the last
    /// `lookback_days` weekdays up to the base date, then averages over
    /// the days sampled. Used as the fallback daily burn rate when no
    /// override is supplied.
    pub fn recent_daily_pv(&self, lookback_days: Option<usize>) -> Option<f64> {
        let lookback = lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS);
        if lookback == 0 {
            return None;
        }

        let mut total = 0.0;
        let mut sampled = 0usize;
        let mut day = self.base_date;
        loop {
            if is_weekday(day) {
                total += self
                    .tree
                    .leaves()
                    .map(|leaf| leaf.pv_on(day).unwrap_or(0.0))
                    .sum::<f64>();
                sampled += 1;
                if sampled == lookback {
                    break;
                }
            }
            day = match day.pred_opt() {
                Some(previous) => previous,
                None => break,
            };
        }

        (sampled > 0).then(|| total / sampled as f64)
    }

    /// Project a completion date for the (optionally filtered) scope.
    ///
    /// Resolution order: an explicit positive SPI override beats the
    /// computed cumulative SPI; an explicit non-zero daily-PV override
    /// beats the recent-daily-PV average. Any unresolvable input, a
    /// non-positive SPI, a zero daily PV, or failure to converge within
    /// the working-day cap yields no forecast at all - never a partial
    /// one.
    pub fn completion_forecast(&self, options: &ForecastOptions) -> Option<CompletionForecast> {
        let scope = self.filter_tasks(options.filter.as_deref());
        let stats = self.statistics_of(&scope);

        let used_spi = options.spi_override.filter(|spi| *spi > 0.0).or(stats.spi)?;
        if used_spi <= 0.0 {
            return None;
        }

        // A zero override means "unresolvable", not "use literal zero".
        let used_daily_pv = options
            .daily_pv_override
            .filter(|pv| *pv != 0.0)
            .or_else(|| self.recent_daily_pv(options.lookback_days))?;
        if used_daily_pv == 0.0 {
            return None;
        }

        let daily_burn_rate = used_daily_pv * used_spi;
        let remaining_work = (stats.total_workload - stats.total_ev).max(0.0);
        let etc_prime = remaining_work / used_spi;

        let (confidence, confidence_reason) = if options.spi_override.is_some()
            || options.daily_pv_override.is_some()
        {
            let mut pinned = Vec::new();
            if options.spi_override.is_some() {
                pinned.push("SPI");
            }
            if options.daily_pv_override.is_some() {
                pinned.push("daily PV");
            }
            (
                Confidence::High,
                format!("{} pinned by override", pinned.join(" and ")),
            )
        } else {
            match stats.spi {
                Some(spi) if (0.8..=1.2).contains(&spi) => (
                    Confidence::Medium,
                    format!("cumulative SPI {spi:.2} within the normal band"),
                ),
                Some(spi) => (
                    Confidence::Low,
                    format!("cumulative SPI {spi:.2} outside [0.80, 1.20]"),
                ),
                None => (
                    Confidence::Low,
                    "cumulative SPI unavailable".to_string(),
                ),
            }
        };

        let forecast_date = if remaining_work == 0.0 {
            self.base_date
        } else {
            let max_days = options
                .max_forecast_days
                .unwrap_or(DEFAULT_MAX_FORECAST_DAYS);
            let mut accumulated = 0.0;
            let mut day = self.base_date;
            let mut steps = 0u32;
            loop {
                if steps >= max_days {
                    // No convergence within the cap.
                    return None;
                }
                day = next_working_day(day.succ_opt()?);
                steps += 1;
                accumulated += daily_burn_rate;
                if accumulated >= remaining_work {
                    break day;
                }
            }
        };

        Some(CompletionForecast {
            used_spi,
            used_daily_pv,
            daily_burn_rate,
            remaining_work,
            etc_prime,
            forecast_date,
            confidence,
            confidence_reason,
        })
    }
}
