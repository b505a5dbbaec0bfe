//! Task model - a single work item and its earned-value metrics.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::WorkingDayPlan;
use crate::id::TaskId;

/// Why a task cannot participate in metric computation.
///
/// Each reason names the offending task so the message can be surfaced
/// verbatim by diagnostics and exclusion reports.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidityError {
    /// Planned start or end date is missing.
    #[error("task {id}: planned start or end date missing")]
    MissingSchedule {
        /// The offending task.
        id: TaskId,
    },

    /// No working-day plot map was supplied.
    #[error("task {id}: no working-day plan")]
    MissingPlan {
        /// The offending task.
        id: TaskId,
    },

    /// Scheduled work days is absent, zero, or negative.
    #[error("task {id}: scheduled work days must be a positive number")]
    NonPositiveWorkDays {
        /// The offending task.
        id: TaskId,
    },
}

/// A single work item in a project plan, leaf or grouping node.
///
/// Tasks are immutable value objects; anything that changes a value
/// produces a new Task. All metric methods take `&self` and degrade to
/// `None` / `0.0` on missing data rather than failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier within a project snapshot
    pub id: TaskId,

    /// Owning parent task, if any
    pub parent_id: Option<TaskId>,

    /// Task name
    pub name: String,

    /// Person responsible, if assigned
    pub assignee: Option<String>,

    /// Depth in the tree (root = 1), recomputed on flatten
    pub level: u32,

    /// True iff the task has no children
    pub is_leaf: bool,

    /// Planned effort
    pub workload: Option<f64>,

    /// Number of days the effort is spread over
    pub scheduled_work_days: Option<f64>,

    /// Planned start date
    pub start_date: Option<NaiveDate>,

    /// Planned end date
    pub end_date: Option<NaiveDate>,

    /// Actual start date
    pub actual_start_date: Option<NaiveDate>,

    /// Actual end date
    pub actual_end_date: Option<NaiveDate>,

    /// Completion ratio in [0, 1]
    pub progress_rate: Option<f64>,

    /// Externally supplied planned value
    pub pv: Option<f64>,

    /// Externally supplied earned value
    pub ev: Option<f64>,

    /// Plot map of scheduled working days
    pub plan: Option<WorkingDayPlan>,
}

impl Task {
    /// Create a task with the given id and name and no other data.
    pub fn new(id: impl Into<TaskId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            name: name.into(),
            assignee: None,
            level: 1,
            is_leaf: true,
            workload: None,
            scheduled_work_days: None,
            start_date: None,
            end_date: None,
            actual_start_date: None,
            actual_end_date: None,
            progress_rate: None,
            pv: None,
            ev: None,
            plan: None,
        }
    }

    /// Check whether the task carries enough data for metric computation.
    ///
    /// Valid means: planned start and end dates present, a plot map
    /// present, and a positive scheduled-work-days count.
    pub fn validity(&self) -> Result<(), ValidityError> {
        if self.start_date.is_none() || self.end_date.is_none() {
            return Err(ValidityError::MissingSchedule {
                id: self.id.clone(),
            });
        }
        if self.plan.is_none() {
            return Err(ValidityError::MissingPlan {
                id: self.id.clone(),
            });
        }
        match self.scheduled_work_days {
            Some(days) if days > 0.0 => Ok(()),
            _ => Err(ValidityError::NonPositiveWorkDays {
                id: self.id.clone(),
            }),
        }
    }

    /// Whether the task reports full progress.
    ///
    /// Missing progress counts as unfinished.
    pub fn is_finished(&self) -> bool {
        matches!(self.progress_rate, Some(rate) if rate >= 1.0)
    }

    /// Planned value accrued per scheduled working day.
    pub fn workload_per_day(&self) -> Option<f64> {
        match (self.workload, self.scheduled_work_days) {
            (Some(workload), Some(days))
                if workload.is_finite() && days.is_finite() && days != 0.0 =>
            {
                Some(workload / days)
            }
            _ => None,
        }
    }

    /// Planned value accrued on exactly `date`.
    ///
    /// `None` if the task is invalid. A date outside the plotted working
    /// days, including weekends that were never plotted, accrues zero.
    pub fn pv_on(&self, date: NaiveDate) -> Option<f64> {
        self.validity().ok()?;
        let plan = self.plan.as_ref()?;
        let (Some(start), Some(end)) = (self.start_date, self.end_date) else {
            return None;
        };
        if date < start || date > end || !plan.is_working(date) {
            return Some(0.0);
        }
        self.workload_per_day()
    }

    /// Cumulative planned value through `date` inclusive.
    ///
    /// Degrades to `0.0` rather than `None` when the task is invalid or
    /// has no workload, because this value participates in project sums.
    pub fn cumulative_pv(&self, date: NaiveDate) -> f64 {
        if self.validity().is_err() {
            return 0.0;
        }
        let Some(plan) = self.plan.as_ref() else {
            return 0.0;
        };
        plan.working_days()
            .filter(|day| *day <= date)
            .map(|day| self.pv_on(day).unwrap_or(0.0))
            .sum()
    }

    /// Schedule performance index as of `date`: EV / cumulative PV.
    ///
    /// `None` when EV is missing or cumulative PV is zero.
    pub fn spi(&self, date: NaiveDate) -> Option<f64> {
        let ev = self.ev?;
        let pv = self.cumulative_pv(date);
        if pv == 0.0 {
            return None;
        }
        Some(ev / pv)
    }

    /// Schedule variance as of `date`: EV - cumulative PV.
    pub fn schedule_variance(&self, date: NaiveDate) -> Option<f64> {
        let ev = self.ev?;
        Some(ev - self.cumulative_pv(date))
    }

    /// Plotted working days remaining in `[date, end_date]`.
    ///
    /// `None` if the task is invalid; zero once `date` passes the end.
    pub fn remaining_work_days(&self, date: NaiveDate) -> Option<u32> {
        self.validity().ok()?;
        let plan = self.plan.as_ref()?;
        let end = self.end_date?;
        if date > end {
            return Some(0);
        }
        let remaining = plan
            .working_days()
            .filter(|day| *day >= date && *day <= end)
            .count();
        Some(remaining as u32)
    }

    /// Daily burn rate required from `date` to finish on schedule.
    ///
    /// Comparable against [`Task::workload_per_day`] to classify a task as
    /// behind, ahead, or on schedule. Zero when already finished or no
    /// working days remain; `None` when workload or remaining days are
    /// unknown.
    pub fn required_daily_rate(&self, date: NaiveDate) -> Option<f64> {
        let workload = self.workload?;
        let remaining_days = self.remaining_work_days(date)?;
        if self.is_finished() || remaining_days == 0 {
            return Some(0.0);
        }
        let remaining_work = workload * (1.0 - self.progress_rate.unwrap_or(0.0));
        Some(remaining_work / f64::from(remaining_days))
    }

    /// Whether the task's planned end has been reached without finishing.
    pub fn is_overdue_at(&self, date: NaiveDate) -> bool {
        match self.end_date {
            Some(end) => end <= date && !self.is_finished(),
            None => false,
        }
    }
}
