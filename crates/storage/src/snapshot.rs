//! On-disk snapshot shape and conversion into engine projects.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use evtrack_core::{Task, TaskTree, WorkingDayPlan};
use evtrack_engine::{DiagnosticSink, Project, TracingSink};

/// Serialized form of one project snapshot.
///
/// A flat task list plus the reporting base date and optional plan
/// bounds. This is the only shape that touches disk; the engine's
/// `Project` is always built from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    /// Project name; also the snapshot directory name
    pub name: String,

    /// The as-of date of this snapshot
    pub base_date: NaiveDate,

    /// Planned project start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,

    /// Planned project end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,

    /// Holiday dates, informational only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub holidays: Vec<NaiveDate>,

    /// Flat task list; hierarchy is rebuilt from `parent_id`
    pub tasks: Vec<Task>,
}

impl ProjectSnapshot {
    /// Capture an engine project back into its serialized form.
    pub fn from_project(project: &Project) -> Self {
        Self {
            name: project.name().to_string(),
            base_date: project.base_date(),
            start_date: project.start_date(),
            end_date: project.end_date(),
            holidays: project.holidays().to_vec(),
            tasks: project.tree().flatten(),
        }
    }

    /// Build an engine project with the default tracing diagnostics.
    pub fn into_project(self) -> Project {
        self.into_project_with(Arc::new(TracingSink))
    }

    /// Build an engine project with an injected diagnostic sink.
    ///
    /// Tasks that carry planned dates but no plot map get a Mon-Fri plan
    /// derived from their date range, so the engine always receives
    /// plot-map-complete tasks.
    pub fn into_project_with(self, diagnostics: Arc<dyn DiagnosticSink>) -> Project {
        let tasks: Vec<Task> = self
            .tasks
            .into_iter()
            .map(|mut task| {
                if task.plan.is_none() {
                    if let (Some(start), Some(end)) = (task.start_date, task.end_date) {
                        task.plan = Some(WorkingDayPlan::weekdays(start, end));
                    }
                }
                task
            })
            .collect();

        Project::with_diagnostics(self.name, TaskTree::build(tasks), self.base_date, diagnostics)
            .with_bounds(self.start_date, self.end_date)
            .with_holidays(self.holidays)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bare_task(id: &str) -> Task {
        let mut task = Task::new(id, id);
        task.workload = Some(10.0);
        task.scheduled_work_days = Some(5.0);
        task.start_date = Some(date(2024, 3, 4));
        task.end_date = Some(date(2024, 3, 8));
        task
    }

    #[test]
    fn missing_plan_is_derived_from_date_range() {
        let snapshot = ProjectSnapshot {
            name: "alpha".into(),
            base_date: date(2024, 3, 6),
            start_date: None,
            end_date: None,
            holidays: Vec::new(),
            tasks: vec![bare_task("T")],
        };
        let project = snapshot.into_project();
        let task = project.tree().get(&"T".into()).unwrap();
        let plan = task.plan.as_ref().unwrap();
        assert_eq!(plan.working_days().count(), 5);
        // With the derived plan the task is fully valid for metrics.
        assert_eq!(task.cumulative_pv(date(2024, 3, 6)), 6.0);
    }

    #[test]
    fn explicit_plan_is_left_alone() {
        let mut task = bare_task("T");
        task.plan = Some(WorkingDayPlan::from_entries([(date(2024, 3, 4), true)]));
        let snapshot = ProjectSnapshot {
            name: "alpha".into(),
            base_date: date(2024, 3, 6),
            start_date: None,
            end_date: None,
            holidays: Vec::new(),
            tasks: vec![task],
        };
        let project = snapshot.into_project();
        let task = project.tree().get(&"T".into()).unwrap();
        assert_eq!(task.plan.as_ref().unwrap().working_days().count(), 1);
    }

    #[test]
    fn json_round_trip() {
        let snapshot = ProjectSnapshot {
            name: "alpha".into(),
            base_date: date(2024, 3, 6),
            start_date: Some(date(2024, 3, 4)),
            end_date: Some(date(2024, 3, 29)),
            holidays: vec![date(2024, 3, 20)],
            tasks: vec![bare_task("T")],
        };
        let json = serde_json::to_string_pretty(&snapshot).unwrap();
        let back: ProjectSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn project_round_trips_through_snapshot() {
        let snapshot = ProjectSnapshot {
            name: "alpha".into(),
            base_date: date(2024, 3, 6),
            start_date: Some(date(2024, 3, 4)),
            end_date: Some(date(2024, 3, 29)),
            holidays: Vec::new(),
            tasks: vec![bare_task("T")],
        };
        let project = snapshot.into_project();
        let captured = ProjectSnapshot::from_project(&project);
        assert_eq!(captured.name, "alpha");
        assert_eq!(captured.base_date, date(2024, 3, 6));
        assert_eq!(captured.tasks.len(), 1);
        // The captured task carries the derived plan.
        assert!(captured.tasks[0].plan.is_some());
    }
}
