//! EVTrack CLI - earned-value tracking over stored project snapshots.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use evtrack_engine::{ForecastOptions, Project, SnapshotDiffEngine};
use evtrack_storage::SnapshotStore;

#[derive(Parser)]
#[command(name = "evtrack")]
#[command(about = "Earned-value tracking for project snapshots", long_about = None)]
struct Cli {
    /// Snapshot directory
    #[arg(long, default_value = ".evtrack", global = true)]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show earned-value statistics for a snapshot
    Stats {
        /// Project name
        project: String,
        /// Snapshot base date (latest if omitted)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Restrict to tasks whose name or path contains this
        #[arg(long)]
        filter: Option<String>,
        /// Break the statistics down per assignee
        #[arg(long)]
        by_assignee: bool,
    },
    /// List tasks excluded from metrics, with reasons
    Excluded {
        /// Project name
        project: String,
        /// Snapshot base date (latest if omitted)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List tasks past their planned end date
    Delayed {
        /// Project name
        project: String,
        /// Snapshot base date (latest if omitted)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Only show tasks delayed by strictly more than this many days
        #[arg(long, default_value = "0")]
        min_days: i64,
    },
    /// Project a completion date
    Forecast {
        /// Project name
        project: String,
        /// Snapshot base date (latest if omitted)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Restrict to tasks whose name or path contains this
        #[arg(long)]
        filter: Option<String>,
        /// Pin the SPI instead of using the computed one
        #[arg(long)]
        spi: Option<f64>,
        /// Pin the daily PV instead of the recent average
        #[arg(long)]
        daily_pv: Option<f64>,
        /// Working days sampled for the recent-daily-PV fallback
        #[arg(long)]
        lookback: Option<usize>,
        /// Cap on the forecast walk, in working days
        #[arg(long)]
        max_days: Option<u32>,
    },
    /// Diff the two most recent snapshots
    Diff {
        /// Project name
        project: String,
        /// Break the aggregate down per assignee
        #[arg(long)]
        by_assignee: bool,
    },
    /// Average SPI across all stored snapshots
    RecentSpi {
        /// Project name
        project: String,
        /// Restrict to tasks whose name or path contains this
        #[arg(long)]
        filter: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let store = SnapshotStore::new(&cli.dir)
        .with_context(|| format!("opening snapshot store at {}", cli.dir.display()))?;
    tracing::debug!(dir = %cli.dir.display(), "snapshot store opened");

    match cli.command {
        Commands::Stats {
            project,
            date,
            filter,
            by_assignee,
        } => {
            let project = load_project(&store, &project, date)?;
            println!("Project {} @ {}", project.name(), project.base_date());
            if by_assignee {
                for (assignee, stats) in project.statistics_by_assignee(filter.as_deref()) {
                    println!("[{}]", assignee.as_deref().unwrap_or("unassigned"));
                    print_statistics(&stats);
                }
            } else {
                print_statistics(&project.statistics_for(filter.as_deref()));
            }
        }
        Commands::Excluded { project, date } => {
            let project = load_project(&store, &project, date)?;
            let excluded = project.excluded_tasks();
            println!("Excluded tasks ({})", excluded.len());
            for (_, reason) in excluded {
                println!("  {reason}");
            }
        }
        Commands::Delayed {
            project,
            date,
            min_days,
        } => {
            let project = load_project(&store, &project, date)?;
            let delayed = project.delayed_tasks(min_days);
            println!("Delayed tasks ({})", delayed.len());
            for entry in delayed {
                println!(
                    "  {} | {} | {} days late",
                    entry.task.id,
                    project
                        .full_task_name(&entry.task.id)
                        .unwrap_or_else(|| entry.task.name.clone()),
                    entry.delay_days,
                );
            }
        }
        Commands::Forecast {
            project,
            date,
            filter,
            spi,
            daily_pv,
            lookback,
            max_days,
        } => {
            let project = load_project(&store, &project, date)?;
            let options = ForecastOptions {
                filter,
                spi_override: spi,
                daily_pv_override: daily_pv,
                lookback_days: lookback,
                max_forecast_days: max_days,
            };
            match project.completion_forecast(&options) {
                Some(forecast) => {
                    println!("Forecast for {} @ {}", project.name(), project.base_date());
                    println!("  Completion date:  {}", forecast.forecast_date);
                    println!("  Used SPI:         {:.2}", forecast.used_spi);
                    println!("  Used daily PV:    {:.2}", forecast.used_daily_pv);
                    println!("  Daily burn rate:  {:.2}", forecast.daily_burn_rate);
                    println!("  Remaining work:   {:.2}", forecast.remaining_work);
                    println!("  ETC':             {:.2}", forecast.etc_prime);
                    println!(
                        "  Confidence:       {:?} ({})",
                        forecast.confidence, forecast.confidence_reason
                    );
                }
                None => println!("No forecast: inputs unresolvable or no convergence"),
            }
        }
        Commands::Diff {
            project,
            by_assignee,
        } => {
            let dates = store.list(&project)?;
            if dates.len() < 2 {
                anyhow::bail!(
                    "need at least two snapshots of '{project}' to diff, found {}",
                    dates.len()
                );
            }
            let previous = store
                .load(&project, dates[dates.len() - 2])?
                .into_project();
            let current = store
                .load(&project, dates[dates.len() - 1])?
                .into_project();

            let engine = SnapshotDiffEngine::new();
            let diffs = engine.diff_tasks(&current, &previous);
            println!(
                "Diff {} -> {} ({} tasks)",
                previous.base_date(),
                current.base_date(),
                diffs.len()
            );
            for diff in diffs.iter().filter(|diff| diff.has_diff) {
                println!(
                    "  {} | {} | {:?} | progress {} | pv {} | ev {}",
                    diff.id,
                    diff.name,
                    diff.kind,
                    fmt_opt(diff.progress_delta),
                    fmt_opt(diff.pv_delta),
                    fmt_opt(diff.ev_delta),
                );
            }
            if by_assignee {
                for group in engine.aggregate_assignee_diffs(&diffs) {
                    println!(
                        "[{}] modified {} added {} removed {} | ev delta {:.2}",
                        group.assignee.as_deref().unwrap_or("unassigned"),
                        group.diff.modified_count,
                        group.diff.added_count,
                        group.diff.removed_count,
                        group.diff.ev_delta,
                    );
                }
            } else {
                let aggregate = engine.aggregate_project_diff(&diffs);
                println!(
                    "Total: modified {} added {} removed {} | progress delta {:.2} | pv delta {:.2} | ev delta {:.2}",
                    aggregate.modified_count,
                    aggregate.added_count,
                    aggregate.removed_count,
                    aggregate.progress_delta,
                    aggregate.pv_delta,
                    aggregate.ev_delta,
                );
            }
        }
        Commands::RecentSpi { project, filter } => {
            let snapshots = store.load_all(&project)?;
            let projects: Vec<Project> = snapshots
                .into_iter()
                .map(|snapshot| snapshot.into_project())
                .collect();
            let refs: Vec<&Project> = projects.iter().collect();
            let spi = SnapshotDiffEngine::new().recent_spi(&refs, filter.as_deref());
            match spi {
                Some(spi) => println!("Recent SPI over {} snapshots: {spi:.2}", refs.len()),
                None => println!("Recent SPI undefined (no snapshots with defined SPI)"),
            }
        }
    }

    Ok(())
}

fn load_project(
    store: &SnapshotStore,
    project: &str,
    date: Option<NaiveDate>,
) -> Result<Project> {
    let snapshot = match date {
        Some(date) => store
            .load(project, date)
            .with_context(|| format!("loading snapshot of '{project}' at {date}"))?,
        None => store
            .latest(project)
            .with_context(|| format!("loading latest snapshot of '{project}'"))?,
    };
    Ok(snapshot.into_project())
}

fn print_statistics(stats: &evtrack_engine::Statistics) {
    println!("  Tasks:           {}", stats.task_count);
    println!("  BAC:             {:.2}", stats.total_workload);
    println!("  PV (cumulative): {:.2}", stats.total_pv);
    println!("  EV:              {:.2}", stats.total_ev);
    println!("  SPI:             {}", fmt_opt(stats.spi));
    println!("  ETC':            {}", fmt_opt(stats.etc_prime));
    println!(
        "  Delayed:         {} (avg {}, max {})",
        stats.delayed_task_count,
        fmt_opt(stats.average_delay_days),
        stats
            .max_delay_days
            .map(|days| days.to_string())
            .unwrap_or_else(|| "-".to_string()),
    );
}

fn fmt_opt(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.2}"))
        .unwrap_or_else(|| "-".to_string())
}
