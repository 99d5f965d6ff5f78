//! Windowed view statistics.
//!
//! Every page view appends a dated row to `view_events`. The weekly, monthly
//! and annual counters on `boards` are recomputed from those rows on a cron
//! cadence; each run overwrites the window's column for boards that had at
//! least one view inside the window.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::repo::{Repo, RepoResult};

/// View events are dated in Korea Standard Time regardless of the host zone.
pub const VIEW_ZONE: Tz = chrono_tz::Asia::Seoul;

/// Calendar date a view at `now` is recorded under.
pub fn view_date(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&VIEW_ZONE).date_naive()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StatWindow {
    Weekly,
    Monthly,
    Annual,
}

impl StatWindow {
    pub const ALL: [StatWindow; 3] = [StatWindow::Weekly, StatWindow::Monthly, StatWindow::Annual];

    /// Counter column on `boards` owned by this window.
    pub fn column(self) -> &'static str {
        match self {
            StatWindow::Weekly => "weekly_view",
            StatWindow::Monthly => "monthly_view",
            StatWindow::Annual => "annual_view",
        }
    }

    /// sec min hour day-of-month month day-of-week
    pub fn cron_expression(self) -> &'static str {
        match self {
            StatWindow::Weekly => "0 0 0 * * *",
            StatWindow::Monthly => "0 0 1 * * *",
            StatWindow::Annual => "0 0 2 * * Sun",
        }
    }

    pub fn schedule(self) -> Result<Schedule, cron::error::Error> {
        Schedule::from_str(self.cron_expression())
    }

    /// Events strictly after the returned date fall inside the window.
    pub fn cutoff(self, today: NaiveDate) -> NaiveDate {
        let past = match self {
            StatWindow::Weekly => today.checked_sub_days(Days::new(7)),
            StatWindow::Monthly => today.checked_sub_months(Months::new(1)),
            StatWindow::Annual => today.checked_sub_months(Months::new(12)),
        };
        past.unwrap_or(NaiveDate::MIN)
    }
}

impl FromStr for StatWindow {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly" => Ok(StatWindow::Weekly),
            "monthly" => Ok(StatWindow::Monthly),
            "annual" => Ok(StatWindow::Annual),
            other => Err(format!("unknown stats window '{other}'")),
        }
    }
}

/// Recompute one window as of `today`. Returns how many boards were updated.
pub async fn run_rollup(repo: &dyn Repo, window: StatWindow, today: NaiveDate) -> RepoResult<u64> {
    let cutoff = window.cutoff(today);
    let updated = repo.rollup_views(window, cutoff).await?;
    info!(?window, %cutoff, boards = updated, "view rollup complete");
    Ok(updated)
}

/// Owns the periodic rollup loops. Started once from `main`.
pub struct RollupScheduler {
    repo: Arc<dyn Repo>,
    tz: Tz,
}

impl RollupScheduler {
    pub fn new(repo: Arc<dyn Repo>, tz: Tz) -> Self {
        Self { repo, tz }
    }

    /// Spawn one timer loop per window on the current tokio runtime.
    pub fn spawn(self) -> anyhow::Result<Vec<JoinHandle<()>>> {
        let mut handles = Vec::with_capacity(StatWindow::ALL.len());
        for window in StatWindow::ALL {
            let schedule = window.schedule()?;
            let repo = self.repo.clone();
            let tz = self.tz;
            info!(?window, cron = window.cron_expression(), %tz, "scheduling view rollup");
            handles.push(tokio::spawn(run_window(repo, tz, window, schedule)));
        }
        Ok(handles)
    }
}

async fn run_window(repo: Arc<dyn Repo>, tz: Tz, window: StatWindow, schedule: Schedule) {
    loop {
        let Some(next) = schedule.upcoming(tz).next() else {
            warn!(?window, "cron schedule has no upcoming run; stopping");
            return;
        };
        let wait = (next.with_timezone(&Utc) - Utc::now())
            .to_std()
            .unwrap_or_default();
        tokio::time::sleep(wait).await;

        // A failed tick is not retried; the next tick recomputes from scratch.
        if let Err(e) = run_rollup(repo.as_ref(), window, next.date_naive()).await {
            error!(?window, error = %e, "view rollup failed");
        }
    }
}
