use chrono::{DateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::storage::Store;

#[derive(Debug, Clone)]
pub struct Schedule {
    pub job_code: String,
    pub run_at: NaiveTime,
    pub tz: Tz,
}

/// Next local occurrence of `at` strictly after `now`.
pub fn next_run_after<Z: TimeZone>(now: &DateTime<Z>, at: NaiveTime) -> DateTime<Z> {
    let tz = now.timezone();
    let mut date = now.date_naive();
    loop {
        if let Some(candidate) = tz.from_local_datetime(&date.and_time(at)).earliest()
            && candidate > *now
        {
            return candidate;
        }
        date += TimeDelta::days(1);
    }
}

/// Runs the settlement every day at `schedule.run_at` until `shutdown` fires.
pub fn spawn(store: Store, schedule: Schedule, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now().with_timezone(&schedule.tz);
            let next = next_run_after(&now, schedule.run_at);
            let wait = (next.clone() - now).to_std().unwrap_or_default();
            info!(job_code = %schedule.job_code, next = %next, "settlement scheduled");

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("settlement scheduler stopped");
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            let now = Utc::now().with_timezone(&schedule.tz);
            match store.run_settlement(&schedule.job_code, now).await {
                Ok(report) if report.skipped.is_empty() => {
                    info!(date = %report.date, status = ?report.status, "scheduled settlement finished");
                }
                Ok(report) => {
                    warn!(
                        date = %report.date,
                        skipped = report.skipped.len(),
                        "scheduled settlement finished with skipped entities"
                    );
                }
                Err(e) => {
                    // the next trigger is tomorrow; today needs a manual `settle` or
                    // POST /api/v1/settlement/run before midnight
                    error!(job_code = %schedule.job_code, error = %e, "scheduled settlement failed");
                }
            }
        }
    })
}
