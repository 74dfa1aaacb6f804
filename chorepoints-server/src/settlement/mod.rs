//! Nightly settlement.
//!
//! One run per `(job_code, local date)`:
//!
//! 1. pending claims are auto-approved,
//! 2. every child is charged the incomplete chores penalty and then gets the
//!    daily bonus (one transaction per child),
//! 3. the day's chore points are ranked and the podium is awarded,
//! 4. resolved claims are cleared and daily chores reopened, and the run is
//!    recorded in the same transaction.
//!
//! Steps 2 and 3 leave per-step markers in the run log so a same-day retry
//! after a failure does not charge anybody twice.

pub mod bonus;
pub mod claims;
mod error;
pub mod leaderboard;
pub mod penalty;
pub mod reset;
pub mod run_log;
pub mod scheduler;
pub mod snapshot;

use chorepoints_shared::api::{SettlementReportDto, SettlementStatus, SkippedEntityDto};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone};
use diesel::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tracing::{debug, error, info, warn};

pub use claims::ClaimOutcome;
pub use error::SettlementError;
pub use run_log::RunLog;
pub use snapshot::SettlementSettings;

use crate::storage::models::Child;
use crate::storage::schema::children;
use penalty::CohortTotals;
use run_log::step_code;

pub const DEFAULT_JOB_CODE: &str = "chore_app.nightly_action";

/// Decimal places kept for points and money produced by settlement arithmetic.
pub const POINTS_SCALE: u32 = 2;

pub(crate) fn round_points(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(POINTS_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    AlreadyRun,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedEntity {
    pub step: &'static str,
    pub entity: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementReport {
    pub job_code: String,
    pub date: NaiveDate,
    pub status: RunStatus,
    pub claims_approved: usize,
    pub children_settled: usize,
    pub leaderboard: Option<String>,
    pub skipped: Vec<SkippedEntity>,
}

impl SettlementReport {
    fn new(job_code: &str, date: NaiveDate) -> Self {
        Self {
            job_code: job_code.to_string(),
            date,
            status: RunStatus::Completed,
            claims_approved: 0,
            children_settled: 0,
            leaderboard: None,
            skipped: Vec::new(),
        }
    }

    fn record_skip(&mut self, step: &'static str, entity: &str, err: &SettlementError) {
        warn!(step, entity, kind = err.kind(), error = %err, "settlement: skipping entity");
        self.skipped.push(SkippedEntity {
            step,
            entity: entity.to_string(),
            reason: err.to_string(),
        });
    }

    /// Recoverable errors skip the entity, the rest abort the run.
    fn triage<T>(
        &mut self,
        step: &'static str,
        entity: &str,
        result: Result<T, SettlementError>,
    ) -> Result<Option<T>, SettlementError> {
        match result {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_recoverable() => {
                self.record_skip(step, entity, &e);
                Ok(None)
            }
            Err(e) => {
                error!(step, entity, kind = e.kind(), error = %e, "settlement: aborting run");
                Err(e)
            }
        }
    }
}

impl From<SettlementReport> for SettlementReportDto {
    fn from(r: SettlementReport) -> Self {
        SettlementReportDto {
            job_code: r.job_code,
            date: r.date.to_string(),
            status: match r.status {
                RunStatus::Completed => SettlementStatus::Completed,
                RunStatus::AlreadyRun => SettlementStatus::AlreadyRun,
            },
            claims_approved: r.claims_approved,
            children_settled: r.children_settled,
            leaderboard: r.leaderboard,
            skipped: r
                .skipped
                .into_iter()
                .map(|s| SkippedEntityDto {
                    step: s.step.to_string(),
                    entity: s.entity,
                    reason: s.reason,
                })
                .collect(),
        }
    }
}

/// UTC bounds `[start, end)` of `date` in `tz`.
pub fn day_bounds<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    (
        local_day_start(tz, date),
        local_day_start(tz, date + TimeDelta::days(1)),
    )
}

fn local_day_start<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> NaiveDateTime {
    let midnight = date.and_time(NaiveTime::MIN);
    // midnight may fall into a DST gap
    (0..3)
        .find_map(|h| {
            tz.from_local_datetime(&(midnight + TimeDelta::hours(h)))
                .earliest()
        })
        .map(|t| t.naive_utc())
        .unwrap_or(midnight)
}

/// Runs the nightly settlement for the local date of `now`.
///
/// Returns [`RunStatus::AlreadyRun`] without touching anything when the run
/// log already holds `(job_code, date)`.
pub fn settle<Tz: TimeZone>(
    conn: &mut SqliteConnection,
    job_code: &str,
    now: DateTime<Tz>,
) -> Result<SettlementReport, SettlementError> {
    let today = now.date_naive();
    let at = now.naive_utc();
    let mut report = SettlementReport::new(job_code, today);

    if conn.has_run(job_code, today)? {
        info!(job_code, %today, "settlement already completed today");
        report.status = RunStatus::AlreadyRun;
        return Ok(report);
    }

    let settings = SettlementSettings::load(conn).inspect_err(|e| {
        error!(job_code, %today, error = %e, "settlement: cannot load settings");
    })?;
    info!(job_code, %today, "settlement started");

    resolve_pending_claims(conn, &settings, at, &mut report)?;
    settle_children(conn, job_code, today, &settings, at, &mut report)?;

    let leaderboard_marker = step_code(job_code, "leaderboard", None);
    if conn.has_run(&leaderboard_marker, today)? {
        debug!(job_code, "leaderboard already applied today");
    } else {
        let (from, to) = day_bounds(&now.timezone(), today);
        let ranked = conn.immediate_transaction(|conn| {
            let text = leaderboard::apply_leaderboard(conn, &settings, from, to, at)?;
            conn.mark_run(&leaderboard_marker, today, at)?;
            Ok::<_, SettlementError>(text)
        });
        report.leaderboard = report.triage("leaderboard", "day", ranked)?.flatten();
    }

    conn.immediate_transaction(|conn| {
        reset::reset_chores(conn)?;
        conn.mark_run(job_code, today, at)?;
        Ok::<_, SettlementError>(())
    })?;

    info!(
        job_code,
        %today,
        claims_approved = report.claims_approved,
        children_settled = report.children_settled,
        skipped = report.skipped.len(),
        "settlement completed"
    );
    Ok(report)
}

fn resolve_pending_claims(
    conn: &mut SqliteConnection,
    settings: &SettlementSettings,
    at: NaiveDateTime,
    report: &mut SettlementReport,
) -> Result<(), SettlementError> {
    let penalty = settings.auto_approve_penalty();
    for claim_id in claims::pending_claim_ids(conn)? {
        let outcome = claims::resolve_claim(conn, claim_id, penalty, None, at);
        if let Some(ClaimOutcome::Approved { .. }) =
            report.triage("claims", &claim_id.to_string(), outcome)?
        {
            report.claims_approved += 1;
        }
    }
    Ok(())
}

fn settle_children(
    conn: &mut SqliteConnection,
    job_code: &str,
    today: NaiveDate,
    settings: &SettlementSettings,
    at: NaiveDateTime,
    report: &mut SettlementReport,
) -> Result<(), SettlementError> {
    let percent = penalty::penalty_percent(settings);
    let totals = CohortTotals::load(conn)?;
    let available = penalty::available_chores(conn, settings.penalize_persistent_chores)?;
    let kids = children::table
        .order(children::id.asc())
        .select(Child::as_select())
        .load(conn)?;

    for child in &kids {
        let marker = step_code(job_code, "child", Some(&child.id));
        if conn.has_run(&marker, today)? {
            debug!(child_id = %child.id, "child already settled today");
            continue;
        }
        let child_percent = match &percent {
            Ok(p) => *p,
            Err(e) => {
                report.record_skip("penalty", &child.id, e);
                None
            }
        };
        let result = conn.immediate_transaction(|conn| {
            let charged =
                penalty::apply_penalty(conn, &child.id, child_percent, &available, &totals, at)?;
            let bonus = bonus::apply_daily_bonus(conn, &child.id, settings, at)?;
            conn.mark_run(&marker, today, at)?;
            Ok::<_, SettlementError>((charged, bonus))
        });
        if let Some((charged, bonus)) = report.triage("child", &child.id, result)? {
            report.children_settled += 1;
            info!(
                child_id = %child.id,
                penalty = %charged,
                bonus = %bonus.points_change,
                balance = %bonus.balance,
                pocket_money_added = %bonus.pocket_money_added,
                "child settled"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chrono_tz::Europe::Warsaw;

    #[test]
    fn utc_day_bounds_are_midnights() {
        let date = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();
        let (from, to) = day_bounds(&Utc, date);
        assert_eq!(from, date.and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(to, date.succ_opt().unwrap().and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn local_day_bounds_follow_the_offset() {
        // CEST is UTC+2
        let date = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let (from, to) = day_bounds(&Warsaw, date);
        assert_eq!(
            from,
            NaiveDate::from_ymd_opt(2026, 6, 30)
                .unwrap()
                .and_hms_opt(22, 0, 0)
                .unwrap()
        );
        assert_eq!(to, date.and_hms_opt(22, 0, 0).unwrap());
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_points(Decimal::new(12345, 3)), Decimal::new(1235, 2));
        assert_eq!(round_points(Decimal::new(-12345, 3)), Decimal::new(-1235, 2));
    }
}
