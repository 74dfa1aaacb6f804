//! Claim submission rules: availability window, assignment and early bonus.

use chorepoints_shared::domain::{AssignmentType, AvailableTime};
use chrono::{DateTime, NaiveTime, TimeZone, Timelike};
use diesel::prelude::*;
use rust_decimal::Decimal;
use tracing::info;

use crate::settlement::{round_points, snapshot};
use crate::storage::StorageError;
use crate::storage::decimal::DbDecimal;
use crate::storage::ledger;
use crate::storage::models::{Chore, ChoreClaim, NewChoreClaim};
use crate::storage::schema::{chore_assignments, chore_claims, chores};

/// Early bonus claims are accepted only after this hour.
const EARLY_BONUS_START_HOUR: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("chore not found: {0}")]
    ChoreNotFound(String),
    #[error("child not found: {0}")]
    ChildNotFound(String),
    #[error("chore is not available")]
    Unavailable,
    #[error("chore cannot be claimed at this hour")]
    OutsideWindow,
    #[error("chore is not assigned to this child")]
    NotAssigned,
    #[error("chore already claimed today")]
    AlreadyClaimed,
    #[error("invalid claim: {0}")]
    Invalid(String),
    #[error("missing configuration key: {0}")]
    MissingConfig(&'static str),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<diesel::result::Error> for ClaimError {
    fn from(value: diesel::result::Error) -> Self {
        ClaimError::Storage(StorageError::Database(value))
    }
}

/// What a child asks for.
#[derive(Debug, Clone)]
pub enum ClaimRequest {
    Chore {
        chore_id: String,
    },
    /// Child-proposed chore without a definition.
    Custom {
        name: String,
        points: Decimal,
        comment: String,
    },
}

/// Points and comment of a claim on `chore` made at `now`.
pub fn claim_terms<Z: TimeZone>(
    chore: &Chore,
    now: &DateTime<Z>,
    bonus_percent: Decimal,
) -> (Decimal, String) {
    let time = now.time();
    let start = NaiveTime::from_hms_opt(EARLY_BONUS_START_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);
    let end = NaiveTime::from_hms_opt(chore.bonus_end_time.clamp(0, 23) as u32, 0, 0)
        .unwrap_or(NaiveTime::MIN);
    if chore.early_bonus && time > start && time <= end {
        let points = round_points(
            chore.points.0 * (Decimal::ONE_HUNDRED + bonus_percent) / Decimal::ONE_HUNDRED,
        );
        let comment = if chore.comment.is_empty() {
            format!("Early bonus of {}%", bonus_percent.normalize())
        } else {
            format!("Early bonus of {}%: {}", bonus_percent.normalize(), chore.comment)
        };
        (points, comment)
    } else {
        (chore.points.0, chore.comment.clone())
    }
}

fn check_eligibility(
    conn: &mut SqliteConnection,
    chore: &Chore,
    child_id: &str,
    hour: u32,
) -> Result<AssignmentType, ClaimError> {
    if !chore.available {
        return Err(ClaimError::Unavailable);
    }
    if !AvailableTime(chore.available_time).is_open_at(hour) {
        return Err(ClaimError::OutsideWindow);
    }
    let assignment: AssignmentType = chore
        .assignment_type
        .parse()
        .map_err(|e: chorepoints_shared::domain::UnknownAssignmentType| {
            ClaimError::Invalid(e.to_string())
        })?;
    if assignment.is_selective() {
        let assigned: i64 = chore_assignments::table
            .filter(chore_assignments::chore_id.eq(&chore.id))
            .filter(chore_assignments::child_id.eq(child_id))
            .count()
            .get_result(conn)?;
        if assigned == 0 {
            return Err(ClaimError::NotAssigned);
        }
    }
    if !assignment.is_exclusive() {
        let existing: i64 = chore_claims::table
            .filter(chore_claims::chore_id.eq(&chore.id))
            .filter(chore_claims::child_id.eq(child_id))
            .count()
            .get_result(conn)?;
        if existing > 0 {
            return Err(ClaimError::AlreadyClaimed);
        }
    }
    Ok(assignment)
}

/// Records a claim for `child_id`. Exclusive, non-persistent chores become
/// unavailable to everyone else.
pub fn submit_claim<Z: TimeZone>(
    conn: &mut SqliteConnection,
    child_id: &str,
    request: &ClaimRequest,
    now: &DateTime<Z>,
) -> Result<ChoreClaim, ClaimError> {
    conn.immediate_transaction(|conn| -> Result<ChoreClaim, ClaimError> {
        match ledger::load_child(conn, child_id) {
            Ok(_) => {}
            Err(StorageError::NotFound { .. }) => {
                return Err(ClaimError::ChildNotFound(child_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        let claimed_at = now.naive_utc();

        let (chore_id, chore_name, points, comment) = match request {
            ClaimRequest::Custom {
                name,
                points,
                comment,
            } => {
                if name.trim().is_empty() {
                    return Err(ClaimError::Invalid("name must not be empty".into()));
                }
                if *points < Decimal::ZERO {
                    return Err(ClaimError::Invalid("points must not be negative".into()));
                }
                (None, name.trim().to_string(), *points, comment.clone())
            }
            ClaimRequest::Chore { chore_id } => {
                let chore = chores::table
                    .filter(chores::id.eq(chore_id))
                    .select(Chore::as_select())
                    .first(conn)
                    .optional()?
                    .ok_or_else(|| ClaimError::ChoreNotFound(chore_id.clone()))?;
                let assignment = check_eligibility(conn, &chore, child_id, now.hour())?;
                let bonus_percent = if chore.early_bonus {
                    snapshot::read_one(conn, snapshot::BONUS_PERCENT)?
                        .ok_or(ClaimError::MissingConfig(snapshot::BONUS_PERCENT))?
                } else {
                    Decimal::ZERO
                };
                let (points, comment) = claim_terms(&chore, now, bonus_percent);
                if assignment.is_exclusive() && !chore.persistent {
                    diesel::update(chores::table.filter(chores::id.eq(&chore.id)))
                        .set(chores::available.eq(false))
                        .execute(conn)?;
                }
                (Some(chore.id), chore.name, points, comment)
            }
        };

        let claim = diesel::insert_into(chore_claims::table)
            .values(&NewChoreClaim {
                chore_id: chore_id.as_deref(),
                chore_name: &chore_name,
                child_id,
                points: DbDecimal(points),
                comment: &comment,
                claimed_at,
            })
            .returning(ChoreClaim::as_returning())
            .get_result(conn)?;
        info!(
            claim_id = claim.id,
            child_id,
            chore = %claim.chore_name,
            points = %claim.points,
            "chore claimed"
        );
        Ok(claim)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn chore(early_bonus: bool, bonus_end_time: i32) -> Chore {
        Chore {
            id: "dishes".into(),
            name: "Dishes".into(),
            comment: "after dinner".into(),
            points: DbDecimal(dec!(10)),
            available: true,
            daily: true,
            persistent: false,
            assignment_type: "any_child".into(),
            early_bonus,
            bonus_end_time,
            available_time: 0,
        }
    }

    #[test]
    fn early_bonus_inside_window() {
        let now = Utc.with_ymd_and_hms(2026, 4, 2, 9, 15, 0).unwrap();
        let (points, comment) = claim_terms(&chore(true, 14), &now, dec!(25));
        assert_eq!(points, dec!(12.5));
        assert_eq!(comment, "Early bonus of 25%: after dinner");
    }

    #[test]
    fn no_bonus_after_end_hour_or_before_five() {
        let late = Utc.with_ymd_and_hms(2026, 4, 2, 14, 1, 0).unwrap();
        assert_eq!(claim_terms(&chore(true, 14), &late, dec!(25)).0, dec!(10));
        let early = Utc.with_ymd_and_hms(2026, 4, 2, 4, 30, 0).unwrap();
        assert_eq!(claim_terms(&chore(true, 14), &early, dec!(25)).0, dec!(10));
    }

    #[test]
    fn end_hour_itself_still_counts() {
        let at_end = Utc.with_ymd_and_hms(2026, 4, 2, 14, 0, 0).unwrap();
        assert_eq!(claim_terms(&chore(true, 14), &at_end, dec!(50)).0, dec!(15));
    }

    #[test]
    fn chores_without_flag_never_get_bonus() {
        let now = Utc.with_ymd_and_hms(2026, 4, 2, 9, 0, 0).unwrap();
        let (points, comment) = claim_terms(&chore(false, 14), &now, dec!(25));
        assert_eq!(points, dec!(10));
        assert_eq!(comment, "after dinner");
    }
}
