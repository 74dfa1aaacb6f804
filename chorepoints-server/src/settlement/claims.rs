//! Claim resolution shared by the parent approval endpoint and the nightly
//! auto-approval.

use chorepoints_shared::domain::{REASON_APPROVED, REASON_REJECTED};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::{SettlementError, round_points};
use crate::storage::decimal::DbDecimal;
use crate::storage::ledger::{self, Entry};
use crate::storage::models::{ChoreClaim, Chore};
use crate::storage::schema::{chore_claims, chores};

/// Stored in `approved` when a claim was resolved to nothing.
pub const PENALTY_MARKER: Decimal = Decimal::NEGATIVE_ONE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Approved {
        claim_id: i32,
        child_id: String,
        amount: Decimal,
    },
    /// The claim was resolved earlier; nothing changed.
    AlreadyProcessed { claim_id: i32, approved: Decimal },
}

/// Points granted for a claim of `points` with `penalty_percent` withheld.
pub fn approved_amount(points: Decimal, penalty_percent: Decimal) -> Result<Decimal, SettlementError> {
    if penalty_percent < Decimal::ZERO || penalty_percent > Decimal::ONE_HUNDRED {
        return Err(SettlementError::InvalidPenalty {
            percent: penalty_percent,
        });
    }
    let amount = points * (Decimal::ONE - penalty_percent / Decimal::ONE_HUNDRED);
    Ok(round_points(amount.max(Decimal::ZERO)))
}

pub fn load_claim(conn: &mut SqliteConnection, claim_id: i32) -> Result<ChoreClaim, SettlementError> {
    chore_claims::table
        .filter(chore_claims::id.eq(claim_id))
        .select(ChoreClaim::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| SettlementError::NotFound {
            kind: "claim",
            id: claim_id.to_string(),
        })
}

pub fn pending_claim_ids(conn: &mut SqliteConnection) -> Result<Vec<i32>, SettlementError> {
    Ok(chore_claims::table
        .order(chore_claims::id.asc())
        .select(ChoreClaim::as_select())
        .load(conn)?
        .into_iter()
        .filter(|c| c.approved.0.is_zero())
        .map(|c| c.id)
        .collect())
}

fn find_chore(conn: &mut SqliteConnection, chore_id: &str) -> Result<Option<Chore>, SettlementError> {
    Ok(chores::table
        .filter(chores::id.eq(chore_id))
        .select(Chore::as_select())
        .first(conn)
        .optional()?)
}

/// Approves a pending claim with `penalty_percent` withheld.
///
/// Writes the ledger entry, credits the child, stores the approved amount on
/// the claim and retires non-daily chores, all in one transaction. A claim
/// that is no longer pending is left untouched.
pub fn resolve_claim(
    conn: &mut SqliteConnection,
    claim_id: i32,
    penalty_percent: Decimal,
    approver: Option<&str>,
    now: NaiveDateTime,
) -> Result<ClaimOutcome, SettlementError> {
    conn.immediate_transaction(|conn| {
        let claim = load_claim(conn, claim_id)?;
        if !claim.approved.0.is_zero() {
            debug!(claim_id, approved = %claim.approved, "claim already resolved");
            return Ok(ClaimOutcome::AlreadyProcessed {
                claim_id,
                approved: claim.approved.0,
            });
        }
        let amount = approved_amount(claim.points.0, penalty_percent)?;

        ledger::post(
            conn,
            &Entry {
                child_id: &claim.child_id,
                points_change: amount,
                reason: REASON_APPROVED,
                chore: &claim.chore_name,
                penalty: penalty_percent,
                approver,
                recorded_at: now,
            },
        )?;

        let stored = if amount.is_zero() {
            PENALTY_MARKER
        } else {
            amount
        };
        diesel::update(chore_claims::table.filter(chore_claims::id.eq(claim_id)))
            .set(chore_claims::approved.eq(DbDecimal(stored)))
            .execute(conn)?;

        if let Some(chore_id) = claim.chore_id.as_deref() {
            match find_chore(conn, chore_id)? {
                Some(chore) if !chore.daily => {
                    diesel::update(chores::table.filter(chores::id.eq(chore_id)))
                        .set(chores::available.eq(false))
                        .execute(conn)?;
                }
                Some(_) => {}
                None => debug!(claim_id, chore_id, "claimed chore no longer exists"),
            }
        }

        info!(
            claim_id,
            child_id = %claim.child_id,
            amount = %amount,
            penalty = %penalty_percent,
            approver = approver.unwrap_or("system"),
            "claim approved"
        );
        Ok(ClaimOutcome::Approved {
            claim_id,
            child_id: claim.child_id,
            amount,
        })
    })
}

/// Rejects a pending claim: a zero-point entry with a full penalty is logged,
/// the chore becomes available again and the claim is removed.
///
/// Returns `false` when the claim does not exist or was already resolved.
pub fn reject_claim(
    conn: &mut SqliteConnection,
    claim_id: i32,
    approver: Option<&str>,
    now: NaiveDateTime,
) -> Result<bool, SettlementError> {
    conn.immediate_transaction(|conn| {
        let claim = match load_claim(conn, claim_id) {
            Ok(c) => c,
            Err(SettlementError::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };
        if !claim.approved.0.is_zero() {
            return Ok(false);
        }
        ledger::post(
            conn,
            &Entry {
                child_id: &claim.child_id,
                points_change: Decimal::ZERO,
                reason: REASON_REJECTED,
                chore: &claim.chore_name,
                penalty: Decimal::ONE_HUNDRED,
                approver,
                recorded_at: now,
            },
        )?;
        if let Some(chore_id) = claim.chore_id.as_deref() {
            diesel::update(chores::table.filter(chores::id.eq(chore_id)))
                .set(chores::available.eq(true))
                .execute(conn)?;
        }
        diesel::delete(chore_claims::table.filter(chore_claims::id.eq(claim_id)))
            .execute(conn)?;
        info!(claim_id, child_id = %claim.child_id, "claim rejected");
        Ok(true)
    })
}

/// Withdraws a pending claim of `child_id`: the claim is removed and the
/// chore is open again. No ledger entry is written.
///
/// Returns `false` when the claim was already resolved. Claims of other
/// children are reported as not found.
pub fn return_claim(
    conn: &mut SqliteConnection,
    claim_id: i32,
    child_id: &str,
) -> Result<bool, SettlementError> {
    conn.immediate_transaction(|conn| {
        let claim = load_claim(conn, claim_id)?;
        if claim.child_id != child_id {
            return Err(SettlementError::NotFound {
                kind: "claim",
                id: claim_id.to_string(),
            });
        }
        if !claim.approved.0.is_zero() {
            debug!(claim_id, approved = %claim.approved, "resolved claim cannot be returned");
            return Ok(false);
        }
        if let Some(chore_id) = claim.chore_id.as_deref() {
            diesel::update(chores::table.filter(chores::id.eq(chore_id)))
                .set(chores::available.eq(true))
                .execute(conn)?;
        }
        diesel::delete(chore_claims::table.filter(chore_claims::id.eq(claim_id)))
            .execute(conn)?;
        info!(claim_id, child_id, chore = %claim.chore_name, "claim returned");
        Ok(true)
    })
}
