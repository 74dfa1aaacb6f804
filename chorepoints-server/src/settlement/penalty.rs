//! Incomplete chores penalty.
//!
//! A child pays `penalty% × (points of available chores they did not
//! complete) × (1 − their share of today's approved points)`. A child who
//! earned everything the family earned today pays nothing; when nobody earned
//! anything the share is zero and the full fraction applies.

use std::collections::{HashMap, HashSet};

use chorepoints_shared::domain::REASON_INCOMPLETE_PENALTY;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use rust_decimal::Decimal;

use super::{SettlementError, SettlementSettings, round_points};
use crate::storage::ledger::{self, Entry};
use crate::storage::models::{Chore, ChoreClaim};
use crate::storage::schema::{chore_claims, chores};

/// Approved claims of the day, aggregated once per run.
#[derive(Debug, Default, Clone)]
pub struct CohortTotals {
    pub cohort_completed: Decimal,
    per_child: HashMap<String, Decimal>,
    completed_chores: HashMap<String, HashSet<String>>,
}

impl CohortTotals {
    pub fn from_claims<'a>(claims: impl IntoIterator<Item = &'a ChoreClaim>) -> Self {
        let mut totals = CohortTotals::default();
        for claim in claims {
            let approved = claim.approved.0;
            if approved <= Decimal::ZERO {
                continue;
            }
            totals.cohort_completed += approved;
            *totals
                .per_child
                .entry(claim.child_id.clone())
                .or_default() += approved;
            if let Some(chore_id) = &claim.chore_id {
                totals
                    .completed_chores
                    .entry(claim.child_id.clone())
                    .or_default()
                    .insert(chore_id.clone());
            }
        }
        totals
    }

    pub fn load(conn: &mut SqliteConnection) -> Result<Self, SettlementError> {
        let claims = chore_claims::table
            .select(ChoreClaim::as_select())
            .load(conn)?;
        Ok(Self::from_claims(&claims))
    }

    pub fn child_completed(&self, child_id: &str) -> Decimal {
        self.per_child.get(child_id).copied().unwrap_or_default()
    }

    pub fn has_completed(&self, child_id: &str, chore_id: &str) -> bool {
        self.completed_chores
            .get(child_id)
            .is_some_and(|set| set.contains(chore_id))
    }
}

/// Chores counted as open for the day.
pub fn available_chores(
    conn: &mut SqliteConnection,
    include_persistent: bool,
) -> Result<Vec<Chore>, SettlementError> {
    let open = chores::table
        .filter(chores::available.eq(true))
        .order(chores::id.asc())
        .select(Chore::as_select())
        .load(conn)?;
    Ok(open
        .into_iter()
        .filter(|c| include_persistent || !c.persistent)
        .collect())
}

/// Validated penalty percentage, or `None` when penalties are switched off.
pub fn penalty_percent(settings: &SettlementSettings) -> Result<Option<Decimal>, SettlementError> {
    let percent = settings.incomplete_chores_penalty;
    if percent <= Decimal::ZERO {
        return Ok(None);
    }
    if percent > Decimal::ONE_HUNDRED {
        return Err(SettlementError::InvalidPenalty { percent });
    }
    Ok(Some(percent))
}

pub fn incomplete_sum(available: &[Chore], totals: &CohortTotals, child_id: &str) -> Decimal {
    available
        .iter()
        .filter(|chore| !totals.has_completed(child_id, &chore.id))
        .map(|chore| chore.points.0)
        .sum()
}

pub fn penalty_amount(
    percent: Decimal,
    incomplete_sum: Decimal,
    child_completed: Decimal,
    cohort_completed: Decimal,
) -> Decimal {
    let share = if cohort_completed.is_zero() {
        Decimal::ZERO
    } else {
        child_completed / cohort_completed
    };
    round_points(percent / Decimal::ONE_HUNDRED * incomplete_sum * (Decimal::ONE - share))
}

/// Charges one child's penalty. Returns the amount deducted (positive), zero
/// when nothing was posted.
pub fn apply_penalty(
    conn: &mut SqliteConnection,
    child_id: &str,
    percent: Option<Decimal>,
    available: &[Chore],
    totals: &CohortTotals,
    now: NaiveDateTime,
) -> Result<Decimal, SettlementError> {
    let Some(percent) = percent else {
        return Ok(Decimal::ZERO);
    };
    if available.is_empty() {
        return Ok(Decimal::ZERO);
    }
    let amount = penalty_amount(
        percent,
        incomplete_sum(available, totals, child_id),
        totals.child_completed(child_id),
        totals.cohort_completed,
    );
    ledger::post(
        conn,
        &Entry {
            penalty: percent,
            ..Entry::system(child_id, -amount, REASON_INCOMPLETE_PENALTY, now)
        },
    )?;
    Ok(amount)
}
