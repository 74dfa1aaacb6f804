use diesel::prelude::*;
use tracing::info;

use super::SettlementError;
use crate::storage::models::ChoreClaim;
use crate::storage::schema::{chore_claims, chores};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetSummary {
    pub claims_removed: usize,
    pub chores_restored: usize,
}

/// Deletes every resolved claim (approved or penalty-marked) and makes daily
/// chores available again. Pending claims are kept.
pub fn reset_chores(conn: &mut SqliteConnection) -> Result<ResetSummary, SettlementError> {
    let resolved: Vec<i32> = chore_claims::table
        .select(ChoreClaim::as_select())
        .load(conn)?
        .into_iter()
        .filter(|c| !c.approved.0.is_zero())
        .map(|c| c.id)
        .collect();
    let claims_removed = if resolved.is_empty() {
        0
    } else {
        diesel::delete(chore_claims::table.filter(chore_claims::id.eq_any(&resolved)))
            .execute(conn)?
    };
    let chores_restored = diesel::update(chores::table.filter(chores::daily.eq(true)))
        .set(chores::available.eq(true))
        .execute(conn)?;
    info!(claims_removed, chores_restored, "daily chores reset");
    Ok(ResetSummary {
        claims_removed,
        chores_restored,
    })
}
