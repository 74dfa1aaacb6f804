use chorepoints_shared::domain::REASON_DAILY_POINTS;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use rust_decimal::Decimal;

use super::{SettlementError, SettlementSettings, round_points};
use crate::storage::ledger::{self, Entry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyBonus {
    pub balance: Decimal,
    /// Ledger change: `balance - pre_bonus_balance`.
    pub points_change: Decimal,
    pub pocket_money_added: Decimal,
}

/// Floor, bonus, then ceiling. Points above `max_points` are paid out at
/// `point_value` each.
pub fn compute_daily_bonus(balance: Decimal, settings: &SettlementSettings) -> DailyBonus {
    let mut next = balance.max(settings.min_points) + settings.daily_bonus;
    let mut pocket_money_added = Decimal::ZERO;
    if next > settings.max_points {
        pocket_money_added = round_points((next - settings.max_points) * settings.point_value);
        next = settings.max_points;
    }
    DailyBonus {
        balance: next,
        points_change: next - balance,
        pocket_money_added,
    }
}

/// Applies the daily bonus to the child's stored (already penalised) balance.
pub fn apply_daily_bonus(
    conn: &mut SqliteConnection,
    child_id: &str,
    settings: &SettlementSettings,
    now: NaiveDateTime,
) -> Result<DailyBonus, SettlementError> {
    let child = ledger::load_child(conn, child_id)?;
    let bonus = compute_daily_bonus(child.points_balance.0, settings);
    ledger::post(
        conn,
        &Entry::system(child_id, bonus.points_change, REASON_DAILY_POINTS, now),
    )?;
    if !bonus.pocket_money_added.is_zero() {
        ledger::add_pocket_money(conn, child_id, bonus.pocket_money_added)?;
    }
    Ok(bonus)
}
