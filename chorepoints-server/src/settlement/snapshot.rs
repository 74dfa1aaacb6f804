use std::collections::HashMap;

use diesel::prelude::*;
use rust_decimal::Decimal;

use super::SettlementError;
use crate::storage::StorageError;
use crate::storage::models::Setting;
use crate::storage::schema::settings;

pub const MIN_POINTS: &str = "min_points";
pub const MAX_POINTS: &str = "max_points";
pub const DAILY_BONUS: &str = "daily_bonus";
pub const POINT_VALUE: &str = "point_value";
pub const INCOMPLETE_CHORES_PENALTY: &str = "incomplete_chores_penalty";
pub const LEADERBOARD_AWARDS: &str = "leaderboard_awards";
pub const AUTO_APPROVE: &str = "auto_approve";
pub const BONUS_PERCENT: &str = "bonus_percent";
pub const BONUS_END_TIME: &str = "bonus_end_time";
/// Optional; non-zero emits zero-point leaderboard entries when awards are off.
pub const LEADERBOARD_LOG_WITHOUT_AWARDS: &str = "leaderboard_log_without_awards";
/// Optional; non-zero counts persistent chores as incomplete.
pub const PENALIZE_PERSISTENT_CHORES: &str = "penalize_persistent_chores";

/// Every `key -> value` row of the settings table.
pub fn read_all(conn: &mut SqliteConnection) -> Result<HashMap<String, Decimal>, StorageError> {
    Ok(settings::table
        .select(Setting::as_select())
        .load(conn)?
        .into_iter()
        .map(|s| (s.key, s.value.0))
        .collect())
}

pub fn read_one(conn: &mut SqliteConnection, key: &str) -> Result<Option<Decimal>, StorageError> {
    Ok(settings::table
        .filter(settings::key.eq(key))
        .select(Setting::as_select())
        .first(conn)
        .optional()?
        .map(|s| s.value.0))
}

fn require(entries: &HashMap<String, Decimal>, key: &'static str) -> Result<Decimal, SettlementError> {
    entries
        .get(key)
        .copied()
        .ok_or(SettlementError::MissingConfig(key))
}

fn flag(entries: &HashMap<String, Decimal>, key: &str) -> bool {
    entries.get(key).is_some_and(|v| !v.is_zero())
}

/// Settings read once at the start of a settlement run.
///
/// Steps receive this by reference; nothing re-reads the settings table
/// until the next run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementSettings {
    pub min_points: Decimal,
    pub max_points: Decimal,
    pub daily_bonus: Decimal,
    pub point_value: Decimal,
    pub incomplete_chores_penalty: Decimal,
    pub leaderboard_awards: Decimal,
    pub auto_approve: Decimal,
    pub leaderboard_log_without_awards: bool,
    pub penalize_persistent_chores: bool,
}

impl SettlementSettings {
    pub fn from_entries(entries: &HashMap<String, Decimal>) -> Result<Self, SettlementError> {
        Ok(Self {
            min_points: require(entries, MIN_POINTS)?,
            max_points: require(entries, MAX_POINTS)?,
            daily_bonus: require(entries, DAILY_BONUS)?,
            point_value: require(entries, POINT_VALUE)?,
            incomplete_chores_penalty: require(entries, INCOMPLETE_CHORES_PENALTY)?,
            leaderboard_awards: require(entries, LEADERBOARD_AWARDS)?,
            auto_approve: require(entries, AUTO_APPROVE)?,
            leaderboard_log_without_awards: flag(entries, LEADERBOARD_LOG_WITHOUT_AWARDS),
            penalize_persistent_chores: flag(entries, PENALIZE_PERSISTENT_CHORES),
        })
    }

    pub fn load(conn: &mut SqliteConnection) -> Result<Self, SettlementError> {
        let entries = read_all(conn)?;
        Self::from_entries(&entries)
    }

    /// Penalty percentage applied to claims that are still pending at settlement.
    pub fn auto_approve_penalty(&self) -> Decimal {
        Decimal::ONE_HUNDRED - self.auto_approve
    }
}
