use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use rust_decimal::Decimal;
use tracing::info;

use super::{SettlementError, SettlementSettings, round_points};
use crate::storage::ledger::{self, Entry};
use crate::storage::models::Child;
use crate::storage::schema::children;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub child_id: String,
    pub display_name: String,
    /// Sum of the day's chore-tagged ledger changes.
    pub total: Decimal,
}

/// Orders by total descending; equal totals by child id ascending.
pub fn rank(mut standings: Vec<Standing>) -> Vec<Standing> {
    standings.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.child_id.cmp(&b.child_id))
    });
    standings
}

/// Award for a 0-based place: full, half, a fifth, then nothing.
pub fn award_for(place: usize, awards: Decimal) -> Decimal {
    match place {
        0 => awards,
        1 => round_points(awards / Decimal::TWO),
        2 => round_points(awards / Decimal::from(5)),
        _ => Decimal::ZERO,
    }
}

fn ordinal(place: usize) -> String {
    let n = place + 1;
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// Shared `reason` text of every leaderboard entry of the day.
pub fn summary(standings: &[Standing], awards: Decimal) -> String {
    let mut text = String::from("Leaderboard results!");
    for (place, s) in standings.iter().enumerate().take(3) {
        let award = if awards > Decimal::ZERO {
            award_for(place, awards)
        } else {
            Decimal::ZERO
        };
        let _ = write!(
            text,
            "\n{} place: {} - {} points (+{})",
            ordinal(place),
            s.display_name,
            s.total.normalize(),
            award.normalize()
        );
    }
    text
}

/// Day totals per child from chore-tagged entries in `[from, to)`.
///
/// Children without any such entry are not part of the ranking.
pub fn day_standings(
    conn: &mut SqliteConnection,
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> Result<Vec<Standing>, SettlementError> {
    let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
    for entry in ledger::entries_between(conn, from, to)? {
        if entry.chore.is_empty() {
            continue;
        }
        *totals.entry(entry.child_id).or_default() += entry.points_change.0;
    }
    let names: BTreeMap<String, String> = children::table
        .select(Child::as_select())
        .load(conn)?
        .into_iter()
        .map(|c| (c.id, c.display_name))
        .collect();
    Ok(rank(
        totals
            .into_iter()
            .filter_map(|(child_id, total)| {
                // ledger rows of removed children are history only
                let display_name = names.get(&child_id)?.clone();
                Some(Standing {
                    child_id,
                    display_name,
                    total,
                })
            })
            .collect(),
    ))
}

fn bump_place(conn: &mut SqliteConnection, child_id: &str, place: usize) -> Result<(), SettlementError> {
    let target = children::table.filter(children::id.eq(child_id));
    match place {
        0 => diesel::update(target)
            .set(children::place_1.eq(children::place_1 + 1))
            .execute(conn)?,
        1 => diesel::update(target)
            .set(children::place_2.eq(children::place_2 + 1))
            .execute(conn)?,
        2 => diesel::update(target)
            .set(children::place_3.eq(children::place_3 + 1))
            .execute(conn)?,
        _ => 0,
    };
    Ok(())
}

/// Ranks the day and posts the awards. Returns the summary text, or `None`
/// when nobody earned chore points today.
pub fn apply_leaderboard(
    conn: &mut SqliteConnection,
    settings: &SettlementSettings,
    from: NaiveDateTime,
    to: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<Option<String>, SettlementError> {
    let standings = day_standings(conn, from, to)?;
    if standings.is_empty() {
        info!("leaderboard: no chore points today");
        return Ok(None);
    }
    let awards = settings.leaderboard_awards;
    let text = summary(&standings, awards);
    let awarding = awards > Decimal::ZERO;
    if !awarding && !settings.leaderboard_log_without_awards {
        info!("leaderboard: awards disabled");
        return Ok(Some(text));
    }

    for (place, standing) in standings.iter().enumerate() {
        let award = if awarding {
            award_for(place, awards)
        } else {
            Decimal::ZERO
        };
        ledger::post(conn, &Entry::system(&standing.child_id, award, &text, now))?;
        if awarding {
            bump_place(conn, &standing.child_id, place)?;
        }
        info!(
            child_id = %standing.child_id,
            place = place + 1,
            total = %standing.total,
            award = %award,
            "leaderboard placement"
        );
    }
    Ok(Some(text))
}
