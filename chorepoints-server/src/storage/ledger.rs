//! Append-only point ledger.
//!
//! Every change to a child's `points_balance` goes through [`post`], which
//! writes the [`PointLog`] row and moves the cached balance by exactly the
//! same amount. Callers wrap it in a transaction together with whatever else
//! the operation mutates.

use chorepoints_shared::domain::{CHORE_TAG_PAYOUT, REASON_CONVERSION};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use rust_decimal::Decimal;

use super::StorageError;
use super::decimal::DbDecimal;
use super::models::{Child, NewPointLog, PointLog};
use super::schema::{children, point_logs};

/// One ledger posting.
#[derive(Debug, Clone)]
pub struct Entry<'a> {
    pub child_id: &'a str,
    pub points_change: Decimal,
    pub reason: &'a str,
    /// Chore name tag; empty for adjustments that did not come from a chore.
    pub chore: &'a str,
    /// Percentage withheld, 0 when none.
    pub penalty: Decimal,
    /// `None` for automated (settlement) postings.
    pub approver: Option<&'a str>,
    pub recorded_at: NaiveDateTime,
}

impl<'a> Entry<'a> {
    pub fn system(
        child_id: &'a str,
        points_change: Decimal,
        reason: &'a str,
        recorded_at: NaiveDateTime,
    ) -> Self {
        Entry {
            child_id,
            points_change,
            reason,
            chore: "",
            penalty: Decimal::ZERO,
            approver: None,
            recorded_at,
        }
    }
}

pub fn load_child(conn: &mut SqliteConnection, child_id: &str) -> Result<Child, StorageError> {
    children::table
        .filter(children::id.eq(child_id))
        .select(Child::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| StorageError::NotFound {
            kind: "child",
            id: child_id.to_string(),
        })
}

/// Appends `entry` and applies it to the cached balance. Returns the new balance.
pub fn post(conn: &mut SqliteConnection, entry: &Entry<'_>) -> Result<Decimal, StorageError> {
    let child = load_child(conn, entry.child_id)?;
    let balance = child.points_balance.0 + entry.points_change;
    diesel::insert_into(point_logs::table)
        .values(&NewPointLog {
            child_id: entry.child_id,
            points_change: entry.points_change.into(),
            reason: entry.reason,
            chore: entry.chore,
            penalty: entry.penalty.into(),
            date_recorded: entry.recorded_at,
            approver: entry.approver,
        })
        .execute(conn)?;
    diesel::update(children::table.filter(children::id.eq(entry.child_id)))
        .set(children::points_balance.eq(DbDecimal(balance)))
        .execute(conn)?;
    Ok(balance)
}

pub fn add_pocket_money(
    conn: &mut SqliteConnection,
    child_id: &str,
    amount: Decimal,
) -> Result<Decimal, StorageError> {
    let child = load_child(conn, child_id)?;
    let money = child.pocket_money.0 + amount;
    diesel::update(children::table.filter(children::id.eq(child_id)))
        .set(children::pocket_money.eq(DbDecimal(money)))
        .execute(conn)?;
    Ok(money)
}

/// Points exchanged by one conversion.
pub const CONVERSION_POINTS: Decimal = Decimal::ONE_HUNDRED;

/// Exchanges [`CONVERSION_POINTS`] for pocket money worth `point_value` each.
/// Allowed only while the balance is above half of `max_points`.
///
/// Returns the new `(points_balance, pocket_money)`.
pub fn convert_to_pocket_money(
    conn: &mut SqliteConnection,
    child_id: &str,
    max_points: Decimal,
    point_value: Decimal,
    requested_by: &str,
    now: NaiveDateTime,
) -> Result<(Decimal, Decimal), StorageError> {
    let child = load_child(conn, child_id)?;
    let threshold = max_points / Decimal::TWO;
    if child.points_balance.0 <= threshold {
        return Err(StorageError::InvalidInput(format!(
            "balance {} must exceed {} to convert",
            child.points_balance, threshold
        )));
    }
    let balance = post(
        conn,
        &Entry {
            chore: CHORE_TAG_PAYOUT,
            approver: Some(requested_by),
            ..Entry::system(child_id, -CONVERSION_POINTS, REASON_CONVERSION, now)
        },
    )?;
    let money = add_pocket_money(conn, child_id, CONVERSION_POINTS * point_value)?;
    Ok((balance, money))
}

/// Entries of one child, newest first. `page` starts at 1.
pub fn entries_for_child(
    conn: &mut SqliteConnection,
    child_id: &str,
    page: usize,
    per_page: usize,
) -> Result<Vec<PointLog>, StorageError> {
    let per_page = per_page.clamp(1, 1000) as i64;
    let offset = (page.max(1) as i64 - 1) * per_page;
    Ok(point_logs::table
        .filter(point_logs::child_id.eq(child_id))
        .order((point_logs::date_recorded.desc(), point_logs::id.desc()))
        .offset(offset)
        .limit(per_page)
        .select(PointLog::as_select())
        .load(conn)?)
}

/// Entries recorded in `[from, to)`, oldest first.
pub fn entries_between(
    conn: &mut SqliteConnection,
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> Result<Vec<PointLog>, StorageError> {
    Ok(point_logs::table
        .filter(point_logs::date_recorded.ge(from))
        .filter(point_logs::date_recorded.lt(to))
        .order((point_logs::date_recorded.asc(), point_logs::id.asc()))
        .select(PointLog::as_select())
        .load(conn)?)
}
