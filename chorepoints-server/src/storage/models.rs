use crate::storage::decimal::DbDecimal;
use crate::storage::schema::{
    chore_assignments, chore_claims, chores, children, point_logs, run_logs, settings,
};
use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = children)]
pub struct Child {
    pub id: String,
    pub display_name: String,
    pub points_balance: DbDecimal,
    pub pocket_money: DbDecimal,
    pub place_1: i32,
    pub place_2: i32,
    pub place_3: i32,
}

#[derive(Insertable)]
#[diesel(table_name = children)]
pub struct NewChild<'a> {
    pub id: &'a str,
    pub display_name: &'a str,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = chores)]
pub struct Chore {
    pub id: String,
    pub name: String,
    pub comment: String,
    pub points: DbDecimal,
    pub available: bool,
    pub daily: bool,
    pub persistent: bool,
    pub assignment_type: String,
    pub early_bonus: bool,
    pub bonus_end_time: i32,
    pub available_time: i32,
}

#[derive(Insertable)]
#[diesel(table_name = chores)]
pub struct NewChore<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub comment: &'a str,
    pub points: DbDecimal,
    pub available: bool,
    pub daily: bool,
    pub persistent: bool,
    pub assignment_type: &'a str,
    pub early_bonus: bool,
    pub bonus_end_time: i32,
    pub available_time: i32,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = chore_assignments)]
pub struct ChoreAssignment {
    pub chore_id: String,
    pub child_id: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = chore_claims)]
#[diesel(belongs_to(Child, foreign_key = child_id))]
#[diesel(belongs_to(Chore, foreign_key = chore_id))]
pub struct ChoreClaim {
    pub id: i32,
    pub chore_id: Option<String>,
    pub chore_name: String,
    pub child_id: String,
    pub points: DbDecimal,
    pub approved: DbDecimal,
    pub comment: String,
    pub claimed_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = chore_claims)]
pub struct NewChoreClaim<'a> {
    pub chore_id: Option<&'a str>,
    pub chore_name: &'a str,
    pub child_id: &'a str,
    pub points: DbDecimal,
    pub comment: &'a str,
    pub claimed_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = point_logs)]
#[diesel(belongs_to(Child, foreign_key = child_id))]
pub struct PointLog {
    pub id: i32,
    pub child_id: String,
    pub points_change: DbDecimal,
    pub reason: String,
    pub chore: String,
    pub penalty: DbDecimal,
    pub date_recorded: NaiveDateTime,
    pub approver: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = point_logs)]
pub struct NewPointLog<'a> {
    pub child_id: &'a str,
    pub points_change: DbDecimal,
    pub reason: &'a str,
    pub chore: &'a str,
    pub penalty: DbDecimal,
    pub date_recorded: NaiveDateTime,
    pub approver: Option<&'a str>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = settings)]
#[diesel(primary_key(key))]
pub struct Setting {
    pub key: String,
    pub name: String,
    pub value: DbDecimal,
}

#[derive(Insertable)]
#[diesel(table_name = settings)]
pub struct NewSetting<'a> {
    pub key: &'a str,
    pub name: &'a str,
    pub value: DbDecimal,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = run_logs)]
pub struct RunLog {
    pub job_code: String,
    pub run_date: NaiveDate,
    pub completed_at: NaiveDateTime,
}
