use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{AssignmentType, AvailableTime};

pub mod endpoints;

pub const API_V1_PREFIX: &str = "/api/v1";

// Auth
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthReq {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResp {
    pub token: String,
}

// Children/Chores
#[derive(Debug, Serialize, Deserialize)]
pub struct ChildDto {
    pub id: String,
    pub display_name: String,
    pub points_balance: Decimal,
    pub pocket_money: Decimal,
    pub place_1: i32,
    pub place_2: i32,
    pub place_3: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChoreDto {
    pub id: String,
    pub name: String,
    pub comment: String,
    pub points: Decimal,
    pub available: bool,
    pub daily: bool,
    pub persistent: bool,
    pub assignment_type: AssignmentType,
    pub assigned_children: Vec<String>,
    pub early_bonus: bool,
    pub bonus_end_time: i32,
    pub available_time: AvailableTime,
}

// Claims
#[derive(Debug, Serialize, Deserialize)]
pub struct ClaimDto {
    pub id: i32,
    pub child_id: String,
    pub chore_id: Option<String>,
    pub chore_name: String,
    pub points: Decimal,
    pub approved: Decimal,
    pub comment: String,
}

/// Either `chore_id` (claim an existing chore) or `name` + `points`
/// (custom chore proposed by the child).
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ClaimReq {
    pub chore_id: Option<String>,
    pub name: Option<String>,
    pub points: Option<Decimal>,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApproveReq {
    /// Percentage of the claimed points withheld, 0-100.
    #[serde(default)]
    pub penalty: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApproveResp {
    pub claim_id: i32,
    pub approved: Decimal,
    /// `false` when the claim had already been resolved.
    pub applied: bool,
}

// Ledger
#[derive(Debug, Serialize, Deserialize)]
pub struct PointLogDto {
    pub id: i32,
    pub points_change: Decimal,
    pub reason: String,
    pub chore: String,
    pub penalty: Decimal,
    pub date_recorded: String, // RFC3339 UTC
    pub approver: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PointAdjustmentReq {
    pub points_change: Decimal,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PocketMoneyAdjustmentReq {
    pub amount: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResp {
    pub child_id: String,
    pub points_balance: Decimal,
    pub pocket_money: Decimal,
}

// Settings
#[derive(Debug, Serialize, Deserialize)]
pub struct SettingDto {
    pub key: String,
    pub name: String,
    pub value: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SettingUpdateReq {
    pub value: Decimal,
}

// Settlement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Completed,
    AlreadyRun,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedEntityDto {
    pub step: String,
    pub entity: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReportDto {
    pub job_code: String,
    pub date: String, // YYYY-MM-DD in the configured timezone
    pub status: SettlementStatus,
    pub claims_approved: usize,
    pub children_settled: usize,
    pub leaderboard: Option<String>,
    pub skipped: Vec<SkippedEntityDto>,
}
