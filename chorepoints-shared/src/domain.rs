use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Ledger `reason` written when a claim is approved (automatically or by a parent).
pub const REASON_APPROVED: &str = "Approved";
/// Ledger `reason` written when a parent rejects a claim.
pub const REASON_REJECTED: &str = "Rejected";
pub const REASON_INCOMPLETE_PENALTY: &str = "Incomplete Chores Penalty";
pub const REASON_DAILY_POINTS: &str = "Daily Points";
pub const REASON_CONVERSION: &str = "Conversion to Pocket Money";
/// Chore tag of conversion entries; the leaderboard counts it like any tagged entry.
pub const CHORE_TAG_PAYOUT: &str = "Payout";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentType {
    /// The first child to claim takes the chore.
    #[default]
    AnyChild,
    /// Every child may claim it once per day.
    AllChildren,
    /// The first of the assigned children to claim takes it.
    AnySelected,
    /// Every assigned child may claim it once per day.
    AllSelected,
}

impl AssignmentType {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentType::AnyChild => "any_child",
            AssignmentType::AllChildren => "all_children",
            AssignmentType::AnySelected => "any_selected",
            AssignmentType::AllSelected => "all_selected",
        }
    }

    /// Whether only the assigned children may claim.
    pub fn is_selective(self) -> bool {
        matches!(
            self,
            AssignmentType::AnySelected | AssignmentType::AllSelected
        )
    }

    /// Whether a single claim consumes the chore for everyone.
    pub fn is_exclusive(self) -> bool {
        matches!(self, AssignmentType::AnyChild | AssignmentType::AnySelected)
    }
}

impl fmt::Display for AssignmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAssignmentType(pub String);

impl fmt::Display for UnknownAssignmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown assignment type: {}", self.0)
    }
}

impl std::error::Error for UnknownAssignmentType {}

impl FromStr for AssignmentType {
    type Err = UnknownAssignmentType;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any_child" => Ok(AssignmentType::AnyChild),
            "all_children" => Ok(AssignmentType::AllChildren),
            "any_selected" => Ok(AssignmentType::AnySelected),
            "all_selected" => Ok(AssignmentType::AllSelected),
            other => Err(UnknownAssignmentType(other.to_string())),
        }
    }
}

/// Signed hour window of a chore.
///
/// `0` means always available, `n > 0` available from hour `n` onwards and
/// `n < 0` available only before hour `|n|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvailableTime(pub i32);

impl AvailableTime {
    pub fn is_open_at(self, hour: u32) -> bool {
        let hour = hour as i32;
        match self.0 {
            0 => true,
            after if after > 0 => hour >= after,
            before => hour < -before,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Child {
    pub id: String,
    pub display_name: String,
}

fn default_true() -> bool {
    true
}

/// Chore definition as it appears in the server configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chore {
    pub id: String,
    pub name: String,
    pub points: Decimal,
    #[serde(default)]
    pub comment: String,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default)]
    pub daily: bool,
    #[serde(default)]
    pub persistent: bool,
    #[serde(default)]
    pub assignment_type: AssignmentType,
    #[serde(default)]
    pub assigned_children: Vec<String>,
    #[serde(default)]
    pub early_bonus: bool,
    /// Falls back to the `bonus_end_time` setting when absent.
    #[serde(default)]
    pub bonus_end_time: Option<i32>,
    #[serde(default)]
    pub available_time: AvailableTime,
}

/// Initial value of a numeric setting. Existing rows are never overwritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingSeed {
    pub key: String,
    #[serde(default)]
    pub name: String,
    pub value: Decimal,
}
