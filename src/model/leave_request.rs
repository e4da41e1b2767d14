use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, strum::Display, strum::EnumString, ToSchema)]
pub enum LeaveType {
    Casual,
    Medical,
    Earned,
}

impl LeaveType {
    /// Medical leave is exempt from the monthly cap.
    pub fn counts_against_cap(self) -> bool {
        !matches!(self, LeaveType::Medical)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, strum::Display, strum::EnumString, ToSchema)]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveRequest {
    pub id: i64,
    pub employee_id: i64,
    #[schema(example = "Casual")]
    pub leave_type: String,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    #[schema(example = "Pending")]
    pub status: String,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub applied_at: Option<NaiveDateTime>,
}
