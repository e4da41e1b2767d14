use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Single-letter attendance codes stored in the `status` column.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, strum::Display, strum::EnumString, ToSchema)]
pub enum AttendanceStatus {
    P,
    A,
    L,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Attendance {
    pub id: i64,
    pub employee_id: i64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>)]
    pub login_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>)]
    pub logout_time: Option<NaiveTime>,
    #[schema(example = "P")]
    pub status: String,
}
