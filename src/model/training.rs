use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Training {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub trainer: Option<String>,
    #[schema(value_type = Option<String>, format = "date")]
    pub start_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
    pub status: String,
}

/// Join row; `status` tracks per-employee completion.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct EmployeeTraining {
    pub id: i64,
    pub employee_id: i64,
    pub training_id: i64,
    #[schema(example = "Registered")]
    pub status: String,
}
