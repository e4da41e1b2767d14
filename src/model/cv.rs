use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct CvRecord {
    pub id: i64,
    pub candidate_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position_applied: Option<String>,
    pub experience_years: Option<f64>,
    pub skills: Option<String>,
    #[schema(example = "Active")]
    pub active_status: String,
    #[schema(example = "Applied")]
    pub status: String,
    #[schema(example = "No")]
    pub shortlisted_for_future: String,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<NaiveDateTime>,
}
