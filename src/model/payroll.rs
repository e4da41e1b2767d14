use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Payroll row without the payslip BLOB; listings never carry the PDF.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Payroll {
    pub id: i64,
    pub employee_id: i64,
    #[schema(example = "Jan 2024")]
    pub pay_period: String,
    pub basic: f64,
    pub hra: f64,
    pub allowances: f64,
    pub deductions: f64,
    pub net_salary: f64,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<NaiveDateTime>,
}
