use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, strum::Display, strum::EnumString, ToSchema)]
pub enum EmployeeStatus {
    Active,
    Inactive,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "EMP-001",
        "first_name": "John",
        "last_name": "Doe",
        "email": "john.doe@company.com",
        "phone": "+911712345678",
        "department": "Engineering",
        "designation": "Software Engineer",
        "location": "Pune",
        "date_of_joining": "2024-01-01",
        "status": "Active"
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: i64,

    #[schema(example = "EMP-001")]
    pub employee_code: Option<String>,

    #[schema(example = "John")]
    pub first_name: String,

    #[schema(example = "Doe")]
    pub last_name: Option<String>,

    #[schema(example = "john.doe@company.com")]
    pub email: String,

    #[schema(example = "+911712345678", nullable = true)]
    pub phone: Option<String>,

    pub department: Option<String>,
    pub designation: Option<String>,
    pub location: Option<String>,
    pub salary: Option<f64>,

    #[schema(example = "2024-01-01", value_type = String, format = "date")]
    pub date_of_joining: Option<NaiveDate>,
    pub resignation_date: Option<NaiveDate>,
    pub relieving_date: Option<NaiveDate>,

    #[schema(example = "Active")]
    pub status: String,

    pub created_at: Option<NaiveDateTime>,
}

/// One-to-one sub-record holding addresses, family contacts and identity
/// documents.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct EmployeePersonal {
    pub employee_id: i64,
    pub present_address: Option<String>,
    pub permanent_address: Option<String>,
    #[schema(value_type = Option<String>, format = "date")]
    pub date_of_birth: Option<NaiveDate>,
    pub blood_group: Option<String>,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
    pub spouse_name: Option<String>,
    pub emergency_contact: Option<String>,
    pub aadhar_number: Option<String>,
    pub pan_number: Option<String>,
    pub voter_id: Option<String>,
}
