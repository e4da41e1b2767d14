use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Mail-merge recipient marker.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, strum::Display, strum::EnumString, ToSchema)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecipientType {
    To,
    Cc,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct EmailTemplate {
    pub id: i64,
    #[schema(example = "leave-approved")]
    pub name: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
    #[schema(example = "Active")]
    pub status: String,
}
