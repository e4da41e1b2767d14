use crate::model::role::Role;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "john.doe@company.com")]
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SendOtpReqDto {
    #[schema(example = "john.doe@company.com")]
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ResetPasswordReqDto {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Employee record backing this session
    pub employee_id: i64,
    /// Display name
    pub sub: String,
    pub role: Role,
    pub exp: usize,
    pub jti: String,
}
