use crate::{
    auth::{
        jwt::generate_access_token,
        password::{hash_password, verify_password},
    },
    config::Config,
    error::ApiError,
    mailer::Mailer,
    model::role::Role,
    models::{LoginReqDto, ResetPasswordReqDto, SendOtpReqDto},
};
use actix_web::{HttpResponse, web};
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;
use sqlx::prelude::FromRow;
use tracing::{debug, error, info, instrument};

#[derive(FromRow)]
struct LoginRow {
    id: i64,
    first_name: String,
    last_name: Option<String>,
    password_hash: Option<String>,
    role_id: i64,
}

#[derive(Serialize)]
struct LoginResponse {
    access_token: String,
}

/// Login handler
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token issued"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip(pool, config, payload), fields(email = %payload.email))]
pub async fn login(
    payload: web::Json<LoginReqDto>,
    pool: web::Data<SqlitePool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    info!("Login request received");

    // 1. Basic validation
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest("Email or password required".into()));
    }

    // 2. Fetch employee + role
    debug!("Fetching employee from database");
    let row = sqlx::query_as::<_, LoginRow>(
        r#"
        SELECT e.id, e.first_name, e.last_name, e.password_hash, er.role_id
        FROM employees e
        JOIN employee_roles er ON er.employee_id = e.id
        WHERE e.email = ?
        "#,
    )
    .bind(payload.email.trim())
    .fetch_optional(pool.get_ref())
    .await?;

    let row = match row {
        Some(r) => r,
        None => {
            info!("Invalid credentials: employee not found");
            return Err(ApiError::Unauthorized("Invalid credentials".into()));
        }
    };

    // 3. Verify password
    let hashed = row
        .password_hash
        .as_deref()
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".into()))?;

    if let Err(e) = verify_password(&payload.password, hashed) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let role = Role::from_id(row.role_id)
        .ok_or_else(|| ApiError::Unauthorized("Invalid role".into()))?;

    // 4. Issue token
    let display_name = match &row.last_name {
        Some(last) => format!("{} {}", row.first_name, last),
        None => row.first_name.clone(),
    };

    let access_token = generate_access_token(
        row.id,
        display_name,
        role,
        &config.jwt_secret,
        config.access_token_ttl,
    );

    info!("Login successful");

    Ok(HttpResponse::Ok().json(LoginResponse { access_token }))
}

/// Generates a 6-digit OTP, stores it on the employee row and mails it.
#[utoipa::path(
    post,
    path = "/auth/send-otp",
    request_body = SendOtpReqDto,
    responses(
        (status = 200, description = "OTP sent"),
        (status = 404, description = "Invalid Email")
    ),
    tag = "Auth"
)]
pub async fn send_otp(
    payload: web::Json<SendOtpReqDto>,
    pool: web::Data<SqlitePool>,
    mailer: web::Data<Mailer>,
) -> Result<HttpResponse, ApiError> {
    let email = payload.email.trim();

    let row = sqlx::query_as::<_, (i64, String)>(
        "SELECT id, first_name FROM employees WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool.get_ref())
    .await?;

    let (employee_id, first_name) = match row {
        Some(r) => r,
        None => return Err(ApiError::NotFound("Invalid Email".into())),
    };

    let otp = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32));

    sqlx::query("UPDATE employees SET otp = ? WHERE id = ?")
        .bind(&otp)
        .bind(employee_id)
        .execute(pool.get_ref())
        .await?;

    let body = format!(
        "Hi {first_name},\n\nYour one-time password reset code is {otp}.\n\nHR Team"
    );
    if let Err(e) = mailer.send(email, &[], "Password Reset OTP", &body, None).await {
        error!(error = %e, employee_id, "Failed to send OTP mail");
        return Err(ApiError::Internal);
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "OTP sent" })))
}

/// Validates the stored OTP and replaces the password. The OTP column is
/// cleared in the same statement, so a code is usable once.
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordReqDto,
    responses(
        (status = 200, description = "Password updated"),
        (status = 400, description = "Invalid OTP"),
        (status = 404, description = "Invalid Email")
    ),
    tag = "Auth"
)]
pub async fn reset_password(
    payload: web::Json<ResetPasswordReqDto>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    if payload.new_password.is_empty() {
        return Err(ApiError::BadRequest("New password must not be empty".into()));
    }

    let row = sqlx::query_as::<_, (i64, Option<String>)>(
        "SELECT id, otp FROM employees WHERE email = ?",
    )
    .bind(payload.email.trim())
    .fetch_optional(pool.get_ref())
    .await?;

    let (employee_id, stored_otp) = match row {
        Some(r) => r,
        None => return Err(ApiError::NotFound("Invalid Email".into())),
    };

    match stored_otp {
        Some(code) if code == payload.otp => {}
        _ => return Err(ApiError::BadRequest("Invalid OTP".into())),
    }

    let hashed = hash_password(&payload.new_password);

    sqlx::query("UPDATE employees SET password_hash = ?, otp = NULL WHERE id = ?")
        .bind(&hashed)
        .bind(employee_id)
        .execute(pool.get_ref())
        .await?;

    info!(employee_id, "Password reset completed");

    Ok(HttpResponse::Ok().json(json!({ "message": "Password updated" })))
}
