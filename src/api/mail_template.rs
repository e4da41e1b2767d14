use crate::auth::auth::AuthUser;
use crate::error::{ApiError, is_unique_violation};
use crate::mailer::{Mailer, render_template};
use crate::model::email_template::{EmailTemplate, RecipientType};
use crate::utils::db_utils::{build_update_sql, execute_update};
use crate::utils::template_cache;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::{info, warn};
use utoipa::ToSchema;

const TEMPLATE_UPDATE_COLUMNS: &[&str] = &["name", "subject", "body_text", "body_html", "status"];

#[derive(Deserialize, ToSchema)]
pub struct CreateTemplate {
    #[schema(example = "leave-approved")]
    pub name: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct Recipient {
    #[schema(example = "john.doe@company.com")]
    pub email: String,
    #[serde(default = "default_recipient_type")]
    pub recipient_type: RecipientType,
    /// Per-recipient substitution fields
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

fn default_recipient_type() -> RecipientType {
    RecipientType::To
}

#[derive(Deserialize, ToSchema)]
pub struct SendMail {
    #[schema(example = "newsletter")]
    pub template_name: String,
    pub recipients: Vec<Recipient>,
}

#[utoipa::path(
    get,
    path = "/api/template",
    responses((status = 200, description = "Template list", body = [EmailTemplate])),
    security(("bearer_auth" = [])),
    tag = "Template"
)]
pub async fn list_templates(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let templates = sqlx::query_as::<_, EmailTemplate>(
        "SELECT id, name, subject, body_text, body_html, status FROM email_templates ORDER BY name",
    )
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(templates))
}

#[utoipa::path(
    post,
    path = "/api/template",
    request_body = CreateTemplate,
    responses(
        (status = 201, description = "Template created"),
        (status = 409, description = "Template name already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Template"
)]
pub async fn create_template(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    payload: web::Json<CreateTemplate>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let result = sqlx::query(
        r#"
        INSERT INTO email_templates (name, subject, body_text, body_html, status)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&payload.name)
    .bind(&payload.subject)
    .bind(&payload.body_text)
    .bind(&payload.body_html)
    .bind(payload.status.as_deref().unwrap_or("Active"))
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(r) => Ok(HttpResponse::Created().json(json!({
            "message": "Template created",
            "id": r.last_insert_rowid()
        }))),
        Err(e) if is_unique_violation(&e) => Err(ApiError::Conflict(format!(
            "Template '{}' already exists",
            payload.name
        ))),
        Err(e) => Err(e.into()),
    }
}

#[utoipa::path(
    put,
    path = "/api/template/{template_id}",
    params(("template_id", Path, description = "Template ID")),
    request_body = Object,
    responses(
        (status = 200, description = "Template updated"),
        (status = 404, description = "Template not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Template"
)]
pub async fn update_template(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let template_id = path.into_inner();

    // Cache is keyed by name; grab it before the row changes.
    let old_name = sqlx::query_scalar::<_, String>(
        "SELECT name FROM email_templates WHERE id = ?",
    )
    .bind(template_id)
    .fetch_optional(pool.get_ref())
    .await?;

    let old_name = match old_name {
        Some(n) => n,
        None => return Err(ApiError::NotFound("Template not found".into())),
    };

    let update = build_update_sql(
        "email_templates",
        TEMPLATE_UPDATE_COLUMNS,
        &body,
        "id",
        template_id,
    )?;
    let affected = execute_update(pool.get_ref(), update).await?;

    if affected == 0 {
        return Err(ApiError::NotFound("Template not found".into()));
    }

    template_cache::invalidate(&old_name).await;
    if let Some(new_name) = body.get("name").and_then(|v| v.as_str()) {
        template_cache::invalidate(new_name).await;
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Template updated" })))
}

/// Mail-merge send. The loop continues past individual failures and the
/// response carries the failed recipient list, so a partial failure is
/// visible to the caller.
#[utoipa::path(
    post,
    path = "/api/template/send-mail",
    request_body = SendMail,
    responses(
        (status = 200, description = "Merge finished; body lists failures"),
        (status = 404, description = "Template not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Template"
)]
pub async fn send_mail(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    mailer: web::Data<Mailer>,
    payload: web::Json<SendMail>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let template = template_cache::get(pool.get_ref(), &payload.template_name)
        .await?
        .ok_or_else(|| ApiError::NotFound("Template not found".into()))?;

    if template.status != "Active" {
        return Err(ApiError::BadRequest("Template is inactive".into()));
    }

    let cc: Vec<String> = payload
        .recipients
        .iter()
        .filter(|r| r.recipient_type == RecipientType::Cc)
        .map(|r| r.email.clone())
        .collect();

    let to_recipients: Vec<&Recipient> = payload
        .recipients
        .iter()
        .filter(|r| r.recipient_type == RecipientType::To)
        .collect();

    if to_recipients.is_empty() {
        return Err(ApiError::BadRequest("No 'to' recipients provided".into()));
    }

    let mut sent = 0usize;
    let mut failed: Vec<String> = Vec::new();

    for recipient in to_recipients {
        let mut vars = recipient.fields.clone();
        vars.entry("email".to_string())
            .or_insert_with(|| recipient.email.clone());

        let subject = render_template(&template.subject, &vars);
        let text = render_template(&template.body_text, &vars);
        let html = template
            .body_html
            .as_deref()
            .map(|h| render_template(h, &vars));

        match mailer
            .send(&recipient.email, &cc, &subject, &text, html.as_deref())
            .await
        {
            Ok(_) => sent += 1,
            Err(e) => {
                warn!(error = %e, email = %recipient.email, "Merge send failed");
                failed.push(recipient.email.clone());
            }
        }
    }

    info!(sent, failed = failed.len(), template = %payload.template_name, "Mail merge finished");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Mail merge finished",
        "sent": sent,
        "failed": failed
    })))
}
