use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::model::cv::CvRecord;
use crate::utils::db_utils::{build_update_sql, execute_update};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use utoipa::{IntoParams, ToSchema};

const CV_UPDATE_COLUMNS: &[&str] = &[
    "candidate_name",
    "email",
    "phone",
    "position_applied",
    "experience_years",
    "skills",
    "active_status",
    "status",
    "shortlisted_for_future",
];

#[derive(Deserialize, ToSchema)]
pub struct CreateCv {
    #[schema(example = "Priya Sharma")]
    pub candidate_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position_applied: Option<String>,
    pub experience_years: Option<f64>,
    pub skills: Option<String>,
}

/// Pipeline filters, applied server-side.
#[derive(Deserialize, IntoParams, ToSchema)]
pub struct CvQuery {
    #[schema(example = "Accepted")]
    pub status: Option<String>,
    #[schema(example = "Active")]
    pub active_status: Option<String>,
    #[schema(example = "Yes")]
    pub shortlisted_for_future: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct CvListResponse {
    pub data: Vec<CvRecord>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[utoipa::path(
    get,
    path = "/api/cv",
    params(CvQuery),
    responses((status = 200, description = "Candidate list", body = CvListResponse)),
    security(("bearer_auth" = [])),
    tag = "CV"
)]
pub async fn list_cvs(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    query: web::Query<CvQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<String> = Vec::new();

    if let Some(status) = &query.status {
        where_sql.push_str(" AND status = ?");
        args.push(status.clone());
    }
    if let Some(active) = &query.active_status {
        where_sql.push_str(" AND active_status = ?");
        args.push(active.clone());
    }
    if let Some(shortlisted) = &query.shortlisted_for_future {
        where_sql.push_str(" AND shortlisted_for_future = ?");
        args.push(shortlisted.clone());
    }

    let count_sql = format!("SELECT COUNT(*) FROM cv_database{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = count_q.bind(arg.clone());
    }
    let total = count_q.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        r#"
        SELECT id, candidate_name, email, phone, position_applied,
               experience_years, skills, active_status, status,
               shortlisted_for_future, created_at
        FROM cv_database
        {}
        ORDER BY id DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );
    let mut data_q = sqlx::query_as::<_, CvRecord>(&data_sql);
    for arg in args {
        data_q = data_q.bind(arg);
    }

    let data = data_q
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(CvListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    post,
    path = "/api/cv",
    request_body = CreateCv,
    responses((status = 201, description = "Candidate added")),
    security(("bearer_auth" = [])),
    tag = "CV"
)]
pub async fn create_cv(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    payload: web::Json<CreateCv>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let result = sqlx::query(
        r#"
        INSERT INTO cv_database
            (candidate_name, email, phone, position_applied, experience_years, skills)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&payload.candidate_name)
    .bind(&payload.email)
    .bind(&payload.phone)
    .bind(&payload.position_applied)
    .bind(payload.experience_years)
    .bind(&payload.skills)
    .execute(pool.get_ref())
    .await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Candidate added",
        "id": result.last_insert_rowid()
    })))
}

#[utoipa::path(
    put,
    path = "/api/cv/{cv_id}",
    params(("cv_id", Path, description = "Candidate ID")),
    request_body = Object,
    responses(
        (status = 200, description = "Candidate updated"),
        (status = 404, description = "Candidate not found")
    ),
    security(("bearer_auth" = [])),
    tag = "CV"
)]
pub async fn update_cv(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let cv_id = path.into_inner();

    let update = build_update_sql("cv_database", CV_UPDATE_COLUMNS, &body, "id", cv_id)?;

    let affected = execute_update(pool.get_ref(), update).await?;

    if affected == 0 {
        return Err(ApiError::NotFound("Candidate not found".into()));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Candidate updated" })))
}
