use crate::auth::auth::AuthUser;
use crate::error::{ApiError, is_unique_violation};
use crate::model::training::Training;
use crate::utils::db_utils::{build_update_sql, execute_update};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use sqlx::prelude::FromRow;
use tracing::{error, info};
use utoipa::ToSchema;

const TRAINING_UPDATE_COLUMNS: &[&str] = &[
    "name",
    "description",
    "trainer",
    "start_date",
    "end_date",
    "status",
];

#[derive(Deserialize, ToSchema)]
pub struct CreateTraining {
    #[schema(example = "Fire Safety")]
    pub name: String,
    pub description: Option<String>,
    pub trainer: Option<String>,
    #[schema(format = "date", value_type = Option<String>)]
    pub start_date: Option<NaiveDate>,
    #[schema(format = "date", value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
    pub status: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct RegisterTraining {
    pub employee_id: i64,
    pub training_id: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateRegistration {
    #[schema(example = "Completed")]
    pub status: String,
}

#[derive(Deserialize, ToSchema)]
pub struct TrainingQuery {
    pub status: Option<String>,
}

#[derive(FromRow)]
struct RegistrationReportRow {
    employee_code: Option<String>,
    first_name: String,
    last_name: Option<String>,
    training_name: String,
    status: String,
}

async fn insert_training(
    pool: &SqlitePool,
    t: &CreateTraining,
) -> Result<i64, ApiError> {
    let result = sqlx::query(
        r#"
        INSERT INTO trainings (name, description, trainer, start_date, end_date, status)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&t.name)
    .bind(&t.description)
    .bind(&t.trainer)
    .bind(t.start_date)
    .bind(t.end_date)
    .bind(t.status.as_deref().unwrap_or("Planned"))
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

#[utoipa::path(
    get,
    path = "/api/training",
    responses((status = 200, description = "Training list", body = [Training])),
    security(("bearer_auth" = [])),
    tag = "Training"
)]
pub async fn list_trainings(
    _auth: AuthUser,
    pool: web::Data<SqlitePool>,
    query: web::Query<TrainingQuery>,
) -> Result<HttpResponse, ApiError> {
    let trainings = match &query.status {
        Some(status) => {
            sqlx::query_as::<_, Training>(
                r#"
                SELECT id, name, description, trainer, start_date, end_date, status
                FROM trainings WHERE status = ? ORDER BY id DESC
                "#,
            )
            .bind(status)
            .fetch_all(pool.get_ref())
            .await?
        }
        None => {
            sqlx::query_as::<_, Training>(
                r#"
                SELECT id, name, description, trainer, start_date, end_date, status
                FROM trainings ORDER BY id DESC
                "#,
            )
            .fetch_all(pool.get_ref())
            .await?
        }
    };

    Ok(HttpResponse::Ok().json(trainings))
}

#[utoipa::path(
    post,
    path = "/api/training",
    request_body = CreateTraining,
    responses((status = 201, description = "Training created")),
    security(("bearer_auth" = [])),
    tag = "Training"
)]
pub async fn create_training(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    payload: web::Json<CreateTraining>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let id = insert_training(pool.get_ref(), &payload).await?;

    Ok(HttpResponse::Created().json(json!({ "message": "Training created", "id": id })))
}

#[utoipa::path(
    get,
    path = "/api/training/{training_id}",
    params(("training_id", Path, description = "Training ID")),
    responses(
        (status = 200, body = Training),
        (status = 404, description = "Training not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Training"
)]
pub async fn get_training(
    _auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let training_id = path.into_inner();

    let training = sqlx::query_as::<_, Training>(
        r#"
        SELECT id, name, description, trainer, start_date, end_date, status
        FROM trainings WHERE id = ?
        "#,
    )
    .bind(training_id)
    .fetch_optional(pool.get_ref())
    .await?;

    match training {
        Some(t) => Ok(HttpResponse::Ok().json(t)),
        None => Err(ApiError::NotFound("Training not found".into())),
    }
}

#[utoipa::path(
    put,
    path = "/api/training/{training_id}",
    params(("training_id", Path, description = "Training ID")),
    request_body = Object,
    responses(
        (status = 200, description = "Training updated"),
        (status = 404, description = "Training not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Training"
)]
pub async fn update_training(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let training_id = path.into_inner();

    let update = build_update_sql(
        "trainings",
        TRAINING_UPDATE_COLUMNS,
        &body,
        "id",
        training_id,
    )?;

    let affected = execute_update(pool.get_ref(), update).await?;

    if affected == 0 {
        return Err(ApiError::NotFound("Training not found".into()));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Training updated" })))
}

#[utoipa::path(
    delete,
    path = "/api/training/{training_id}",
    params(("training_id", Path, description = "Training ID")),
    responses(
        (status = 200, description = "Training deleted"),
        (status = 404, description = "Training not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Training"
)]
pub async fn delete_training(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let training_id = path.into_inner();

    let result = sqlx::query("DELETE FROM trainings WHERE id = ?")
        .bind(training_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Training not found".into()));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Training deleted" })))
}

/// Join-table registration; one row per (employee, training).
#[utoipa::path(
    post,
    path = "/api/training/register",
    request_body = RegisterTraining,
    responses(
        (status = 201, description = "Registered"),
        (status = 409, description = "Already registered")
    ),
    security(("bearer_auth" = [])),
    tag = "Training"
)]
pub async fn register_training(
    _auth: AuthUser,
    pool: web::Data<SqlitePool>,
    payload: web::Json<RegisterTraining>,
) -> Result<HttpResponse, ApiError> {
    let result = sqlx::query(
        "INSERT INTO employee_trainings (employee_id, training_id) VALUES (?, ?)",
    )
    .bind(payload.employee_id)
    .bind(payload.training_id)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(r) => Ok(HttpResponse::Created().json(json!({
            "message": "Registered",
            "id": r.last_insert_rowid()
        }))),
        Err(e) if is_unique_violation(&e) => Err(ApiError::Conflict(
            "Employee already registered for this training".into(),
        )),
        Err(e) => Err(e.into()),
    }
}

#[utoipa::path(
    put,
    path = "/api/training/register/{registration_id}",
    params(("registration_id", Path, description = "Registration ID")),
    request_body = UpdateRegistration,
    responses(
        (status = 200, description = "Registration updated"),
        (status = 404, description = "Registration not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Training"
)]
pub async fn update_registration(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    body: web::Json<UpdateRegistration>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let registration_id = path.into_inner();

    let result = sqlx::query("UPDATE employee_trainings SET status = ? WHERE id = ?")
        .bind(&body.status)
        .bind(registration_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Registration not found".into()));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Registration updated" })))
}

/// CSV bulk import of training programs, one transaction for the batch.
#[utoipa::path(
    post,
    path = "/api/training/csv",
    request_body(content = String, content_type = "text/csv"),
    responses(
        (status = 201, description = "Batch imported"),
        (status = 400, description = "Bad row, batch rolled back")
    ),
    security(("bearer_auth" = [])),
    tag = "Training"
)]
pub async fn import_trainings_csv(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    body: String,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for (i, record) in reader.deserialize::<CreateTraining>().enumerate() {
        let row_no = i + 1;
        let t = record.map_err(|e| {
            ApiError::BadRequest(format!("Invalid CSV at row {}: {}", row_no, e))
        })?;

        sqlx::query(
            r#"
            INSERT INTO trainings (name, description, trainer, start_date, end_date, status)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&t.name)
        .bind(&t.description)
        .bind(&t.trainer)
        .bind(t.start_date)
        .bind(t.end_date)
        .bind(t.status.as_deref().unwrap_or("Planned"))
        .execute(&mut *tx)
        .await?;
        inserted += 1;
    }

    if inserted == 0 {
        return Err(ApiError::BadRequest("CSV contained no rows".into()));
    }

    tx.commit().await?;

    info!(inserted, "Training CSV import complete");

    Ok(HttpResponse::Created().json(json!({
        "message": "Trainings imported",
        "inserted": inserted
    })))
}

/// Registration report, `text/csv` attachment.
#[utoipa::path(
    get,
    path = "/api/training/report",
    responses((status = 200, description = "CSV report", body = String, content_type = "text/csv")),
    security(("bearer_auth" = [])),
    tag = "Training"
)]
pub async fn training_report(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "employee_code",
        "employee_name",
        "training",
        "status",
    ])
    .map_err(|e| {
        error!(error = %e, "Failed to write CSV header");
        ApiError::Internal
    })?;

    let mut stream = sqlx::query_as::<_, RegistrationReportRow>(
        r#"
        SELECT e.employee_code, e.first_name, e.last_name,
               t.name AS training_name, et.status
        FROM employee_trainings et
        JOIN employees e ON e.id = et.employee_id
        JOIN trainings t ON t.id = et.training_id
        ORDER BY t.id, e.id
        "#,
    )
    .fetch(pool.get_ref());

    while let Some(row) = stream.next().await {
        let r = row?;
        let name = match &r.last_name {
            Some(last) => format!("{} {}", r.first_name, last),
            None => r.first_name.clone(),
        };
        wtr.write_record([
            r.employee_code.unwrap_or_default(),
            name,
            r.training_name,
            r.status,
        ])
        .map_err(|e| {
            error!(error = %e, "Failed to write CSV row");
            ApiError::Internal
        })?;
    }

    let data = wtr.into_inner().map_err(|e| {
        error!(error = %e, "Failed to finish CSV report");
        ApiError::Internal
    })?;

    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header((
            "Content-Disposition",
            "attachment; filename=\"training-report.csv\"",
        ))
        .body(data))
}
