use crate::auth::auth::AuthUser;
use crate::error::{ApiError, is_unique_violation};
use actix_web::{HttpResponse, web};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use sqlx::prelude::FromRow;
use std::collections::BTreeMap;
use tracing::error;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct AttendanceQuery {
    /// Range start; defaults to six days before `to`
    #[schema(example = "2024-05-01", format = "date", value_type = Option<String>)]
    pub from: Option<NaiveDate>,
    /// Range end; defaults to today
    #[schema(example = "2024-05-07", format = "date", value_type = Option<String>)]
    pub to: Option<NaiveDate>,
    pub employee_id: Option<i64>,
}

/// One record per employee over the requested range; `days` maps date to
/// the status code for that day.
#[derive(Serialize, ToSchema)]
pub struct AttendancePivotRow {
    pub employee_id: i64,
    pub employee_name: String,
    #[schema(value_type = Object)]
    pub days: BTreeMap<String, String>,
}

#[derive(FromRow)]
struct AttendanceRow {
    employee_id: i64,
    first_name: String,
    last_name: Option<String>,
    date: NaiveDate,
    status: String,
}

fn date_range(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    from.iter_days().take_while(|d| *d <= to).collect()
}

fn resolve_range(query: &AttendanceQuery) -> Result<(NaiveDate, NaiveDate), ApiError> {
    let to = query.to.unwrap_or_else(|| chrono::Local::now().date_naive());
    let from = query.from.unwrap_or(to - Duration::days(6));
    if from > to {
        return Err(ApiError::BadRequest("from must not be after to".into()));
    }
    Ok((from, to))
}

async fn fetch_pivot(
    pool: &SqlitePool,
    from: NaiveDate,
    to: NaiveDate,
    employee_id: Option<i64>,
) -> Result<Vec<AttendancePivotRow>, ApiError> {
    let mut sql = String::from(
        r#"
        SELECT a.employee_id, e.first_name, e.last_name, a.date, a.status
        FROM attendance a
        JOIN employees e ON e.id = a.employee_id
        WHERE a.date BETWEEN ? AND ?
        "#,
    );
    if employee_id.is_some() {
        sql.push_str(" AND a.employee_id = ?");
    }
    sql.push_str(" ORDER BY a.employee_id, a.date");

    let mut query = sqlx::query_as::<_, AttendanceRow>(&sql).bind(from).bind(to);
    if let Some(id) = employee_id {
        query = query.bind(id);
    }

    let rows = query.fetch_all(pool).await?;

    let mut pivot: Vec<AttendancePivotRow> = Vec::new();
    for row in rows {
        let name = match &row.last_name {
            Some(last) => format!("{} {}", row.first_name, last),
            None => row.first_name.clone(),
        };
        match pivot.last_mut() {
            Some(entry) if entry.employee_id == row.employee_id => {
                entry.days.insert(row.date.to_string(), row.status);
            }
            _ => {
                let mut days = BTreeMap::new();
                days.insert(row.date.to_string(), row.status);
                pivot.push(AttendancePivotRow {
                    employee_id: row.employee_id,
                    employee_name: name,
                    days,
                });
            }
        }
    }

    Ok(pivot)
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    responses(
        (status = 200, description = "Checked in"),
        (status = 400, description = "Already checked in today")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    let employee_id = auth.employee_id;

    let result = sqlx::query(
        r#"
        INSERT INTO attendance (employee_id, date, login_time, status)
        VALUES (?, date('now', 'localtime'), time('now', 'localtime'), 'P')
        "#,
    )
    .bind(employee_id)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => Ok(HttpResponse::Ok().json(json!({ "message": "Checked in successfully" }))),
        // One row per (employee, day); a second clock-in hits the unique key
        Err(e) if is_unique_violation(&e) => Err(ApiError::BadRequest(
            "Already checked in today".into(),
        )),
        Err(e) => {
            error!(error = %e, employee_id, "Check-in failed");
            Err(e.into())
        }
    }
}

/// Check-out endpoint
#[utoipa::path(
    put,
    path = "/api/attendance/check-out",
    responses(
        (status = 200, description = "Checked out"),
        (status = 400, description = "No active check-in found for today")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    let employee_id = auth.employee_id;

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET logout_time = time('now', 'localtime')
        WHERE employee_id = ?
        AND date = date('now', 'localtime')
        AND login_time IS NOT NULL
        AND logout_time IS NULL
        "#,
    )
    .bind(employee_id)
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::BadRequest(
            "No active check-in found for today".into(),
        ));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Checked out successfully" })))
}

/// Range listing, pivoted one-record-per-employee
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses((status = 200, description = "Pivoted attendance")),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    _auth: AuthUser,
    pool: web::Data<SqlitePool>,
    query: web::Query<AttendanceQuery>,
) -> Result<HttpResponse, ApiError> {
    let (from, to) = resolve_range(&query)?;
    let data = fetch_pivot(pool.get_ref(), from, to, query.employee_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "from": from,
        "to": to,
        "data": data
    })))
}

/// Same pivot as the listing, as a CSV attachment with one column per day.
#[utoipa::path(
    get,
    path = "/api/attendance/report",
    params(AttendanceQuery),
    responses((status = 200, description = "CSV report", body = String, content_type = "text/csv")),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn attendance_report(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    query: web::Query<AttendanceQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let (from, to) = resolve_range(&query)?;
    let pivot = fetch_pivot(pool.get_ref(), from, to, query.employee_id).await?;
    let dates = date_range(from, to);

    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["employee_id".to_string(), "employee_name".to_string()];
    header.extend(dates.iter().map(|d| d.to_string()));
    wtr.write_record(&header).map_err(|e| {
        error!(error = %e, "Failed to write CSV header");
        ApiError::Internal
    })?;

    for row in &pivot {
        let mut record = vec![row.employee_id.to_string(), row.employee_name.clone()];
        for d in &dates {
            record.push(row.days.get(&d.to_string()).cloned().unwrap_or_default());
        }
        wtr.write_record(&record).map_err(|e| {
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
            "attachment; filename=\"attendance-report.csv\"",
        ))
        .body(data))
}
