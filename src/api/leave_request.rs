use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::mailer::{Mailer, render_template};
use crate::model::leave_request::{LeaveRequest, LeaveType};
use crate::model::role::Role;
use crate::utils::template_cache;
use actix_web::{HttpResponse, web};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use sqlx::prelude::FromRow;
use std::collections::HashMap;
use tracing::warn;
use utoipa::{IntoParams, ToSchema};

/// Hard monthly cap on approved non-medical leave days.
const MONTHLY_LEAVE_CAP: i64 = 2;

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "Casual")]
    pub leave_type: LeaveType,
    #[schema(example = "2024-05-10", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2024-05-11", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    /// Filter by employee ID
    pub employee_id: Option<i64>,
    #[schema(example = "Pending")]
    /// Filter by leave status
    pub status: Option<String>,
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    /// Pagination per page number
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

// Helper enum for typed SQLx binding
enum FilterValue {
    I64(i64),
    Str(String),
}

#[derive(FromRow)]
struct PendingLeave {
    employee_id: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

fn month_bounds(d: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = NaiveDate::from_ymd_opt(d.year(), d.month(), 1).unwrap();
    let next_first = if d.month() == 12 {
        NaiveDate::from_ymd_opt(d.year() + 1, 1, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(d.year(), d.month() + 1, 1).unwrap()
    };
    (first, next_first - Duration::days(1))
}

/// Days of [start, end] falling inside [month_start, month_end], inclusive.
fn days_within_month(
    start: NaiveDate,
    end: NaiveDate,
    month_start: NaiveDate,
    month_end: NaiveDate,
) -> i64 {
    let lo = start.max(month_start);
    let hi = end.min(month_end);
    if lo > hi {
        0
    } else {
        (hi - lo).num_days() + 1
    }
}

/// Send a templated notice, falling back to a fixed body when the template
/// row does not exist. Failures are the caller's to ignore or surface.
async fn send_notice(
    pool: &SqlitePool,
    mailer: &Mailer,
    template_name: &str,
    to: &str,
    fallback_subject: &str,
    fallback_body: &str,
    vars: &HashMap<String, String>,
) -> anyhow::Result<()> {
    match template_cache::get(pool, template_name).await? {
        Some(t) if t.status == "Active" => {
            let subject = render_template(&t.subject, vars);
            let text = render_template(&t.body_text, vars);
            let html = t.body_html.as_deref().map(|h| render_template(h, vars));
            mailer.send(to, &[], &subject, &text, html.as_deref()).await
        }
        _ => mailer.send(to, &[], fallback_subject, fallback_body, None).await,
    }
}

/* =========================
Apply for leave
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body = CreateLeave,
    responses(
        (status = 200, description = "Leave request submitted"),
        (status = 400, description = "Validation or balance failure")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    mailer: web::Data<Mailer>,
    payload: web::Json<CreateLeave>,
) -> Result<HttpResponse, ApiError> {
    let employee_id = auth.employee_id;

    if payload.start_date > payload.end_date {
        return Err(ApiError::BadRequest(
            "start_date cannot be after end_date".into(),
        ));
    }

    // Monthly cap applies to everything except medical leave, computed over
    // approved requests in the month of the requested start date.
    if payload.leave_type.counts_against_cap() {
        let (month_start, month_end) = month_bounds(payload.start_date);

        let approved = sqlx::query_as::<_, (NaiveDate, NaiveDate)>(
            r#"
            SELECT start_date, end_date
            FROM leave_requests
            WHERE employee_id = ?
            AND status = 'Approved'
            AND leave_type != 'Medical'
            AND start_date <= ?
            AND end_date >= ?
            "#,
        )
        .bind(employee_id)
        .bind(month_end)
        .bind(month_start)
        .fetch_all(pool.get_ref())
        .await?;

        let existing: i64 = approved
            .iter()
            .map(|(s, e)| days_within_month(*s, *e, month_start, month_end))
            .sum();

        let requested = days_within_month(
            payload.start_date,
            payload.end_date,
            month_start,
            month_end,
        );

        if existing >= MONTHLY_LEAVE_CAP {
            return Err(ApiError::BadRequest(
                "Leave balance exhausted for this month".into(),
            ));
        }
        if existing + requested > MONTHLY_LEAVE_CAP {
            let remaining = MONTHLY_LEAVE_CAP - existing;
            let msg = if remaining == 1 {
                "Only one day of leave remaining this month".to_string()
            } else {
                format!("Only {} days of leave remaining this month", remaining)
            };
            return Err(ApiError::BadRequest(msg));
        }
    }

    sqlx::query(
        r#"
        INSERT INTO leave_requests (employee_id, leave_type, start_date, end_date, reason)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(payload.leave_type.to_string())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(&payload.reason)
    .execute(pool.get_ref())
    .await?;

    // Notify HR, best-effort
    let hr_emails = sqlx::query_scalar::<_, String>(
        r#"
        SELECT e.email
        FROM employees e
        JOIN employee_roles er ON er.employee_id = e.id
        WHERE er.role_id = ? AND e.status = 'Active'
        "#,
    )
    .bind(Role::Hr.id())
    .fetch_all(pool.get_ref())
    .await?;

    let vars = HashMap::from([
        ("name".to_string(), auth.display_name.clone()),
        ("leave_type".to_string(), payload.leave_type.to_string()),
        ("start_date".to_string(), payload.start_date.to_string()),
        ("end_date".to_string(), payload.end_date.to_string()),
    ]);
    let fallback = format!(
        "{} applied for {} leave from {} to {}.",
        auth.display_name, payload.leave_type, payload.start_date, payload.end_date
    );
    for email in hr_emails {
        if let Err(e) = send_notice(
            pool.get_ref(),
            &mailer,
            "leave-applied",
            &email,
            "Leave request submitted",
            &fallback,
            &vars,
        )
        .await
        {
            warn!(error = %e, email, "Failed to notify HR of leave request");
        }
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave request submitted",
        "status": "Pending"
    })))
}

/* =========================
Approve leave (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(("leave_id" = i64, Path, description = "ID of the leave request to approve")),
    responses(
        (status = 200, description = "Leave approved"),
        (status = 400, description = "Leave request not found or already processed")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    mailer: web::Data<Mailer>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let leave_id = path.into_inner();

    let mut tx = pool.begin().await?;

    let leave = sqlx::query_as::<_, PendingLeave>(
        r#"
        SELECT employee_id, start_date, end_date
        FROM leave_requests
        WHERE id = ? AND status = 'Pending'
        "#,
    )
    .bind(leave_id)
    .fetch_optional(&mut *tx)
    .await?;

    let leave = match leave {
        Some(l) => l,
        None => {
            return Err(ApiError::BadRequest(
                "Leave request not found or already processed".into(),
            ));
        }
    };

    sqlx::query("UPDATE leave_requests SET status = 'Approved' WHERE id = ?")
        .bind(leave_id)
        .execute(&mut *tx)
        .await?;

    // One attendance `L` row per calendar day, inclusive. The upsert keeps a
    // replay or an existing row from duplicating days.
    let mut day = leave.start_date;
    while day <= leave.end_date {
        sqlx::query(
            r#"
            INSERT INTO attendance (employee_id, date, status)
            VALUES (?, ?, 'L')
            ON CONFLICT (employee_id, date)
            DO UPDATE SET status = 'L'
            "#,
        )
        .bind(leave.employee_id)
        .bind(day)
        .execute(&mut *tx)
        .await?;
        day = day + Duration::days(1);
    }

    tx.commit().await?;

    notify_decision(pool.get_ref(), &mailer, &leave, "leave-approved", "Approved").await;

    Ok(HttpResponse::Ok().json(json!({ "message": "Leave approved" })))
}

/* =========================
Reject leave (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(("leave_id" = i64, Path, description = "ID of the leave request to reject")),
    responses(
        (status = 200, description = "Leave rejected"),
        (status = 400, description = "Leave request not found or already processed")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    mailer: web::Data<Mailer>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let leave_id = path.into_inner();

    let leave = sqlx::query_as::<_, PendingLeave>(
        r#"
        SELECT employee_id, start_date, end_date
        FROM leave_requests
        WHERE id = ? AND status = 'Pending'
        "#,
    )
    .bind(leave_id)
    .fetch_optional(pool.get_ref())
    .await?;

    let leave = match leave {
        Some(l) => l,
        None => {
            return Err(ApiError::BadRequest(
                "Leave request not found or already processed".into(),
            ));
        }
    };

    let result = sqlx::query(
        "UPDATE leave_requests SET status = 'Rejected' WHERE id = ? AND status = 'Pending'",
    )
    .bind(leave_id)
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::BadRequest(
            "Leave request not found or already processed".into(),
        ));
    }

    notify_decision(pool.get_ref(), &mailer, &leave, "leave-rejected", "Rejected").await;

    Ok(HttpResponse::Ok().json(json!({ "message": "Leave rejected" })))
}

/// Mails the employee about an approve/reject decision; failures are logged,
/// the decision itself already committed.
async fn notify_decision(
    pool: &SqlitePool,
    mailer: &Mailer,
    leave: &PendingLeave,
    template_name: &str,
    decision: &str,
) {
    let employee = sqlx::query_as::<_, (String, String)>(
        "SELECT email, first_name FROM employees WHERE id = ?",
    )
    .bind(leave.employee_id)
    .fetch_optional(pool)
    .await;

    let (email, first_name) = match employee {
        Ok(Some(e)) => e,
        Ok(None) => return,
        Err(e) => {
            warn!(error = %e, "Failed to look up employee for leave notice");
            return;
        }
    };

    let vars = HashMap::from([
        ("name".to_string(), first_name.clone()),
        ("decision".to_string(), decision.to_string()),
        ("start_date".to_string(), leave.start_date.to_string()),
        ("end_date".to_string(), leave.end_date.to_string()),
    ]);
    let fallback = format!(
        "Hi {}, your leave from {} to {} has been {}.",
        first_name,
        leave.start_date,
        leave.end_date,
        decision.to_lowercase()
    );

    if let Err(e) = send_notice(
        pool,
        mailer,
        template_name,
        &email,
        &format!("Leave {}", decision),
        &fallback,
        &vars,
    )
    .await
    {
        warn!(error = %e, email, "Failed to send leave decision mail");
    }
}

/// for getting a leave application details endpoint
#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(("leave_id" = i64, Path, description = "ID of the leave request to fetch")),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let leave_id = path.into_inner();

    let leave = sqlx::query_as::<_, LeaveRequest>(
        r#"
        SELECT id, employee_id, leave_type, start_date, end_date, reason, status, applied_at
        FROM leave_requests
        WHERE id = ?
        "#,
    )
    .bind(leave_id)
    .fetch_optional(pool.get_ref())
    .await?;

    match leave {
        Some(data) => Ok(HttpResponse::Ok().json(data)),
        None => Err(ApiError::NotFound("Leave request not found".into())),
    }
}

/// for getting leave applications endpoint
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses((status = 200, description = "Paginated leave list", body = LeaveListResponse)),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    query: web::Query<LeaveFilter>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    // -------------------------
    // Pagination
    // -------------------------
    let per_page = query.per_page.unwrap_or(10).min(100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    // -------------------------
    // WHERE clause
    // -------------------------
    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(emp_id) = query.employee_id {
        where_sql.push_str(" AND employee_id = ?");
        args.push(FilterValue::I64(emp_id));
    }

    if let Some(status) = query.status.as_deref() {
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status.to_string()));
    }

    // -------------------------
    // COUNT query
    // -------------------------
    let count_sql = format!("SELECT COUNT(*) FROM leave_requests{}", where_sql);

    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::I64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(s.clone()),
        };
    }

    let total = count_q.fetch_one(pool.get_ref()).await?;

    // -------------------------
    // DATA query
    // -------------------------
    let data_sql = format!(
        r#"
        SELECT id, employee_id, leave_type, start_date, end_date, reason, status, applied_at
        FROM leave_requests
        {}
        ORDER BY applied_at DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, LeaveRequest>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::I64(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
        };
    }

    let leaves = data_q
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data: leaves,
        page,
        per_page,
        total,
    }))
}
