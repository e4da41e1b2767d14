use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::model::payroll::Payroll;
use crate::utils::payslip::{PayslipData, generate_payslip_pdf, is_valid_pay_period};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use sqlx::prelude::FromRow;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct PayrollUploadRow {
    #[schema(example = 1)]
    pub employee_id: i64,
    /// Free-text month token, "Mon YYYY"
    #[schema(example = "Jan 2024")]
    pub pay_period: String,
    #[schema(example = 40000.0)]
    pub basic: f64,
    #[serde(default)]
    pub hra: f64,
    #[serde(default)]
    pub allowances: f64,
    #[serde(default)]
    pub deductions: f64,
}

#[derive(Deserialize, ToSchema)]
pub struct UploadPayroll {
    pub rows: Vec<PayrollUploadRow>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct PayrollQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedPayrollResponse {
    pub data: Vec<Payroll>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(FromRow)]
struct PayslipEmployee {
    first_name: String,
    last_name: Option<String>,
    employee_code: Option<String>,
    designation: Option<String>,
    location: Option<String>,
    pan_number: Option<String>,
}

/// Batch payroll upload. The whole batch runs in one transaction: a single
/// bad row (unknown employee, malformed pay period) persists nothing.
#[utoipa::path(
    post,
    path = "/api/payroll/upload",
    request_body = UploadPayroll,
    responses(
        (status = 201, description = "Batch stored with generated payslips"),
        (status = 400, description = "Invalid row, batch rolled back")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn upload_payroll(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    payload: web::Json<UploadPayroll>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    if payload.rows.is_empty() {
        return Err(ApiError::BadRequest("No payroll rows provided".into()));
    }

    let mut tx = pool.begin().await?;

    for (i, row) in payload.rows.iter().enumerate() {
        let row_no = i + 1;

        if !is_valid_pay_period(&row.pay_period) {
            return Err(ApiError::BadRequest(format!(
                "Invalid pay period '{}' at row {}: expected format 'Mon YYYY' (e.g. 'Jan 2024')",
                row.pay_period, row_no
            )));
        }

        let employee = sqlx::query_as::<_, PayslipEmployee>(
            r#"
            SELECT e.first_name, e.last_name, e.employee_code,
                   e.designation, e.location, p.pan_number
            FROM employees e
            LEFT JOIN employee_personal p ON p.employee_id = e.id
            WHERE e.id = ?
            "#,
        )
        .bind(row.employee_id)
        .fetch_optional(&mut *tx)
        .await?;

        let employee = match employee {
            Some(e) => e,
            None => {
                return Err(ApiError::BadRequest(format!(
                    "Unknown employee id {} at row {}",
                    row.employee_id, row_no
                )));
            }
        };

        let net_salary = row.basic + row.hra + row.allowances - row.deductions;

        let employee_name = match &employee.last_name {
            Some(last) => format!("{} {}", employee.first_name, last),
            None => employee.first_name.clone(),
        };

        let pdf = generate_payslip_pdf(&PayslipData {
            employee_name,
            employee_code: employee.employee_code.unwrap_or_default(),
            designation: employee.designation.unwrap_or_default(),
            location: employee.location.unwrap_or_default(),
            pan_number: employee.pan_number.unwrap_or_default(),
            pay_period: row.pay_period.clone(),
            basic: row.basic,
            hra: row.hra,
            allowances: row.allowances,
            deductions: row.deductions,
            net_salary,
        })
        .map_err(|e| {
            error!(error = %e, employee_id = row.employee_id, "Payslip rendering failed");
            ApiError::Internal
        })?;

        sqlx::query(
            r#"
            INSERT INTO payroll
                (employee_id, pay_period, basic, hra, allowances, deductions,
                 net_salary, payslip_attachment)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.employee_id)
        .bind(&row.pay_period)
        .bind(row.basic)
        .bind(row.hra)
        .bind(row.allowances)
        .bind(row.deductions)
        .bind(net_salary)
        .bind(pdf)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    info!(rows = payload.rows.len(), "Payroll batch stored");

    Ok(HttpResponse::Created().json(json!({
        "message": "Payroll uploaded",
        "inserted": payload.rows.len()
    })))
}

#[utoipa::path(
    get,
    path = "/api/payroll",
    params(PayrollQuery),
    responses((status = 200, body = PaginatedPayrollResponse)),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payrolls(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    query: web::Query<PayrollQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let (count_sql, data_sql) = if query.employee_id.is_some() {
        (
            "SELECT COUNT(*) FROM payroll WHERE employee_id = ?",
            r#"
            SELECT id, employee_id, pay_period, basic, hra, allowances,
                   deductions, net_salary, created_at
            FROM payroll
            WHERE employee_id = ?
            ORDER BY id DESC
            LIMIT ? OFFSET ?
            "#,
        )
    } else {
        (
            "SELECT COUNT(*) FROM payroll",
            r#"
            SELECT id, employee_id, pay_period, basic, hra, allowances,
                   deductions, net_salary, created_at
            FROM payroll
            ORDER BY id DESC
            LIMIT ? OFFSET ?
            "#,
        )
    };

    let mut count_q = sqlx::query_scalar::<_, i64>(count_sql);
    let mut data_q = sqlx::query_as::<_, Payroll>(data_sql);
    if let Some(id) = query.employee_id {
        count_q = count_q.bind(id);
        data_q = data_q.bind(id);
    }

    let total = count_q.fetch_one(pool.get_ref()).await?;
    let data = data_q
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(PaginatedPayrollResponse {
        data,
        page,
        per_page,
        total,
    }))
}

/// Streams the stored payslip PDF inline.
#[utoipa::path(
    get,
    path = "/api/payroll/payslip/{payroll_id}",
    params(("payroll_id", Path, description = "Payroll ID")),
    responses(
        (status = 200, description = "PDF payslip", body = String, content_type = "application/pdf"),
        (status = 404, description = "Payroll or payslip not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payslip(
    _auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let payroll_id = path.into_inner();

    let row = sqlx::query_scalar::<_, Option<Vec<u8>>>(
        "SELECT payslip_attachment FROM payroll WHERE id = ?",
    )
    .bind(payroll_id)
    .fetch_optional(pool.get_ref())
    .await?;

    let bytes = match row {
        None => return Err(ApiError::NotFound("Payroll not found".into())),
        Some(None) => return Err(ApiError::NotFound("Payslip not generated".into())),
        Some(Some(bytes)) => bytes,
    };

    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header((
            "Content-Disposition",
            format!("inline; filename=\"payslip-{}.pdf\"", payroll_id),
        ))
        .body(bytes))
}
