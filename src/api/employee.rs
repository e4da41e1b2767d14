use crate::{
    auth::auth::AuthUser,
    auth::password::hash_password,
    error::{ApiError, is_unique_violation},
    model::employee::{Employee, EmployeePersonal, EmployeeStatus},
    model::role::Role,
    utils::db_utils::{build_update_sql, execute_update},
};
use actix_web::{HttpResponse, web};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::NaiveDate;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, error, info};
use utoipa::ToSchema;

/// Columns a partial update may touch.
const EMPLOYEE_UPDATE_COLUMNS: &[&str] = &[
    "employee_code",
    "first_name",
    "last_name",
    "email",
    "phone",
    "department",
    "designation",
    "location",
    "salary",
    "date_of_joining",
    "resignation_date",
    "relieving_date",
];

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "EMP-001")]
    pub employee_code: Option<String>,
    #[schema(example = "John")]
    pub first_name: String,
    #[schema(example = "Doe")]
    pub last_name: Option<String>,
    #[schema(example = "john.doe@company.com", format = "email")]
    pub email: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub location: Option<String>,
    pub salary: Option<f64>,
    #[schema(example = "2024-01-01", format = "date", value_type = Option<String>)]
    pub date_of_joining: Option<NaiveDate>,
    pub password: Option<String>,
    #[schema(example = "Employee")]
    pub role: Role,

    // Personal sub-record; both the form and CSV paths accept the identity
    // document fields.
    pub present_address: Option<String>,
    pub permanent_address: Option<String>,
    #[schema(format = "date", value_type = Option<String>)]
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

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub department: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeDetail {
    pub employee: Employee,
    pub personal: Option<EmployeePersonal>,
    #[schema(example = "Employee")]
    pub role: Option<String>,
    /// Photograph BLOB, base64-encoded
    pub photograph: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateStatus {
    pub status: EmployeeStatus,
}

#[derive(Deserialize, ToSchema)]
pub struct UploadPhoto {
    /// Base64-encoded image bytes
    pub photo: String,
}

/// Inserts employee + personal + role rows. Callers own the transaction, so
/// the form path and every CSV row share one insert path.
async fn insert_employee(
    tx: &mut Transaction<'_, Sqlite>,
    emp: &CreateEmployee,
) -> Result<i64, ApiError> {
    let password_hash = emp.password.as_deref().map(hash_password);

    let result = sqlx::query(
        r#"
        INSERT INTO employees
            (employee_code, first_name, last_name, email, phone, department,
             designation, location, salary, date_of_joining, status, password_hash)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'Active', ?)
        "#,
    )
    .bind(&emp.employee_code)
    .bind(&emp.first_name)
    .bind(&emp.last_name)
    .bind(emp.email.trim())
    .bind(&emp.phone)
    .bind(&emp.department)
    .bind(&emp.designation)
    .bind(&emp.location)
    .bind(emp.salary)
    .bind(emp.date_of_joining)
    .bind(password_hash)
    .execute(&mut **tx)
    .await;

    let result = match result {
        Ok(r) => r,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::Conflict(format!(
                "Employee with email {} already exists",
                emp.email
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let employee_id = result.last_insert_rowid();

    sqlx::query(
        r#"
        INSERT INTO employee_personal
            (employee_id, present_address, permanent_address, date_of_birth,
             blood_group, father_name, mother_name, spouse_name,
             emergency_contact, aadhar_number, pan_number, voter_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(&emp.present_address)
    .bind(&emp.permanent_address)
    .bind(emp.date_of_birth)
    .bind(&emp.blood_group)
    .bind(&emp.father_name)
    .bind(&emp.mother_name)
    .bind(&emp.spouse_name)
    .bind(&emp.emergency_contact)
    .bind(&emp.aadhar_number)
    .bind(&emp.pan_number)
    .bind(&emp.voter_id)
    .execute(&mut **tx)
    .await?;

    sqlx::query("INSERT INTO employee_roles (employee_id, role_id) VALUES (?, ?)")
        .bind(employee_id)
        .bind(emp.role.id())
        .execute(&mut **tx)
        .await?;

    Ok(employee_id)
}

/// Create Employee (form path)
#[utoipa::path(
    post,
    path = "/api/employee",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created"),
        (status = 409, description = "Email already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    payload: web::Json<CreateEmployee>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let mut tx = pool.begin().await?;
    let employee_id = insert_employee(&mut tx, &payload).await?;
    tx.commit().await?;

    info!(employee_id, "Employee created");

    Ok(HttpResponse::Created().json(json!({
        "message": "Employee created",
        "id": employee_id
    })))
}

/// CSV bulk import. One transaction for the batch: the first bad row rolls
/// everything back.
#[utoipa::path(
    post,
    path = "/api/employee/csv",
    request_body(content = String, content_type = "text/csv"),
    responses(
        (status = 201, description = "Batch imported"),
        (status = 400, description = "Bad row, batch rolled back")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn import_employees_csv(
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

    for (i, record) in reader.deserialize::<CreateEmployee>().enumerate() {
        let row_no = i + 1;
        let emp = record.map_err(|e| {
            ApiError::BadRequest(format!("Invalid CSV at row {}: {}", row_no, e))
        })?;

        insert_employee(&mut tx, &emp)
            .await
            .map_err(|e| match e {
                ApiError::Conflict(msg) => {
                    ApiError::BadRequest(format!("Row {}: {}", row_no, msg))
                }
                other => other,
            })?;
        inserted += 1;
    }

    if inserted == 0 {
        return Err(ApiError::BadRequest("CSV contained no rows".into()));
    }

    tx.commit().await?;

    info!(inserted, "Employee CSV import complete");

    Ok(HttpResponse::Created().json(json!({
        "message": "Employees imported",
        "inserted": inserted
    })))
}

#[utoipa::path(
    get,
    path = "/api/employee",
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn list_employees(
    _auth: AuthUser,
    pool: web::Data<SqlitePool>,
    query: web::Query<EmployeeQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    // ---------- build WHERE clause dynamically ----------
    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(department) = &query.department {
        conditions.push("department = ?");
        bindings.push(department.clone());
    }

    if let Some(status) = &query.status {
        conditions.push("status = ?");
        bindings.push(status.clone());
    }

    if let Some(search) = &query.search {
        conditions.push("(first_name LIKE ? OR last_name LIKE ? OR email LIKE ?)");
        let like = format!("%{}%", search);
        bindings.push(like.clone());
        bindings.push(like.clone());
        bindings.push(like);
    }

    let where_clause = if conditions.is_empty() {
        "".to_string()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) FROM employees {}", where_clause);
    debug!(sql = %count_sql, "Counting employees");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = count_query.bind(b.clone());
    }

    let total = count_query.fetch_one(pool.get_ref()).await?;

    // ---------- data query ----------
    let data_sql = format!(
        r#"
        SELECT id, employee_code, first_name, last_name, email, phone,
               department, designation, location, salary, date_of_joining,
               resignation_date, relieving_date, status, created_at
        FROM employees {} ORDER BY id DESC LIMIT ? OFFSET ?
        "#,
        where_clause
    );

    let mut data_query = sqlx::query_as::<_, Employee>(&data_sql);
    for b in &bindings {
        data_query = data_query.bind(b.clone());
    }
    data_query = data_query.bind(per_page as i64).bind(offset as i64);

    let employees = data_query.fetch_all(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page,
        per_page,
        total,
    }))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employee/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = EmployeeDetail),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn get_employee(
    _auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let employee_id = path.into_inner();

    let employee = sqlx::query_as::<_, Employee>(
        r#"
        SELECT id, employee_code, first_name, last_name, email, phone,
               department, designation, location, salary, date_of_joining,
               resignation_date, relieving_date, status, created_at
        FROM employees
        WHERE id = ?
        "#,
    )
    .bind(employee_id)
    .fetch_optional(pool.get_ref())
    .await?;

    let employee = match employee {
        Some(e) => e,
        None => return Err(ApiError::NotFound("Employee not found".into())),
    };

    let personal = sqlx::query_as::<_, EmployeePersonal>(
        r#"
        SELECT employee_id, present_address, permanent_address, date_of_birth,
               blood_group, father_name, mother_name, spouse_name,
               emergency_contact, aadhar_number, pan_number, voter_id
        FROM employee_personal
        WHERE employee_id = ?
        "#,
    )
    .bind(employee_id)
    .fetch_optional(pool.get_ref())
    .await?;

    let role = sqlx::query_scalar::<_, String>(
        r#"
        SELECT r.name
        FROM roles r
        JOIN employee_roles er ON er.role_id = r.id
        WHERE er.employee_id = ?
        "#,
    )
    .bind(employee_id)
    .fetch_optional(pool.get_ref())
    .await?;

    let photograph = sqlx::query_scalar::<_, Option<Vec<u8>>>(
        "SELECT photograph FROM employees WHERE id = ?",
    )
    .bind(employee_id)
    .fetch_one(pool.get_ref())
    .await?
    .map(|bytes| BASE64.encode(bytes));

    Ok(HttpResponse::Ok().json(EmployeeDetail {
        employee,
        personal,
        role,
        photograph,
    }))
}

/// Partial update; unknown columns are rejected before any SQL runs.
#[utoipa::path(
    put,
    path = "/api/employee/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    request_body = Object,
    responses(
        (status = 200, description = "Employee updated"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let employee_id = path.into_inner();

    let update = build_update_sql(
        "employees",
        EMPLOYEE_UPDATE_COLUMNS,
        &body,
        "id",
        employee_id,
    )?;

    let affected = execute_update(pool.get_ref(), update).await?;

    if affected == 0 {
        return Err(ApiError::NotFound("Employee not found".into()));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Employee updated" })))
}

/// Active/Inactive toggle
#[utoipa::path(
    put,
    path = "/api/employee/{employee_id}/status",
    params(("employee_id", Path, description = "Employee ID")),
    request_body = UpdateStatus,
    responses(
        (status = 200, description = "Status updated"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn update_status(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    body: web::Json<UpdateStatus>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let employee_id = path.into_inner();

    let result = sqlx::query("UPDATE employees SET status = ? WHERE id = ?")
        .bind(body.status.to_string())
        .bind(employee_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Employee not found".into()));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Status updated" })))
}

#[utoipa::path(
    put,
    path = "/api/employee/{employee_id}/photo",
    params(("employee_id", Path, description = "Employee ID")),
    request_body = UploadPhoto,
    responses(
        (status = 200, description = "Photo stored"),
        (status = 400, description = "Invalid base64 payload"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn upload_photo(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    body: web::Json<UploadPhoto>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let employee_id = path.into_inner();

    let bytes = BASE64
        .decode(body.photo.as_bytes())
        .map_err(|_| ApiError::BadRequest("Photo must be valid base64".into()))?;

    let result = sqlx::query("UPDATE employees SET photograph = ? WHERE id = ?")
        .bind(bytes)
        .bind(employee_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Employee not found".into()));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Photo stored" })))
}

#[utoipa::path(
    delete,
    path = "/api/employee/{employee_id}/photo",
    params(("employee_id", Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Photo removed"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn remove_photo(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let employee_id = path.into_inner();

    let result = sqlx::query("UPDATE employees SET photograph = NULL WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Employee not found".into()));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Photo removed" })))
}

/// Roster export, `text/csv` attachment.
#[utoipa::path(
    get,
    path = "/api/employee/report",
    responses((status = 200, description = "CSV roster", body = String, content_type = "text/csv")),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn employee_report(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "id",
        "employee_code",
        "first_name",
        "last_name",
        "email",
        "phone",
        "department",
        "designation",
        "location",
        "date_of_joining",
        "status",
    ])
    .map_err(|e| {
        error!(error = %e, "Failed to write CSV header");
        ApiError::Internal
    })?;

    let mut stream = sqlx::query_as::<_, Employee>(
        r#"
        SELECT id, employee_code, first_name, last_name, email, phone,
               department, designation, location, salary, date_of_joining,
               resignation_date, relieving_date, status, created_at
        FROM employees
        ORDER BY id
        "#,
    )
    .fetch(pool.get_ref());

    while let Some(row) = stream.next().await {
        let e = row?;
        wtr.write_record([
            e.id.to_string(),
            e.employee_code.unwrap_or_default(),
            e.first_name,
            e.last_name.unwrap_or_default(),
            e.email,
            e.phone.unwrap_or_default(),
            e.department.unwrap_or_default(),
            e.designation.unwrap_or_default(),
            e.location.unwrap_or_default(),
            e.date_of_joining.map(|d| d.to_string()).unwrap_or_default(),
            e.status,
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
            "attachment; filename=\"employee-report.csv\"",
        ))
        .body(data))
}
