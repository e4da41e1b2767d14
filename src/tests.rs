//! End-to-end handler tests against an in-memory database.

use crate::auth::jwt::generate_access_token;
use crate::auth::password::hash_password;
use crate::config::Config;
use crate::mailer::Mailer;
use crate::model::role::Role;
use crate::routes;
use crate::utils::template_cache;
use actix_web::web::Data;
use actix_web::{App, test};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

/// Each sqlite connection gets its own `:memory:` database, so the pool is
/// capped at a single connection.
async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

macro_rules! test_app {
    ($pool:expr) => {{
        let config = Config::for_tests();
        let config_data = config.clone();
        test::init_service(
            App::new()
                .app_data(Data::new($pool.clone()))
                .app_data(Data::new(config))
                .app_data(Data::new(Mailer::disabled()))
                .configure(|cfg| routes::configure(cfg, config_data.clone())),
        )
        .await
    }};
}

async fn seed_employee(pool: &SqlitePool, email: &str, password: &str, role: Role) -> i64 {
    let result = sqlx::query(
        r#"
        INSERT INTO employees
            (first_name, last_name, email, designation, location, status, password_hash)
        VALUES ('Test', 'User', ?, 'Engineer', 'Pune', 'Active', ?)
        "#,
    )
    .bind(email)
    .bind(hash_password(password))
    .execute(pool)
    .await
    .unwrap();
    let id = result.last_insert_rowid();

    sqlx::query("INSERT INTO employee_personal (employee_id, pan_number) VALUES (?, 'ABCDE1234F')")
        .bind(id)
        .execute(pool)
        .await
        .unwrap();

    sqlx::query("INSERT INTO employee_roles (employee_id, role_id) VALUES (?, ?)")
        .bind(id)
        .bind(role.id())
        .execute(pool)
        .await
        .unwrap();

    id
}

fn token_for(employee_id: i64, role: Role) -> String {
    generate_access_token(employee_id, "Test User".into(), role, "test-secret", 900)
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

/// The rate limiter keys on peer IP, which TestRequest does not set by
/// default.
fn peer() -> std::net::SocketAddr {
    "127.0.0.1:8080".parse().unwrap()
}

#[actix_web::test]
async fn login_issues_token_and_gates_protected_routes() {
    let pool = test_pool().await;
    seed_employee(&pool, "john@company.com", "s3cret", Role::Employee).await;
    let app = test_app!(pool);

    // no token
    let resp = test::call_service(
        &app,
        test::TestRequest::get().peer_addr(peer()).uri("/api/employee").to_request(),
    )
    .await;
    assert_eq!(resp.status(), 401);

    // wrong password
    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/auth/login")
            .set_json(json!({"email": "john@company.com", "password": "wrong"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 401);

    // correct credentials
    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/auth/login")
            .set_json(json!({"email": "john@company.com", "password": "s3cret"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    let token = body["access_token"].as_str().unwrap().to_string();

    let resp = test::call_service(
        &app,
        test::TestRequest::get().peer_addr(peer())
            .uri("/api/employee")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn get_employee_is_an_idempotent_read() {
    let pool = test_pool().await;
    let id = seed_employee(&pool, "jane@company.com", "pw", Role::Employee).await;
    let app = test_app!(pool);
    let token = token_for(id, Role::Hr);

    let mut bodies = Vec::new();
    for _ in 0..2 {
        let resp = test::call_service(
            &app,
            test::TestRequest::get().peer_addr(peer())
                .uri(&format!("/api/employee/{}", id))
                .insert_header(bearer(&token))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200);
        let body: Value = test::read_body_json(resp).await;
        bodies.push(body);
    }
    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[0]["employee"]["email"], "jane@company.com");
    assert_eq!(bodies[0]["personal"]["pan_number"], "ABCDE1234F");
    assert_eq!(bodies[0]["role"], "Employee");
}

#[actix_web::test]
async fn clock_in_then_out_yields_one_present_row() {
    let pool = test_pool().await;
    let id = seed_employee(&pool, "clock@company.com", "pw", Role::Employee).await;
    let app = test_app!(pool);
    let token = token_for(id, Role::Employee);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/api/attendance/check-in")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);

    // duplicate clock-in hits the unique (employee, date) key
    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/api/attendance/check-in")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);

    let resp = test::call_service(
        &app,
        test::TestRequest::put().peer_addr(peer())
            .uri("/api/attendance/check-out")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);

    // a second clock-out has nothing left to close
    let resp = test::call_service(
        &app,
        test::TestRequest::put().peer_addr(peer())
            .uri("/api/attendance/check-out")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);

    let rows = sqlx::query_as::<_, (String, Option<String>, Option<String>)>(
        "SELECT status, login_time, logout_time FROM attendance WHERE employee_id = ?",
    )
    .bind(id)
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, "P");
    assert!(rows[0].1.is_some());
    assert!(rows[0].2.is_some());
}

#[actix_web::test]
async fn approving_leave_inserts_one_l_row_per_day() {
    let pool = test_pool().await;
    let emp = seed_employee(&pool, "emp@company.com", "pw", Role::Employee).await;
    let hr = seed_employee(&pool, "hr@company.com", "pw", Role::Hr).await;
    let app = test_app!(pool);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/api/leave")
            .insert_header(bearer(&token_for(emp, Role::Employee)))
            .set_json(json!({
                "leave_type": "Casual",
                "start_date": "2024-05-10",
                "end_date": "2024-05-11",
                "reason": "family function"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let leave_id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM leave_requests WHERE employee_id = ?",
    )
    .bind(emp)
    .fetch_one(&pool)
    .await
    .unwrap();

    let hr_token = token_for(hr, Role::Hr);
    let resp = test::call_service(
        &app,
        test::TestRequest::put().peer_addr(peer())
            .uri(&format!("/api/leave/{}/approve", leave_id))
            .insert_header(bearer(&hr_token))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let days = sqlx::query_as::<_, (String, String)>(
        "SELECT date, status FROM attendance WHERE employee_id = ? ORDER BY date",
    )
    .bind(emp)
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(days.len(), 2);
    assert_eq!(days[0], ("2024-05-10".to_string(), "L".to_string()));
    assert_eq!(days[1], ("2024-05-11".to_string(), "L".to_string()));

    // replayed approval is rejected by the Pending guard
    let resp = test::call_service(
        &app,
        test::TestRequest::put().peer_addr(peer())
            .uri(&format!("/api/leave/{}/approve", leave_id))
            .insert_header(bearer(&hr_token))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);
    let days: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM attendance WHERE employee_id = ?")
            .bind(emp)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(days, 2);
}

#[actix_web::test]
async fn monthly_cap_rejects_after_two_approved_days() {
    let pool = test_pool().await;
    let emp = seed_employee(&pool, "cap@company.com", "pw", Role::Employee).await;
    seed_employee(&pool, "hr2@company.com", "pw", Role::Hr).await;
    let app = test_app!(pool);
    let token = token_for(emp, Role::Employee);

    // two approved Casual days in May, inserted directly
    sqlx::query(
        r#"
        INSERT INTO leave_requests (employee_id, leave_type, start_date, end_date, status)
        VALUES (?, 'Casual', '2024-05-10', '2024-05-11', 'Approved')
        "#,
    )
    .bind(emp)
    .execute(&pool)
    .await
    .unwrap();

    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/api/leave")
            .insert_header(bearer(&token))
            .set_json(json!({
                "leave_type": "Casual",
                "start_date": "2024-05-20",
                "end_date": "2024-05-20"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Leave balance exhausted for this month");

    // medical leave bypasses the cap entirely
    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/api/leave")
            .insert_header(bearer(&token))
            .set_json(json!({
                "leave_type": "Medical",
                "start_date": "2024-05-22",
                "end_date": "2024-05-23"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);

    // a different month starts from a clean balance
    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/api/leave")
            .insert_header(bearer(&token))
            .set_json(json!({
                "leave_type": "Casual",
                "start_date": "2024-06-03",
                "end_date": "2024-06-04"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn monthly_cap_rejects_requests_pushing_total_over_two() {
    let pool = test_pool().await;
    let emp = seed_employee(&pool, "cap2@company.com", "pw", Role::Employee).await;
    let app = test_app!(pool);
    let token = token_for(emp, Role::Employee);

    sqlx::query(
        r#"
        INSERT INTO leave_requests (employee_id, leave_type, start_date, end_date, status)
        VALUES (?, 'Casual', '2024-05-06', '2024-05-06', 'Approved')
        "#,
    )
    .bind(emp)
    .execute(&pool)
    .await
    .unwrap();

    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/api/leave")
            .insert_header(bearer(&token))
            .set_json(json!({
                "leave_type": "Casual",
                "start_date": "2024-05-20",
                "end_date": "2024-05-21"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Only one day of leave remaining this month");

    // one remaining day can still be taken
    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/api/leave")
            .insert_header(bearer(&token))
            .set_json(json!({
                "leave_type": "Casual",
                "start_date": "2024-05-20",
                "end_date": "2024-05-20"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn payroll_batch_aborts_on_invalid_pay_period() {
    let pool = test_pool().await;
    let emp = seed_employee(&pool, "pay@company.com", "pw", Role::Employee).await;
    let hr = seed_employee(&pool, "payhr@company.com", "pw", Role::Hr).await;
    let app = test_app!(pool);
    let token = token_for(hr, Role::Hr);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/api/payroll/upload")
            .insert_header(bearer(&token))
            .set_json(json!({
                "rows": [
                    {"employee_id": emp, "pay_period": "Jan 2024", "basic": 40000.0, "hra": 8000.0},
                    {"employee_id": emp, "pay_period": "January 2024", "basic": 40000.0}
                ]
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("Mon YYYY"));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payroll")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0, "failed batch must persist nothing");

    // valid batch stores rows and generated payslips
    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/api/payroll/upload")
            .insert_header(bearer(&token))
            .set_json(json!({
                "rows": [
                    {"employee_id": emp, "pay_period": "Jan 2024", "basic": 40000.0,
                     "hra": 8000.0, "allowances": 6000.0, "deductions": 2000.0}
                ]
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 201);

    let (payroll_id, net): (i64, f64) =
        sqlx::query_as("SELECT id, net_salary FROM payroll WHERE employee_id = ?")
            .bind(emp)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(net, 52_000.0);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().peer_addr(peer())
            .uri(&format!("/api/payroll/payslip/{}", payroll_id))
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("Content-Type").unwrap(),
        "application/pdf"
    );
    let disposition = resp
        .headers()
        .get("Content-Disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("inline"));
    let bytes = test::read_body(resp).await;
    assert!(bytes.starts_with(b"%PDF"));
}

#[actix_web::test]
async fn otp_reset_is_single_use_and_swaps_the_password() {
    let pool = test_pool().await;
    seed_employee(&pool, "reset@company.com", "oldpw", Role::Employee).await;
    let app = test_app!(pool);

    // unknown email
    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/auth/send-otp")
            .set_json(json!({"email": "nobody@company.com"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 404);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Invalid Email");

    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/auth/send-otp")
            .set_json(json!({"email": "reset@company.com"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let otp: String =
        sqlx::query_scalar("SELECT otp FROM employees WHERE email = 'reset@company.com'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(otp.len(), 6);

    // wrong code
    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/auth/reset-password")
            .set_json(json!({
                "email": "reset@company.com",
                "otp": "000000x",
                "new_password": "newpw"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/auth/reset-password")
            .set_json(json!({
                "email": "reset@company.com",
                "otp": otp,
                "new_password": "newpw"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let cleared: Option<String> =
        sqlx::query_scalar("SELECT otp FROM employees WHERE email = 'reset@company.com'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(cleared.is_none(), "OTP must be cleared after use");

    // only the new password logs in
    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/auth/login")
            .set_json(json!({"email": "reset@company.com", "password": "oldpw"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 401);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/auth/login")
            .set_json(json!({"email": "reset@company.com", "password": "newpw"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn employee_csv_import_is_transactional() {
    let pool = test_pool().await;
    let hr = seed_employee(&pool, "csvhr@company.com", "pw", Role::Hr).await;
    let app = test_app!(pool);
    let token = token_for(hr, Role::Hr);

    let csv = "\
first_name,last_name,email,department,role,aadhar_number,pan_number\n\
Asha,Verma,asha@company.com,Engineering,Employee,111122223333,AAAPA1111A\n\
Ravi,Kumar,ravi@company.com,Finance,Employee,444455556666,BBBPB2222B\n";

    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/api/employee/csv")
            .insert_header(bearer(&token))
            .insert_header(("Content-Type", "text/csv"))
            .set_payload(csv)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 201);

    let pan: String = sqlx::query_scalar(
        r#"
        SELECT p.pan_number FROM employee_personal p
        JOIN employees e ON e.id = p.employee_id
        WHERE e.email = 'asha@company.com'
        "#,
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(pan, "AAAPA1111A");

    let before: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employees")
        .fetch_one(&pool)
        .await
        .unwrap();

    // second row collides with an existing email; nothing may persist
    let bad_csv = "\
first_name,last_name,email,department,role,aadhar_number,pan_number\n\
New,Person,new@company.com,Sales,Employee,,\n\
Dup,Person,asha@company.com,Sales,Employee,,\n";

    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/api/employee/csv")
            .insert_header(bearer(&token))
            .insert_header(("Content-Type", "text/csv"))
            .set_payload(bad_csv)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);

    let after: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employees")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(before, after);
}

#[actix_web::test]
async fn mail_merge_resolves_template_and_reports_outcome() {
    let pool = test_pool().await;
    let hr = seed_employee(&pool, "mergehr@company.com", "pw", Role::Hr).await;
    let app = test_app!(pool);
    let token = token_for(hr, Role::Hr);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/api/template/send-mail")
            .insert_header(bearer(&token))
            .set_json(json!({
                "template_name": "merge-missing-tpl",
                "recipients": [{"email": "a@company.com"}]
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 404);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/api/template")
            .insert_header(bearer(&token))
            .set_json(json!({
                "name": "merge-welcome-tpl",
                "subject": "Welcome {{name}}",
                "body_text": "Hello {{name}}, welcome aboard."
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 201);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/api/template/send-mail")
            .insert_header(bearer(&token))
            .set_json(json!({
                "template_name": "merge-welcome-tpl",
                "recipients": [
                    {"email": "a@company.com", "recipient_type": "to", "fields": {"name": "Asha"}},
                    {"email": "b@company.com", "recipient_type": "cc"}
                ]
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["sent"], 1);
    assert_eq!(body["failed"].as_array().unwrap().len(), 0);
}

#[actix_web::test]
async fn status_toggle_and_unknown_ids() {
    let pool = test_pool().await;
    let emp = seed_employee(&pool, "toggle@company.com", "pw", Role::Employee).await;
    let hr = seed_employee(&pool, "togglehr@company.com", "pw", Role::Hr).await;
    let app = test_app!(pool);
    let token = token_for(hr, Role::Hr);

    let resp = test::call_service(
        &app,
        test::TestRequest::put().peer_addr(peer())
            .uri(&format!("/api/employee/{}/status", emp))
            .insert_header(bearer(&token))
            .set_json(json!({"status": "Inactive"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let status: String = sqlx::query_scalar("SELECT status FROM employees WHERE id = ?")
        .bind(emp)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, "Inactive");

    let resp = test::call_service(
        &app,
        test::TestRequest::put().peer_addr(peer())
            .uri("/api/employee/99999/status")
            .insert_header(bearer(&token))
            .set_json(json!({"status": "Active"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 404);

    // role gate: a plain employee cannot toggle status
    let resp = test::call_service(
        &app,
        test::TestRequest::put().peer_addr(peer())
            .uri(&format!("/api/employee/{}/status", emp))
            .insert_header(bearer(&token_for(emp, Role::Employee)))
            .set_json(json!({"status": "Active"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 403);
}

#[actix_web::test]
async fn rejecting_leave_leaves_attendance_untouched() {
    let pool = test_pool().await;
    let emp = seed_employee(&pool, "rej@company.com", "pw", Role::Employee).await;
    let hr = seed_employee(&pool, "rejhr@company.com", "pw", Role::Hr).await;
    let app = test_app!(pool);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/api/leave")
            .insert_header(bearer(&token_for(emp, Role::Employee)))
            .set_json(json!({
                "leave_type": "Casual",
                "start_date": "2024-07-01",
                "end_date": "2024-07-02"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let leave_id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM leave_requests WHERE employee_id = ?",
    )
    .bind(emp)
    .fetch_one(&pool)
    .await
    .unwrap();

    let hr_token = token_for(hr, Role::Hr);
    let resp = test::call_service(
        &app,
        test::TestRequest::put().peer_addr(peer())
            .uri(&format!("/api/leave/{}/reject", leave_id))
            .insert_header(bearer(&hr_token))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let status: String = sqlx::query_scalar("SELECT status FROM leave_requests WHERE id = ?")
        .bind(leave_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, "Rejected");

    let attendance: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM attendance WHERE employee_id = ?")
            .bind(emp)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(attendance, 0, "rejection must not create attendance rows");

    // replayed rejection hits the Pending guard
    let resp = test::call_service(
        &app,
        test::TestRequest::put().peer_addr(peer())
            .uri(&format!("/api/leave/{}/reject", leave_id))
            .insert_header(bearer(&hr_token))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().peer_addr(peer())
            .uri("/api/leave?status=Rejected")
            .insert_header(bearer(&hr_token))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["total"], 1);
}

#[actix_web::test]
async fn photo_blob_round_trips_base64() {
    let pool = test_pool().await;
    let emp = seed_employee(&pool, "photo@company.com", "pw", Role::Employee).await;
    let hr = seed_employee(&pool, "photohr@company.com", "pw", Role::Hr).await;
    let app = test_app!(pool);
    let token = token_for(hr, Role::Hr);

    let encoded = BASE64.encode(b"not really a png");

    let resp = test::call_service(
        &app,
        test::TestRequest::put().peer_addr(peer())
            .uri(&format!("/api/employee/{}/photo", emp))
            .insert_header(bearer(&token))
            .set_json(json!({"photo": encoded}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().peer_addr(peer())
            .uri(&format!("/api/employee/{}", emp))
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["photograph"], encoded.as_str());

    // garbage payload is rejected before touching the row
    let resp = test::call_service(
        &app,
        test::TestRequest::put().peer_addr(peer())
            .uri(&format!("/api/employee/{}/photo", emp))
            .insert_header(bearer(&token))
            .set_json(json!({"photo": "%%% not base64 %%%"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);

    let resp = test::call_service(
        &app,
        test::TestRequest::delete().peer_addr(peer())
            .uri(&format!("/api/employee/{}/photo", emp))
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().peer_addr(peer())
            .uri(&format!("/api/employee/{}", emp))
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert!(body["photograph"].is_null());
}

#[actix_web::test]
async fn training_registration_is_unique_and_delete_is_admin_only() {
    let pool = test_pool().await;
    let emp = seed_employee(&pool, "train@company.com", "pw", Role::Employee).await;
    let hr = seed_employee(&pool, "trainhr@company.com", "pw", Role::Hr).await;
    let admin = seed_employee(&pool, "trainadmin@company.com", "pw", Role::Admin).await;
    let app = test_app!(pool);
    let hr_token = token_for(hr, Role::Hr);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/api/training")
            .insert_header(bearer(&hr_token))
            .set_json(json!({"name": "Fire Safety", "trainer": "R. Iyer"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 201);
    let body: Value = test::read_body_json(resp).await;
    let training_id = body["id"].as_i64().unwrap();

    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/api/training/register")
            .insert_header(bearer(&token_for(emp, Role::Employee)))
            .set_json(json!({"employee_id": emp, "training_id": training_id}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 201);
    let body: Value = test::read_body_json(resp).await;
    let registration_id = body["id"].as_i64().unwrap();

    // one row per (employee, training)
    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/api/training/register")
            .insert_header(bearer(&token_for(emp, Role::Employee)))
            .set_json(json!({"employee_id": emp, "training_id": training_id}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 409);

    let resp = test::call_service(
        &app,
        test::TestRequest::put().peer_addr(peer())
            .uri(&format!("/api/training/register/{}", registration_id))
            .insert_header(bearer(&hr_token))
            .set_json(json!({"status": "Completed"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let resp = test::call_service(
        &app,
        test::TestRequest::delete().peer_addr(peer())
            .uri(&format!("/api/training/{}", training_id))
            .insert_header(bearer(&hr_token))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 403);

    let resp = test::call_service(
        &app,
        test::TestRequest::delete().peer_addr(peer())
            .uri(&format!("/api/training/{}", training_id))
            .insert_header(bearer(&token_for(admin, Role::Admin)))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().peer_addr(peer())
            .uri(&format!("/api/training/{}", training_id))
            .insert_header(bearer(&hr_token))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn cv_filters_are_applied_server_side() {
    let pool = test_pool().await;
    let hr = seed_employee(&pool, "cvhr@company.com", "pw", Role::Hr).await;
    let emp = seed_employee(&pool, "cvemp@company.com", "pw", Role::Employee).await;
    let app = test_app!(pool);
    let token = token_for(hr, Role::Hr);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/api/cv")
            .insert_header(bearer(&token))
            .set_json(json!({"candidate_name": "Asha Verma", "position_applied": "Engineer"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 201);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/api/cv")
            .insert_header(bearer(&token))
            .set_json(json!({"candidate_name": "Ravi Kumar", "position_applied": "Analyst"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 201);
    let body: Value = test::read_body_json(resp).await;
    let ravi = body["id"].as_i64().unwrap();

    let resp = test::call_service(
        &app,
        test::TestRequest::put().peer_addr(peer())
            .uri(&format!("/api/cv/{}", ravi))
            .insert_header(bearer(&token))
            .set_json(json!({"status": "Accepted", "shortlisted_for_future": "Yes"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().peer_addr(peer())
            .uri("/api/cv?status=Accepted")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["candidate_name"], "Ravi Kumar");

    let resp = test::call_service(
        &app,
        test::TestRequest::get().peer_addr(peer())
            .uri("/api/cv?shortlisted_for_future=Yes&active_status=Active")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["total"], 1);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().peer_addr(peer())
            .uri("/api/cv")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["total"], 2);

    // candidate data is HR/Admin only
    let resp = test::call_service(
        &app,
        test::TestRequest::get().peer_addr(peer())
            .uri("/api/cv")
            .insert_header(bearer(&token_for(emp, Role::Employee)))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 403);
}

#[actix_web::test]
async fn employee_partial_update_rejects_unknown_columns() {
    let pool = test_pool().await;
    let emp = seed_employee(&pool, "patch@company.com", "pw", Role::Employee).await;
    let hr = seed_employee(&pool, "patchhr@company.com", "pw", Role::Hr).await;
    let app = test_app!(pool);
    let token = token_for(hr, Role::Hr);

    let resp = test::call_service(
        &app,
        test::TestRequest::put().peer_addr(peer())
            .uri(&format!("/api/employee/{}", emp))
            .insert_header(bearer(&token))
            .set_json(json!({"designation": "Senior Engineer", "salary": 95000.0}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let (designation, salary): (String, f64) =
        sqlx::query_as("SELECT designation, salary FROM employees WHERE id = ?")
            .bind(emp)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(designation, "Senior Engineer");
    assert_eq!(salary, 95_000.0);

    // columns outside the allowlist never reach the SQL layer
    let resp = test::call_service(
        &app,
        test::TestRequest::put().peer_addr(peer())
            .uri(&format!("/api/employee/{}", emp))
            .insert_header(bearer(&token))
            .set_json(json!({"password_hash": "owned"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);

    let resp = test::call_service(
        &app,
        test::TestRequest::put().peer_addr(peer())
            .uri(&format!("/api/employee/{}", emp))
            .insert_header(bearer(&token))
            .set_json(json!({}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn template_update_invalidates_the_name_cache() {
    let pool = test_pool().await;
    let hr = seed_employee(&pool, "tplhr@company.com", "pw", Role::Hr).await;
    let app = test_app!(pool);
    let token = token_for(hr, Role::Hr);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().peer_addr(peer())
            .uri("/api/template")
            .insert_header(bearer(&token))
            .set_json(json!({
                "name": "tpl-cache-probe",
                "subject": "v1",
                "body_text": "body"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 201);
    let body: Value = test::read_body_json(resp).await;
    let template_id = body["id"].as_i64().unwrap();

    // warm the cache, then update the row through the API
    let cached = template_cache::get(&pool, "tpl-cache-probe").await.unwrap().unwrap();
    assert_eq!(cached.subject, "v1");

    let resp = test::call_service(
        &app,
        test::TestRequest::put().peer_addr(peer())
            .uri(&format!("/api/template/{}", template_id))
            .insert_header(bearer(&token))
            .set_json(json!({"subject": "v2"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let cached = template_cache::get(&pool, "tpl-cache-probe").await.unwrap().unwrap();
    assert_eq!(cached.subject, "v2", "stale entry must be dropped on update");

    let resp = test::call_service(
        &app,
        test::TestRequest::put().peer_addr(peer())
            .uri("/api/template/99999")
            .insert_header(bearer(&token))
            .set_json(json!({"subject": "x"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn attendance_report_pivots_by_employee() {
    let pool = test_pool().await;
    let emp = seed_employee(&pool, "pivot@company.com", "pw", Role::Employee).await;
    let hr = seed_employee(&pool, "pivothr@company.com", "pw", Role::Hr).await;
    let app = test_app!(pool);

    for (date, status) in [("2024-05-06", "P"), ("2024-05-07", "L"), ("2024-05-08", "P")] {
        sqlx::query("INSERT INTO attendance (employee_id, date, status) VALUES (?, ?, ?)")
            .bind(emp)
            .bind(date)
            .bind(status)
            .execute(&pool)
            .await
            .unwrap();
    }

    let resp = test::call_service(
        &app,
        test::TestRequest::get().peer_addr(peer())
            .uri("/api/attendance?from=2024-05-06&to=2024-05-08")
            .insert_header(bearer(&token_for(emp, Role::Employee)))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["days"]["2024-05-07"], "L");

    let resp = test::call_service(
        &app,
        test::TestRequest::get().peer_addr(peer())
            .uri("/api/attendance/report?from=2024-05-06&to=2024-05-08")
            .insert_header(bearer(&token_for(hr, Role::Hr)))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("Content-Type").unwrap(), "text/csv");
    let csv = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(csv.contains("2024-05-07"));
    assert!(csv.lines().count() >= 2);
}
