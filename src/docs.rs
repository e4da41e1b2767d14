use crate::api::attendance::{AttendancePivotRow, AttendanceQuery};
use crate::api::cv::{CreateCv, CvListResponse, CvQuery};
use crate::api::employee::{
    CreateEmployee, EmployeeDetail, EmployeeListResponse, UpdateStatus, UploadPhoto,
};
use crate::api::leave_request::{CreateLeave, LeaveFilter, LeaveListResponse};
use crate::api::mail_template::{CreateTemplate, Recipient, SendMail};
use crate::api::payroll::{PaginatedPayrollResponse, PayrollQuery, PayrollUploadRow, UploadPayroll};
use crate::api::training::{CreateTraining, RegisterTraining, UpdateRegistration};
use crate::model::attendance::{Attendance, AttendanceStatus};
use crate::model::cv::CvRecord;
use crate::model::email_template::{EmailTemplate, RecipientType};
use crate::model::employee::{Employee, EmployeePersonal, EmployeeStatus};
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};
use crate::model::payroll::Payroll;
use crate::model::role::Role;
use crate::model::training::{EmployeeTraining, Training};
use crate::models::{LoginReqDto, ResetPasswordReqDto, SendOtpReqDto};
use actix_web::{HttpResponse, Responder};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM System API",
        version = "1.0.0",
        description = r#"
## Human Resource Management (HRM) System

Backend API for core HR operations: employee records, attendance and leave
tracking, payroll with generated payslips, training programs, a candidate/CV
database and templated mail-merge notifications.

### Security
Most endpoints are protected using **JWT Bearer authentication**; login and
the OTP password-reset flow are public.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::send_otp,
        crate::auth::handlers::reset_password,

        crate::api::employee::create_employee,
        crate::api::employee::import_employees_csv,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::update_status,
        crate::api::employee::upload_photo,
        crate::api::employee::remove_photo,
        crate::api::employee::employee_report,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::list_attendance,
        crate::api::attendance::attendance_report,

        crate::api::leave_request::create_leave,
        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,

        crate::api::payroll::upload_payroll,
        crate::api::payroll::list_payrolls,
        crate::api::payroll::get_payslip,

        crate::api::training::list_trainings,
        crate::api::training::create_training,
        crate::api::training::get_training,
        crate::api::training::update_training,
        crate::api::training::delete_training,
        crate::api::training::register_training,
        crate::api::training::update_registration,
        crate::api::training::import_trainings_csv,
        crate::api::training::training_report,

        crate::api::cv::list_cvs,
        crate::api::cv::create_cv,
        crate::api::cv::update_cv,

        crate::api::mail_template::list_templates,
        crate::api::mail_template::create_template,
        crate::api::mail_template::update_template,
        crate::api::mail_template::send_mail,
    ),
    components(
        schemas(
            LoginReqDto,
            SendOtpReqDto,
            ResetPasswordReqDto,
            Role,
            Employee,
            EmployeePersonal,
            EmployeeStatus,
            CreateEmployee,
            EmployeeListResponse,
            EmployeeDetail,
            UpdateStatus,
            UploadPhoto,
            Attendance,
            AttendanceStatus,
            AttendancePivotRow,
            AttendanceQuery,
            LeaveRequest,
            LeaveType,
            LeaveStatus,
            CreateLeave,
            LeaveFilter,
            LeaveListResponse,
            Payroll,
            PayrollUploadRow,
            UploadPayroll,
            PayrollQuery,
            PaginatedPayrollResponse,
            Training,
            EmployeeTraining,
            CreateTraining,
            RegisterTraining,
            UpdateRegistration,
            CvRecord,
            CreateCv,
            CvQuery,
            CvListResponse,
            EmailTemplate,
            RecipientType,
            CreateTemplate,
            Recipient,
            SendMail
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and password reset APIs"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Payroll", description = "Payroll and payslip APIs"),
        (name = "Training", description = "Training program APIs"),
        (name = "CV", description = "Candidate database APIs"),
        (name = "Template", description = "Mail template and merge APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Raw OpenAPI document; no bundled UI.
pub async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}
