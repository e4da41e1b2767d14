pub mod attendance;
pub mod cv;
pub mod employee;
pub mod leave_request;
pub mod mail_template;
pub mod payroll;
pub mod training;
