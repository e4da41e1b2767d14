pub mod attendance;
pub mod cv;
pub mod email_template;
pub mod employee;
pub mod leave_request;
pub mod payroll;
pub mod role;
pub mod training;
