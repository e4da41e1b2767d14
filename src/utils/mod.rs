pub mod db_utils;
pub mod payslip;
pub mod template_cache;
