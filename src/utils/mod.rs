pub mod db_utils;
pub mod enrollment_filter;
pub mod fields;
pub mod student_cache;
