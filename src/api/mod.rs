pub mod attendance;
pub mod health;
pub mod report;
pub mod student;
