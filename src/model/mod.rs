pub mod attendance;
pub mod date;
pub mod role;
pub mod student;
