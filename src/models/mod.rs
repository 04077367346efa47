pub mod category;
pub mod jwt;
pub mod subtask;
pub mod task;
pub mod user;
