pub mod auth;
pub mod category;
pub mod subtask;
pub mod task;
pub mod user;
