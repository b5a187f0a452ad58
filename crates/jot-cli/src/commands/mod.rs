pub mod add;
pub mod check;
pub mod common;
pub mod config;
pub mod delete;
pub mod list;
pub mod sync;
pub mod watch;
