pub mod alarm;
pub mod call;
pub mod config;
pub mod quiet_hours;

mod host;
mod surfaces;
