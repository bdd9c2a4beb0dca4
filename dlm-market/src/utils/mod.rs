//! Utility modules for dlm-market

pub mod db_retry;
pub mod pool_monitor;

pub use db_retry::retry_on_busy;
pub use pool_monitor::{begin_monitored, MonitoredTransaction};
