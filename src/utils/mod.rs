pub mod ids;
pub mod log_throttle;
pub mod logger;
