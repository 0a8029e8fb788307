pub mod analyze;
pub mod combiner;
pub mod history;
pub mod rate_limiter;
