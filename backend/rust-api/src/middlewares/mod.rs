pub mod admission;
pub mod metrics;
pub mod trace;
