//! 도메인 모델.

pub mod metric;
pub mod outcome;

pub use metric::{merge_batch, Metric, MetricType};
pub use outcome::SendOutcome;
