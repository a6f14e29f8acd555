//! gRPC 수신 (`pulse.v1.Metrics`).

mod error_mapping;
mod service;

pub use error_mapping::map_core_error;
pub use service::{serve, GrpcMetricsService};
