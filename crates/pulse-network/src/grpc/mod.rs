//! gRPC 송신기 모듈.
//!
//! `grpc` feature가 활성화되어 있어야 한다.
//! 서버의 `pulse.v1.Metrics` 서비스로 메트릭을 보낸다.

mod client;
mod error_mapping;

pub use client::GrpcMetricSender;
pub use error_mapping::status_to_core_error;
