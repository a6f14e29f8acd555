//! # pulse-api-contracts
//!
//! gRPC 전송 계약. Protobuf 정의는 `proto/pulse/v1/metrics.proto`에 있고
//! `tonic-prost-build`로 코드를 생성한다.
//!
//! - [`pulse::v1`]: 생성된 메시지, `MetricsClient`, `MetricsServer`
//! - [`convert`]: proto ↔ 도메인 `Metric` 변환

pub mod convert;

/// 생성된 Protobuf 코드
pub mod pulse {
    pub mod v1 {
        #![allow(clippy::all)]
        tonic::include_proto!("pulse.v1");
    }
}

pub use convert::{from_proto_batch, to_proto_batch};
