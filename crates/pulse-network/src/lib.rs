//! # pulse-network
//!
//! 에이전트 측 네트워크 어댑터.
//! `MetricSender` 포트를 HTTP/JSON(gzip)과 gRPC로 구현하며,
//! 두 송신기 모두 같은 봉인 규칙(평문 서명 + 선택적 하이브리드 암호화)을 따른다.
//!
//! ## Feature Flags
//!
//! - `grpc`: gRPC 송신기 활성화 (tonic + prost)
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use pulse_network::http_client::HttpMetricSender;
//!
//! let sender = HttpMetricSender::new("localhost:8080", Duration::from_secs(5))?
//!     .with_signer(Signer::new("key"));
//! ```

pub mod compression;
pub mod http_client;
pub mod local_ip;
pub mod sealing;

#[cfg(feature = "grpc")]
pub mod grpc;
