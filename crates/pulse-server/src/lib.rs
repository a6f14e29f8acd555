//! # pulse-server
//!
//! PULSE 수집 서버.
//! 에이전트가 보낸 메트릭을 받아 저장된 값 위에 병합한다.
//!
//! ## 구성
//! - [`ingest`]: 수신/병합 서비스 (`MetricRepository` 포트 위)
//! - [`security`]: 신뢰 서브넷, 봉투 복호화, 서명 검증/응답 서명
//! - [`http`]: axum REST API + 보안/gzip 미들웨어
//! - `grpc`: tonic `pulse.v1.Metrics` 서비스 (`grpc` feature)
//! - [`storage`]: 설정에 따른 저장소 조립 (메모리 + PostgreSQL 재시도 + 페일오버)

pub mod error;
pub mod http;
pub mod ingest;
pub mod security;
pub mod storage;

#[cfg(feature = "grpc")]
pub mod grpc;

pub use http::AppState;
pub use ingest::MetricService;
pub use security::TransportSecurity;
