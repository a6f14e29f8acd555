//! # pulse-agent
//!
//! PULSE 에이전트 라이브러리.
//! 수집기가 게시한 스냅샷을 보고 주기마다 서버로 보내는 파이프라인을 제공한다.

pub mod reporter;

pub use reporter::{ReportStats, Reporter, ReporterConfig};
