//! # pulse-core
//!
//! PULSE 도메인 모델, 포트(trait) 정의, 에러 타입.
//! 에이전트와 서버가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`]: 메트릭 값 타입과 병합 규칙 (serde Serialize/Deserialize)
//! - [`ports`]: Hexagonal Architecture 포트 인터페이스 (async_trait)
//! - [`error`]: 핵심 에러 타입 (thiserror)
//! - [`config`]: 에이전트/서버 설정 구조체
//! - [`config_manager`]: 설정 파일 로드/저장
//! - [`lifecycle`]: 프로세스 종료 신호

pub mod config;
pub mod config_manager;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod ports;
