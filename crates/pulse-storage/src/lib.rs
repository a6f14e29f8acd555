//! # pulse-storage
//!
//! 서버 측 메트릭 저장소 어댑터. 모두 `MetricRepository` 포트를 구현한다.
//!
//! - [`memory`]: 인메모리 저장소 (선택적 JSON 파일 스냅샷)
//! - [`postgres`]: PostgreSQL 저장소 (advisory lock 기반 트랜잭션 upsert)
//! - [`retry`]: 일시적 에러 재시도/백오프 래퍼
//! - [`failover`]: 영구 저장소 ↔ 메모리 자동 전환

pub mod failover;
pub mod memory;
pub mod postgres;
pub mod retry;
pub mod snapshot;

pub use failover::{Backend, FailoverRepository};
pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;
pub use retry::{RetryPolicy, RetryingRepository};
