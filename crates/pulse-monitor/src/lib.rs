//! # pulse-monitor
//!
//! 에이전트 측 런타임 수집기.
//! sysinfo 값을 [`stats::StatSource`]로 한 번 읽고, 정적 표 [`stats::STAT_TABLE`]로
//! 메트릭 스냅샷을 만든다. 스냅샷은 `watch` 채널에 `Arc<Vec<Metric>>`로 게시된다.
//! `PollCount`의 실제 전달분은 리포터와 공유하는 [`PollCounter`]가 관리한다.

pub mod collector;
pub mod poll_counter;
pub mod stats;

pub use collector::RuntimeCollector;
pub use poll_counter::{PollCounter, POLL_COUNT};
pub use stats::{StatEntry, StatSource, STAT_TABLE};
