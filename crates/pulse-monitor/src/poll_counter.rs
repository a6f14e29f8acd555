//! 서버에 아직 전달되지 않은 폴링 횟수.
//!
//! 수집기는 폴링마다 1을 더하고, 리포터는 보고 주기마다 쌓인 값을 통째로 가져간다.
//! 전송이 실패하면 가져간 값을 되돌려 다음 보고에 다시 싣는다.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// 폴링 횟수 카운터 메트릭 이름
pub const POLL_COUNT: &str = "PollCount";

/// 수집기와 리포터가 공유하는 미전달 폴링 횟수
#[derive(Debug, Clone, Default)]
pub struct PollCounter {
    pending: Arc<AtomicI64>,
}

impl PollCounter {
    /// 0에서 시작하는 카운터
    pub fn new() -> Self {
        Self::default()
    }

    /// 폴링 1회 기록 후 미전달 횟수 반환
    pub fn record_poll(&self) -> i64 {
        self.pending.fetch_add(1, Ordering::SeqCst).saturating_add(1)
    }

    /// 미전달 횟수
    pub fn pending(&self) -> i64 {
        self.pending.load(Ordering::SeqCst)
    }

    /// 미전달 횟수를 모두 가져가고 0으로 되돌린다
    pub fn take(&self) -> i64 {
        self.pending.swap(0, Ordering::SeqCst)
    }

    /// 전달하지 못한 횟수를 되돌린다
    pub fn restore(&self, polls: i64) {
        if polls > 0 {
            self.pending.fetch_add(polls, Ordering::SeqCst);
        }
    }
}
