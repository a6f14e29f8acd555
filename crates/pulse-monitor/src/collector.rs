//! sysinfo 기반 런타임 수집기.
//!
//! 폴링마다 스냅샷을 새로 만들어 `watch` 채널에 통째로 게시한다.
//! 수신 측은 공유 가변 목록 대신 불변 `Arc<Vec<Metric>>`만 본다.
//! 스냅샷의 `PollCount`는 게시 시점의 미전달 횟수이고, 되돌리기는 리포터 몫이다.

use pulse_core::models::metric::Metric;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::poll_counter::PollCounter;
use crate::stats::StatSource;

/// 런타임 수집기
pub struct RuntimeCollector {
    sys: System,
    pid: Option<Pid>,
    polls: PollCounter,
}

impl RuntimeCollector {
    /// 새 수집기 생성
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!("현재 PID 조회 실패, 프로세스 메트릭 생략: {e}");
                None
            }
        };
        Self {
            sys: System::new_all(),
            pid,
            polls: PollCounter::new(),
        }
    }

    /// 리포터와 공유할 폴링 카운터
    pub fn poll_counter(&self) -> PollCounter {
        self.polls.clone()
    }

    /// sysinfo 갱신 후 값 묶음 생성. 폴링 횟수가 1 늘어난다.
    pub fn sample(&mut self) -> StatSource {
        self.sys.refresh_cpu_usage();
        self.sys.refresh_memory();
        let poll_count = self.polls.record_poll();

        let (process_memory, process_cpu) = match self.pid {
            Some(pid) => {
                self.sys
                    .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                self.sys
                    .process(pid)
                    .map(|p| (p.memory() as f64, f64::from(p.cpu_usage())))
                    .unwrap_or_default()
            }
            None => (0.0, 0.0),
        };

        let load = System::load_average();

        StatSource {
            total_memory: self.sys.total_memory() as f64,
            free_memory: self.sys.free_memory() as f64,
            available_memory: self.sys.available_memory() as f64,
            used_memory: self.sys.used_memory() as f64,
            total_swap: self.sys.total_swap() as f64,
            used_swap: self.sys.used_swap() as f64,
            cpu_utilization: f64::from(self.sys.global_cpu_usage()),
            per_cpu_utilization: self
                .sys
                .cpus()
                .iter()
                .map(|cpu| f64::from(cpu.cpu_usage()))
                .collect(),
            load_average_1: load.one,
            load_average_5: load.five,
            load_average_15: load.fifteen,
            process_memory,
            process_cpu,
            uptime_secs: System::uptime() as f64,
            random_value: rand::random::<f64>(),
            poll_count,
        }
    }

    /// 한 번 폴링해 스냅샷 생성
    pub fn collect(&mut self) -> Vec<Metric> {
        self.sample().to_metrics()
    }

    /// 폴링 루프. 종료 신호까지 `poll_interval`마다 스냅샷을 게시한다.
    pub async fn run(
        mut self,
        poll_interval: Duration,
        snapshots: watch::Sender<Arc<Vec<Metric>>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = Arc::new(self.collect());
                    let count = snapshot.len();
                    match snapshots.send(snapshot) {
                        Ok(()) => debug!("스냅샷 게시: {count}개"),
                        Err(_) => debug!("스냅샷 수신자 없음"),
                    }
                }
                _ = shutdown.changed() => {
                    debug!("수집 루프 종료");
                    break;
                }
            }
        }
    }
}

impl Default for RuntimeCollector {
    fn default() -> Self {
        Self::new()
    }
}
