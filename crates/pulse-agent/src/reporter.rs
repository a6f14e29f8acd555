//! 보고 파이프라인.
//!
//! 생성기 1개 → 작업 큐 2개(메트릭 단건, 스냅샷 배치) → 워커 `rate_limit`개 → 결과 싱크 1개.
//! 종료 신호가 오면 생성기가 송신기를 닫고 큐를 닫는다. 큐에 남은 항목은 버리고,
//! 진행 중인 전송은 끝까지 기다린다.
//!
//! 폴링 카운터를 받으면 보고 주기마다 미전달 폴링 횟수를 가져가 `PollCount`로 싣고,
//! 그 항목의 전송이 실패하면 같은 횟수를 카운터에 되돌린다.

use futures::future::join_all;
use pulse_core::config::AgentConfig;
use pulse_core::models::metric::Metric;
use pulse_core::models::outcome::SendOutcome;
use pulse_core::ports::sender::MetricSender;
use pulse_monitor::{PollCounter, POLL_COUNT};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// 작업 큐 용량 기본값
const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// 리포터 설정
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// 보고 주기
    pub report_interval: Duration,
    /// 동시 전송 워커 수
    pub rate_limit: usize,
    /// true면 스냅샷 통째로, false면 메트릭마다 전송
    pub batch: bool,
    /// 큐별 용량
    pub queue_capacity: usize,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

impl From<&AgentConfig> for ReporterConfig {
    fn from(config: &AgentConfig) -> Self {
        Self {
            report_interval: config.report_interval(),
            rate_limit: config.rate_limit.max(1),
            batch: config.batch,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// 결과 싱크 집계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportStats {
    /// 성공한 요청 수
    pub sent: u64,
    /// 실패한 요청 수
    pub failed: u64,
    /// 서버가 병합해 돌려준 메트릭 수
    pub metrics: u64,
}

impl ReportStats {
    fn record(&mut self, outcome: &SendOutcome) {
        if outcome.is_success() {
            self.sent += 1;
            self.metrics += outcome.metric_count() as u64;
        } else {
            self.failed += 1;
        }
    }
}

/// 작업 큐 송신 측 묶음
struct WorkQueues {
    metrics: flume::Sender<Metric>,
    batches: flume::Sender<Arc<Vec<Metric>>>,
}

/// 보고 파이프라인
pub struct Reporter {
    config: ReporterConfig,
    sender: Arc<dyn MetricSender>,
    polls: Option<PollCounter>,
}

impl Reporter {
    /// 새 리포터 생성
    pub fn new(config: ReporterConfig, sender: Arc<dyn MetricSender>) -> Self {
        Self {
            config,
            sender,
            polls: None,
        }
    }

    /// 스냅샷의 `PollCount` 대신 수집기와 공유하는 미전달 횟수를 보낸다
    pub fn with_poll_counter(mut self, polls: PollCounter) -> Self {
        self.polls = Some(polls);
        self
    }

    /// 종료 신호까지 파이프라인 실행. 싱크가 모은 최종 집계를 돌려준다.
    pub async fn run(
        self,
        snapshots: watch::Receiver<Arc<Vec<Metric>>>,
        shutdown: watch::Receiver<bool>,
    ) -> ReportStats {
        let Self {
            config,
            sender,
            polls,
        } = self;
        info!(
            "리포터 시작: 주기={}s, 워커={}, 배치={}",
            config.report_interval.as_secs_f64(),
            config.rate_limit,
            config.batch
        );

        let (metric_tx, metric_rx) = flume::bounded(config.queue_capacity);
        let (batch_tx, batch_rx) = flume::bounded(config.queue_capacity);
        let (result_tx, result_rx) = mpsc::unbounded_channel();

        let sink = tokio::spawn(run_sink(result_rx));

        let workers: Vec<_> = (0..config.rate_limit)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    sender.clone(),
                    metric_rx.clone(),
                    batch_rx.clone(),
                    result_tx.clone(),
                    polls.clone(),
                    shutdown.clone(),
                ))
            })
            .collect();
        // 워커가 모두 끝나야 싱크가 끝난다
        drop(result_tx);
        drop((metric_rx, batch_rx));

        let queues = WorkQueues {
            metrics: metric_tx,
            batches: batch_tx,
        };
        run_generator(
            &config,
            sender.as_ref(),
            polls.as_ref(),
            snapshots,
            queues,
            shutdown,
        )
        .await;

        for result in join_all(workers).await {
            if let Err(e) = result {
                error!("전송 워커 실패: {e}");
            }
        }

        let stats = match sink.await {
            Ok(stats) => stats,
            Err(e) => {
                error!("결과 싱크 실패: {e}");
                ReportStats::default()
            }
        };
        info!(
            "리포터 종료: 성공={}, 실패={}, 메트릭={}",
            stats.sent, stats.failed, stats.metrics
        );
        stats
    }
}

/// 보고 주기마다 최신 스냅샷을 큐에 넣는다. 종료 시 송신기를 닫고 큐를 버린다.
async fn run_generator(
    config: &ReporterConfig,
    sender: &dyn MetricSender,
    polls: Option<&PollCounter>,
    snapshots: watch::Receiver<Arc<Vec<Metric>>>,
    queues: WorkQueues,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker =
        tokio::time::interval_at(Instant::now() + config.report_interval, config.report_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // 새 스냅샷이 없으면 직전 스냅샷 재사용
                let mut snapshot = snapshots.borrow().clone();
                if snapshot.is_empty() {
                    debug!("보고할 스냅샷 없음");
                    continue;
                }
                if let Some(polls) = polls {
                    snapshot = with_pending_polls(&snapshot, polls);
                    if snapshot.is_empty() {
                        continue;
                    }
                }

                let enqueue = async {
                    if config.batch {
                        queues.batches.send_async(snapshot).await.is_ok()
                    } else {
                        for metric in snapshot.iter() {
                            if queues.metrics.send_async(metric.clone()).await.is_err() {
                                return false;
                            }
                        }
                        true
                    }
                };

                tokio::select! {
                    queued = enqueue => {
                        if !queued {
                            warn!("작업 큐 닫힘");
                            break;
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    debug!("생성기 종료: 송신기 닫기");
    if let Err(e) = sender.close().await {
        warn!("송신기 닫기 실패: {e}");
    }
    drop(queues);
}

/// 스냅샷의 `PollCount`를 카운터에서 가져간 미전달 횟수로 바꾼다. 0이면 뺀다.
fn with_pending_polls(snapshot: &[Metric], polls: &PollCounter) -> Arc<Vec<Metric>> {
    let taken = polls.take();
    let metrics = snapshot
        .iter()
        .filter(|metric| metric.name != POLL_COUNT)
        .cloned()
        .chain((taken > 0).then(|| Metric::counter(POLL_COUNT, taken)))
        .collect();
    Arc::new(metrics)
}

/// 전송 항목에 실린 `PollCount` 증분
fn carried_polls<'a>(metrics: impl IntoIterator<Item = &'a Metric>) -> i64 {
    metrics
        .into_iter()
        .filter(|metric| metric.name == POLL_COUNT)
        .filter_map(|metric| metric.delta)
        .sum()
}

/// 워커가 꺼낸 작업
enum Job {
    Single(Metric),
    Batch(Arc<Vec<Metric>>),
}

/// 두 큐 중 먼저 준비된 쪽에서 하나씩 꺼내 끝까지 전송한다.
async fn run_worker(
    id: usize,
    sender: Arc<dyn MetricSender>,
    metrics: flume::Receiver<Metric>,
    batches: flume::Receiver<Arc<Vec<Metric>>>,
    results: mpsc::UnboundedSender<SendOutcome>,
    polls: Option<PollCounter>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let job = tokio::select! {
            received = metrics.recv_async() => match received {
                Ok(metric) => Job::Single(metric),
                Err(_) => break,
            },
            received = batches.recv_async() => match received {
                Ok(batch) => Job::Batch(batch),
                Err(_) => break,
            },
            _ = shutdown.changed() => break,
        };
        // 종료 후 큐에 남은 항목은 보내지 않는다
        if *shutdown.borrow() {
            break;
        }

        let (outcome, carried) = match job {
            Job::Single(metric) => {
                let carried = carried_polls([&metric]);
                match sender.send_metric(&metric).await {
                    Ok(merged) => (SendOutcome::Single(merged), carried),
                    Err(e) => (SendOutcome::Failed(e), carried),
                }
            }
            Job::Batch(batch) => {
                let carried = carried_polls(batch.iter());
                match sender.send_batch(&batch).await {
                    Ok(merged) => (SendOutcome::Batch(merged), carried),
                    Err(e) => (SendOutcome::Failed(e), carried),
                }
            }
        };
        if let (SendOutcome::Failed(_), Some(polls)) = (&outcome, &polls) {
            polls.restore(carried);
        }

        if results.send(outcome).is_err() {
            break;
        }
    }
    debug!("전송 워커 {id} 종료");
}

/// 결과를 기록하고 집계만 한다.
async fn run_sink(mut results: mpsc::UnboundedReceiver<SendOutcome>) -> ReportStats {
    let mut stats = ReportStats::default();
    while let Some(outcome) = results.recv().await {
        match &outcome {
            SendOutcome::Single(metric) => {
                debug!("전송 완료: {} = {}", metric.name, metric.value_string());
            }
            SendOutcome::Batch(metrics) => debug!("배치 전송 완료: {}개", metrics.len()),
            SendOutcome::Failed(e) => warn!("전송 실패: {e}"),
        }
        stats.record(&outcome);
    }
    stats
}
