//! 재시도/백오프 저장소 래퍼.
//!
//! 일시적 에러(`CoreError::StorageUnavailable`)만 재시도한다.
//! 대기 시간은 `initial_delay`부터 `multiplier`배씩 늘고 `max_delay`에서 멈춘다.
//! 종료 신호가 오면 대기를 즉시 끊고 `CoreError::Cancelled`를 돌려준다.

use async_trait::async_trait;
use pulse_core::config::StorageRetryConfig;
use pulse_core::error::CoreError;
use pulse_core::lifecycle::stopped;
use pulse_core::models::metric::Metric;
use pulse_core::ports::repository::MetricRepository;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::warn;

/// 재시도 정책
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 최대 재시도 횟수 (총 시도 = 1 + max_retries)
    pub max_retries: u32,
    /// 첫 대기 시간
    pub initial_delay: Duration,
    /// 대기 시간 배수
    pub multiplier: f64,
    /// 대기 시간 상한
    pub max_delay: Duration,
    /// 호출당 타임아웃
    pub call_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&StorageRetryConfig::default())
    }
}

impl From<&StorageRetryConfig> for RetryPolicy {
    fn from(config: &StorageRetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            multiplier: config.multiplier,
            max_delay: Duration::from_millis(config.max_delay_ms),
            call_timeout: config.call_timeout_ms.map(Duration::from_millis),
        }
    }
}

impl RetryPolicy {
    /// `attempt`번째 실패 뒤의 대기 시간 (0부터)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt as i32);
        let delay = self.initial_delay.as_secs_f64() * factor;
        if !delay.is_finite() || delay >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(delay)
        }
    }
}

/// 재시도 래퍼: 내부 저장소 호출을 정책에 따라 반복한다
pub struct RetryingRepository<R> {
    inner: R,
    policy: RetryPolicy,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<R: MetricRepository> RetryingRepository<R> {
    /// 새 재시도 래퍼
    pub fn new(inner: R, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            shutdown: None,
        }
    }

    /// 종료 신호 연결: 백오프 대기 중 취소
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// 내부 저장소
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// 재시도가 포함된 호출 실행
    async fn execute_with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut shutdown = self.shutdown.clone();

        for attempt in 0..=self.policy.max_retries {
            let result = match self.policy.call_timeout {
                Some(limit) => match tokio::time::timeout(limit, call()).await {
                    Ok(result) => result,
                    Err(_) => Err(CoreError::StorageUnavailable(format!(
                        "{operation}: {limit:?} 타임아웃"
                    ))),
                },
                None => call().await,
            };

            let e = match result {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            if !e.is_transient() || attempt == self.policy.max_retries {
                return Err(e);
            }

            let delay = self.policy.delay_for(attempt);
            warn!(
                "{operation} 실패 (시도 {}/{}): {e}, {delay:?} 후 재시도",
                attempt + 1,
                self.policy.max_retries + 1
            );

            match shutdown.as_mut() {
                Some(rx) => {
                    if *rx.borrow() {
                        return Err(CoreError::Cancelled);
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = stopped(rx) => return Err(CoreError::Cancelled),
                    }
                }
                None => tokio::time::sleep(delay).await,
            }
        }

        Err(CoreError::Internal(format!("{operation}: 재시도 루프 이탈")))
    }
}

#[async_trait]
impl<R: MetricRepository> MetricRepository for RetryingRepository<R> {
    async fn get(&self, name: &str) -> Result<Option<Metric>, CoreError> {
        self.execute_with_retry("get", || self.inner.get(name)).await
    }

    async fn get_many(&self, names: &[String]) -> Result<HashMap<String, Metric>, CoreError> {
        self.execute_with_retry("get_many", || self.inner.get_many(names))
            .await
    }

    async fn create(&self, metric: &Metric) -> Result<(), CoreError> {
        self.execute_with_retry("create", || self.inner.create(metric))
            .await
    }

    async fn update(&self, metric: &Metric) -> Result<(), CoreError> {
        self.execute_with_retry("update", || self.inner.update(metric))
            .await
    }

    async fn update_many(&self, metrics: &[Metric]) -> Result<(), CoreError> {
        self.execute_with_retry("update_many", || self.inner.update_many(metrics))
            .await
    }

    /// 상태 점검은 재시도 없이 한 번만 호출한다
    async fn ping(&self) -> Result<(), CoreError> {
        self.inner.ping().await
    }

    async fn list(&self) -> Result<Vec<Metric>, CoreError> {
        self.execute_with_retry("list", || self.inner.list()).await
    }

    async fn merge_many(&self, batch: &[Metric]) -> Result<Vec<Metric>, CoreError> {
        self.execute_with_retry("merge_many", || self.inner.merge_many(batch))
            .await
    }
}
