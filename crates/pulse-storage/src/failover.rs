//! 영구 저장소 ↔ 메모리 페일오버.
//!
//! 현재 저장소 포인터는 `ArcSwap` 하나뿐이며, 상태 점검만 이를 바꾼다.
//! 모든 호출은 호출 시점의 포인터로 위임된다.
//! 메모리에 쌓인 데이터는 영구 저장소 복귀 시 옮기지 않는다.

use arc_swap::ArcSwap;
use async_trait::async_trait;
use pulse_core::error::CoreError;
use pulse_core::models::metric::Metric;
use pulse_core::ports::repository::MetricRepository;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// 현재 사용 중인 저장소 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// 영구 저장소 (PostgreSQL)
    Durable,
    /// 인메모리 대체 저장소
    Memory,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Durable => f.write_str("durable"),
            Backend::Memory => f.write_str("memory"),
        }
    }
}

struct Active {
    backend: Backend,
    repo: Arc<dyn MetricRepository>,
}

/// 페일오버 저장소: `MetricRepository` 포트 구현
pub struct FailoverRepository {
    durable: Option<Arc<dyn MetricRepository>>,
    memory: Arc<dyn MetricRepository>,
    active: ArcSwap<Active>,
}

impl FailoverRepository {
    /// 영구 저장소 없이 메모리만 쓰는 구성
    pub fn memory_only(memory: Arc<dyn MetricRepository>) -> Self {
        Self {
            durable: None,
            active: ArcSwap::from_pointee(Active {
                backend: Backend::Memory,
                repo: memory.clone(),
            }),
            memory,
        }
    }

    /// 영구 저장소를 한 번 점검한 뒤 시작 저장소를 고른다
    pub async fn new(durable: Arc<dyn MetricRepository>, memory: Arc<dyn MetricRepository>) -> Self {
        let repo = Self {
            durable: Some(durable),
            active: ArcSwap::from_pointee(Active {
                backend: Backend::Memory,
                repo: memory.clone(),
            }),
            memory,
        };
        let backend = repo.check().await;
        info!("시작 저장소: {backend}");
        repo
    }

    /// 현재 저장소 종류
    pub fn backend(&self) -> Backend {
        self.active.load().backend
    }

    fn current(&self) -> Arc<dyn MetricRepository> {
        self.active.load().repo.clone()
    }

    /// 영구 저장소를 점검하고 필요하면 포인터를 교체한다
    pub async fn check(&self) -> Backend {
        let Some(durable) = &self.durable else {
            return Backend::Memory;
        };

        let (next, repo) = match durable.ping().await {
            Ok(()) => (Backend::Durable, durable.clone()),
            Err(e) => {
                debug!("영구 저장소 점검 실패: {e}");
                (Backend::Memory, self.memory.clone())
            }
        };

        let previous = self.active.swap(Arc::new(Active { backend: next, repo })).backend;
        if previous != next {
            match next {
                Backend::Durable => info!("영구 저장소 복구: {previous} → {next}"),
                Backend::Memory => warn!("영구 저장소 도달 불가: {previous} → {next}"),
            }
        }
        next
    }

    /// 주기적 상태 점검 루프
    pub async fn run_monitor(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        if self.durable.is_none() {
            return;
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check().await;
                }
                _ = shutdown.changed() => {
                    debug!("저장소 점검 루프 종료");
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl MetricRepository for FailoverRepository {
    async fn get(&self, name: &str) -> Result<Option<Metric>, CoreError> {
        self.current().get(name).await
    }

    async fn get_many(&self, names: &[String]) -> Result<HashMap<String, Metric>, CoreError> {
        self.current().get_many(names).await
    }

    async fn create(&self, metric: &Metric) -> Result<(), CoreError> {
        self.current().create(metric).await
    }

    async fn update(&self, metric: &Metric) -> Result<(), CoreError> {
        self.current().update(metric).await
    }

    async fn update_many(&self, metrics: &[Metric]) -> Result<(), CoreError> {
        self.current().update_many(metrics).await
    }

    /// 영구 저장소 도달 가능 여부. 영구 저장소가 없으면 실패.
    async fn ping(&self) -> Result<(), CoreError> {
        match &self.durable {
            Some(durable) => durable.ping().await,
            None => Err(CoreError::StorageUnavailable(
                "영구 저장소가 설정되지 않음".to_string(),
            )),
        }
    }

    async fn list(&self) -> Result<Vec<Metric>, CoreError> {
        self.current().list().await
    }

    async fn merge_many(&self, batch: &[Metric]) -> Result<Vec<Metric>, CoreError> {
        self.current().merge_many(batch).await
    }
}
