//! 설정에 따른 저장소 조립.
//!
//! DSN이 있으면 `Failover(Retrying(Postgres), Memory)`, 없으면 메모리 전용.

use pulse_core::config::ServerConfig;
use pulse_core::error::CoreError;
use pulse_core::ports::repository::MetricRepository;
use pulse_storage::{
    FailoverRepository, MemoryRepository, PostgresRepository, RetryPolicy, RetryingRepository,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// 조립된 저장소 묶음
pub struct StorageStack {
    /// 요청 경로가 쓰는 저장소
    pub repository: Arc<FailoverRepository>,
    /// 대체 메모리 저장소 (스냅샷 루프용)
    pub memory: Arc<MemoryRepository>,
    durable: Option<Arc<RetryingRepository<PostgresRepository>>>,
}

impl StorageStack {
    /// 설정으로 저장소를 만든다. 영구 저장소는 한 번 점검 후 시작 저장소가 정해진다.
    pub async fn build(
        config: &ServerConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Self, CoreError> {
        let memory = Arc::new(match &config.file_storage_path {
            Some(path) => {
                MemoryRepository::with_snapshot(path, config.store_interval(), config.restore)?
            }
            None => MemoryRepository::new(),
        });

        let Some(dsn) = config.database_dsn.as_deref() else {
            info!("DSN 없음: 메모리 저장소만 사용");
            return Ok(Self {
                repository: Arc::new(FailoverRepository::memory_only(memory.clone())),
                memory,
                durable: None,
            });
        };

        let postgres = PostgresRepository::connect_lazy(dsn)?;
        let durable = Arc::new(
            RetryingRepository::new(postgres, RetryPolicy::from(&config.storage_retry))
                .with_shutdown(shutdown_rx),
        );
        let repository = Arc::new(
            FailoverRepository::new(
                durable.clone() as Arc<dyn MetricRepository>,
                memory.clone() as Arc<dyn MetricRepository>,
            )
            .await,
        );

        Ok(Self {
            repository,
            memory,
            durable: Some(durable),
        })
    }

    /// 상태 점검 루프와 스냅샷 루프 시작
    pub fn spawn_background(
        &self,
        config: &ServerConfig,
        shutdown_rx: &watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(
                self.repository
                    .clone()
                    .run_monitor(config.db_check_interval(), shutdown_rx.clone()),
            ),
            tokio::spawn(
                self.memory
                    .clone()
                    .run_snapshot_loop(config.store_interval(), shutdown_rx.clone()),
            ),
        ]
    }

    /// 영구 저장소 연결 풀 닫기
    pub async fn close(&self) {
        if let Some(durable) = &self.durable {
            durable.inner().close().await;
        }
    }
}
