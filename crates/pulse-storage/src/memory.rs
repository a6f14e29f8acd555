//! 인메모리 메트릭 저장소.
//!
//! `MetricRepository` 포트 구현. 영구 저장소가 없거나 닿지 않을 때 쓰인다.
//! 배치 병합은 하나의 쓰기 잠금 안에서 끝나므로 원자적이다.
//!
//! 스냅샷 파일이 설정되면 시작 시 복원하고, 주기적으로(또는 쓰기마다) 덤프한다.
//! 파일 쓰기는 blocking 풀에서 하고, 덤프끼리는 `persist_lock`으로 순서를 지킨다.

use async_trait::async_trait;
use parking_lot::RwLock;
use pulse_core::error::CoreError;
use pulse_core::lifecycle::stopped;
use pulse_core::models::metric::{merge_batch, Metric};
use pulse_core::ports::repository::MetricRepository;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info};

use crate::snapshot::FileSnapshot;

/// 인메모리 저장소: `MetricRepository` 포트 구현
#[derive(Debug, Default)]
pub struct MemoryRepository {
    metrics: RwLock<HashMap<String, Metric>>,
    snapshot: Option<FileSnapshot>,
    sync_writes: bool,
    persist_lock: Mutex<()>,
}

impl MemoryRepository {
    /// 파일 없는 순수 메모리 저장소
    pub fn new() -> Self {
        Self::default()
    }

    /// 스냅샷 파일을 쓰는 저장소.
    ///
    /// `store_interval`이 0이면 쓰기마다 동기 저장한다.
    /// `restore`면 기존 파일 내용을 먼저 적재한다.
    pub fn with_snapshot(
        path: impl Into<PathBuf>,
        store_interval: Duration,
        restore: bool,
    ) -> Result<Self, CoreError> {
        let snapshot = FileSnapshot::new(path);

        let mut metrics = HashMap::new();
        if restore {
            for metric in snapshot.load()? {
                metrics.insert(metric.name.clone(), metric);
            }
            info!(
                "스냅샷 복원: {} ({}개)",
                snapshot.path().display(),
                metrics.len()
            );
        }

        Ok(Self {
            metrics: RwLock::new(metrics),
            snapshot: Some(snapshot),
            sync_writes: store_interval.is_zero(),
            persist_lock: Mutex::new(()),
        })
    }

    /// 저장된 메트릭 수
    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }

    fn sorted(&self) -> Vec<Metric> {
        let mut all: Vec<Metric> = self.metrics.read().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// 스냅샷 파일에 현재 상태 저장 (파일이 없으면 아무것도 안 함)
    ///
    /// 잠금을 잡은 뒤 상태를 읽으므로 나중에 끝난 덤프가 항상 더 새 상태다.
    pub async fn persist(&self) -> Result<(), CoreError> {
        let Some(snapshot) = self.snapshot.clone() else {
            return Ok(());
        };
        let _guard = self.persist_lock.lock().await;
        let metrics = self.sorted();
        tokio::task::spawn_blocking(move || snapshot.save(&metrics))
            .await
            .map_err(|e| CoreError::Internal(format!("스냅샷 저장 태스크 실패: {e}")))?
    }

    /// 쓰기 직후 동기 저장. 실패해도 쓰기 자체는 유효하다.
    async fn after_write(&self) {
        if self.sync_writes {
            if let Err(e) = self.persist().await {
                error!("동기 스냅샷 저장 실패: {e}");
            }
        }
    }

    /// 주기적 스냅샷 저장 루프. 종료 신호 시 마지막으로 한 번 저장한다.
    pub async fn run_snapshot_loop(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        if self.snapshot.is_none() {
            return;
        }

        if self.sync_writes {
            // 쓰기마다 저장하므로 종료 시점 저장만 남는다
            stopped(&mut shutdown).await;
        } else {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.persist().await {
                            Ok(()) => debug!("주기 스냅샷 저장 완료"),
                            Err(e) => error!("주기 스냅샷 저장 실패: {e}"),
                        }
                    }
                    _ = stopped(&mut shutdown) => break,
                }
            }
        }

        match self.persist().await {
            Ok(()) => info!("종료 스냅샷 저장 완료"),
            Err(e) => error!("종료 스냅샷 저장 실패: {e}"),
        }
    }
}

#[async_trait]
impl MetricRepository for MemoryRepository {
    async fn get(&self, name: &str) -> Result<Option<Metric>, CoreError> {
        Ok(self.metrics.read().get(name).cloned())
    }

    async fn get_many(&self, names: &[String]) -> Result<HashMap<String, Metric>, CoreError> {
        let metrics = self.metrics.read();
        Ok(names
            .iter()
            .filter_map(|name| metrics.get(name).map(|m| (name.clone(), m.clone())))
            .collect())
    }

    async fn create(&self, metric: &Metric) -> Result<(), CoreError> {
        metric.validate()?;
        {
            let mut metrics = self.metrics.write();
            if metrics.contains_key(&metric.name) {
                return Err(CoreError::validation(
                    "id",
                    format!("이미 존재하는 메트릭: {}", metric.name),
                ));
            }
            metrics.insert(metric.name.clone(), metric.clone());
        }
        self.after_write().await;
        Ok(())
    }

    async fn update(&self, metric: &Metric) -> Result<(), CoreError> {
        metric.validate()?;
        self.metrics
            .write()
            .insert(metric.name.clone(), metric.clone());
        self.after_write().await;
        Ok(())
    }

    async fn update_many(&self, batch: &[Metric]) -> Result<(), CoreError> {
        for metric in batch {
            metric.validate()?;
        }
        {
            let mut metrics = self.metrics.write();
            for metric in batch {
                metrics.insert(metric.name.clone(), metric.clone());
            }
        }
        self.after_write().await;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Metric>, CoreError> {
        Ok(self.sorted())
    }

    async fn merge_many(&self, batch: &[Metric]) -> Result<Vec<Metric>, CoreError> {
        let merged = {
            let mut metrics = self.metrics.write();
            let merged = merge_batch(&metrics, batch)?;
            for metric in &merged {
                metrics.insert(metric.name.clone(), metric.clone());
            }
            merged
        };
        self.after_write().await;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn merge_many_accumulates_and_replaces() {
        let repo = MemoryRepository::new();
        repo.merge_many(&[Metric::gauge("cpu", 42.0), Metric::counter("hits", 10)])
            .await
            .unwrap();
        let merged = repo
            .merge_many(&[Metric::gauge("cpu", 7.0), Metric::counter("hits", 5)])
            .await
            .unwrap();

        assert_eq!(merged, vec![Metric::gauge("cpu", 7.0), Metric::counter("hits", 15)]);

        let both = repo
            .get_many(&["cpu".to_string(), "hits".to_string(), "absent".to_string()])
            .await
            .unwrap();
        assert_eq!(both.len(), 2);
        assert_eq!(both["hits"], Metric::counter("hits", 15));
    }

    #[tokio::test]
    async fn failed_batch_leaves_state_untouched() {
        let repo = MemoryRepository::new();
        repo.update(&Metric::gauge("cpu", 1.0)).await.unwrap();

        // cpu의 종류를 바꾸려는 배치는 통째로 거부된다
        let result = repo
            .merge_many(&[Metric::counter("hits", 1), Metric::counter("cpu", 1)])
            .await;
        assert!(result.is_err());
        assert_eq!(repo.get("hits").await.unwrap(), None);
        assert_eq!(repo.get("cpu").await.unwrap(), Some(Metric::gauge("cpu", 1.0)));
    }

    #[tokio::test]
    async fn create_rejects_duplicates() {
        let repo = MemoryRepository::new();
        repo.create(&Metric::counter("hits", 1)).await.unwrap();
        assert!(repo.create(&Metric::counter("hits", 1)).await.is_err());
    }

    #[tokio::test]
    async fn list_is_sorted_by_name() {
        let repo = MemoryRepository::new();
        repo.update_many(&[Metric::gauge("b", 1.0), Metric::gauge("a", 2.0)])
            .await
            .unwrap();
        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn concurrent_counter_merges_do_not_lose_updates() {
        let repo = Arc::new(MemoryRepository::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.merge_many(&[Metric::counter("hits", 1)]).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(repo.get("hits").await.unwrap(), Some(Metric::counter("hits", 32)));
    }

    #[tokio::test]
    async fn sync_snapshot_writes_every_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.json");

        let repo = MemoryRepository::with_snapshot(&path, Duration::ZERO, false).unwrap();
        repo.merge_many(&[Metric::counter("hits", 3)]).await.unwrap();

        let on_disk = FileSnapshot::new(&path).load().unwrap();
        assert_eq!(on_disk, vec![Metric::counter("hits", 3)]);
    }

    #[tokio::test]
    async fn restore_reads_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.json");
        FileSnapshot::new(&path)
            .save(&[Metric::counter("hits", 10)])
            .unwrap();

        let restored = MemoryRepository::with_snapshot(&path, Duration::from_secs(300), true).unwrap();
        assert_eq!(restored.len(), 1);
        restored.merge_many(&[Metric::counter("hits", 5)]).await.unwrap();
        assert_eq!(restored.get("hits").await.unwrap(), Some(Metric::counter("hits", 15)));

        let fresh = MemoryRepository::with_snapshot(&path, Duration::from_secs(300), false).unwrap();
        assert!(fresh.is_empty());
    }

    #[tokio::test]
    async fn snapshot_loop_flushes_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.json");
        let repo =
            Arc::new(MemoryRepository::with_snapshot(&path, Duration::from_secs(3600), false).unwrap());
        repo.update(&Metric::gauge("cpu", 9.0)).await.unwrap();

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(repo.clone().run_snapshot_loop(Duration::from_secs(3600), rx));
        tx.send(true).unwrap();
        task.await.unwrap();

        assert_eq!(
            FileSnapshot::new(&path).load().unwrap(),
            vec![Metric::gauge("cpu", 9.0)]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sync_dumps_end_with_latest_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.json");
        let repo = Arc::new(MemoryRepository::with_snapshot(&path, Duration::ZERO, false).unwrap());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    repo.merge_many(&[Metric::counter("hits", 1)]).await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(
            FileSnapshot::new(&path).load().unwrap(),
            vec![Metric::counter("hits", 16)]
        );
    }

    #[tokio::test]
    async fn snapshot_loop_ignores_dropped_owner() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.json");
        let repo = Arc::new(MemoryRepository::with_snapshot(&path, Duration::ZERO, false).unwrap());

        let (tx, rx) = watch::channel(false);
        let mut task = tokio::spawn(repo.clone().run_snapshot_loop(Duration::ZERO, rx));
        drop(tx);

        // 소유자가 사라져도 종료 신호로 보지 않는다
        let waited = tokio::time::timeout(Duration::from_millis(50), &mut task).await;
        assert!(waited.is_err());
        task.abort();
        assert!(!path.exists());
    }
}
