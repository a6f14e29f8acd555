//! 메트릭 저장소 포트.
//!
//! 구현: `pulse-storage` crate (메모리, PostgreSQL, 재시도/페일오버 래퍼)

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::CoreError;
use crate::models::metric::{merge_batch, Metric};

/// 메트릭 저장소 인터페이스.
///
/// `update`/`update_many`는 이미 병합된 메트릭을 그대로 기록한다.
/// 읽기-병합-쓰기 전체는 `merge_many`가 담당한다.
#[async_trait]
pub trait MetricRepository: Send + Sync {
    /// 이름으로 조회
    async fn get(&self, name: &str) -> Result<Option<Metric>, CoreError>;

    /// 여러 이름을 한 번에 조회. 없는 이름은 결과에서 빠진다.
    async fn get_many(&self, names: &[String]) -> Result<HashMap<String, Metric>, CoreError>;

    /// 새 메트릭 기록
    async fn create(&self, metric: &Metric) -> Result<(), CoreError>;

    /// 메트릭 덮어쓰기
    async fn update(&self, metric: &Metric) -> Result<(), CoreError>;

    /// 여러 메트릭 덮어쓰기
    async fn update_many(&self, metrics: &[Metric]) -> Result<(), CoreError>;

    /// 저장소 도달 가능 여부
    async fn ping(&self) -> Result<(), CoreError>;

    /// 전체 메트릭 (이름순)
    async fn list(&self) -> Result<Vec<Metric>, CoreError>;

    /// 배치를 저장된 상태 위에 병합하고 결과를 기록한다.
    async fn merge_many(&self, batch: &[Metric]) -> Result<Vec<Metric>, CoreError> {
        let names = unique_names(batch);
        let existing = self.get_many(&names).await?;
        let merged = merge_batch(&existing, batch)?;
        self.update_many(&merged).await?;
        Ok(merged)
    }
}

/// 배치에 등장한 이름 (중복 제거, 등장 순서 유지)
pub fn unique_names(batch: &[Metric]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(batch.len());
    for metric in batch {
        if !names.iter().any(|n| n == &metric.name) {
            names.push(metric.name.clone());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// 기본 `merge_many` 경로를 확인하기 위한 최소 저장소
    #[derive(Default)]
    struct PlainRepository {
        rows: Mutex<HashMap<String, Metric>>,
    }

    #[async_trait]
    impl MetricRepository for PlainRepository {
        async fn get(&self, name: &str) -> Result<Option<Metric>, CoreError> {
            Ok(self.rows.lock().unwrap().get(name).cloned())
        }

        async fn get_many(&self, names: &[String]) -> Result<HashMap<String, Metric>, CoreError> {
            let rows = self.rows.lock().unwrap();
            Ok(names
                .iter()
                .filter_map(|n| rows.get(n).map(|m| (n.clone(), m.clone())))
                .collect())
        }

        async fn create(&self, metric: &Metric) -> Result<(), CoreError> {
            self.update(metric).await
        }

        async fn update(&self, metric: &Metric) -> Result<(), CoreError> {
            self.rows
                .lock()
                .unwrap()
                .insert(metric.name.clone(), metric.clone());
            Ok(())
        }

        async fn update_many(&self, metrics: &[Metric]) -> Result<(), CoreError> {
            for metric in metrics {
                self.update(metric).await?;
            }
            Ok(())
        }

        async fn ping(&self) -> Result<(), CoreError> {
            Ok(())
        }

        async fn list(&self) -> Result<Vec<Metric>, CoreError> {
            let mut all: Vec<Metric> = self.rows.lock().unwrap().values().cloned().collect();
            all.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(all)
        }
    }

    #[tokio::test]
    async fn default_merge_many_reads_merges_and_writes() {
        let repo = PlainRepository::default();
        repo.create(&Metric::counter("hits", 10)).await.unwrap();

        let merged = repo
            .merge_many(&[Metric::counter("hits", 5), Metric::gauge("cpu", 1.5)])
            .await
            .unwrap();
        assert_eq!(merged.len(), 2);

        assert_eq!(repo.get("hits").await.unwrap(), Some(Metric::counter("hits", 15)));
        assert_eq!(repo.get("cpu").await.unwrap(), Some(Metric::gauge("cpu", 1.5)));
    }

    #[test]
    fn unique_names_keeps_first_seen_order() {
        let batch = vec![
            Metric::gauge("b", 1.0),
            Metric::gauge("a", 1.0),
            Metric::gauge("b", 2.0),
        ];
        assert_eq!(unique_names(&batch), vec!["b".to_string(), "a".to_string()]);
    }
}
