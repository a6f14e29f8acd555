//! 메트릭 수신/병합 서비스.
//!
//! 디코딩이 끝난 메트릭을 받아 저장소의 `merge_many`로 넘긴다.
//! 병합(읽기 → 병합 → 쓰기)은 저장소 한 번의 연산이므로
//! 재시도 계층은 전체 과정을 처음부터 다시 실행한다.

use pulse_core::error::CoreError;
use pulse_core::models::metric::{Metric, MetricType};
use pulse_core::ports::repository::MetricRepository;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 메트릭 수신 서비스
#[derive(Clone)]
pub struct MetricService {
    repo: Arc<dyn MetricRepository>,
}

impl MetricService {
    /// 저장소 포트로 서비스 생성
    pub fn new(repo: Arc<dyn MetricRepository>) -> Self {
        Self { repo }
    }

    /// 단건 병합. 병합 후 저장된 메트릭을 돌려준다.
    pub async fn update(&self, metric: Metric) -> Result<Metric, CoreError> {
        metric.validate()?;
        let name = metric.name.clone();
        let merged = self.repo.merge_many(std::slice::from_ref(&metric)).await?;
        debug!("메트릭 병합: {name}");
        merged
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::Internal(format!("병합 결과 없음: {name}")))
    }

    /// 배치 병합. 이름당 하나, 배치에서 처음 등장한 순서로 돌려준다.
    pub async fn update_many(&self, batch: Vec<Metric>) -> Result<Vec<Metric>, CoreError> {
        if batch.is_empty() {
            return Err(CoreError::validation("metrics", "빈 배치"));
        }
        let merged = self.repo.merge_many(&batch).await?;
        debug!("배치 병합: 수신 {}개 → 저장 {}개", batch.len(), merged.len());
        Ok(merged)
    }

    /// 이름과 종류로 조회. 종류가 다르면 없는 것으로 본다.
    pub async fn get(&self, mtype: MetricType, name: &str) -> Result<Metric, CoreError> {
        match self.repo.get(name).await? {
            Some(metric) if metric.mtype == mtype => Ok(metric),
            _ => Err(CoreError::metric_not_found(format!("{mtype}/{name}"))),
        }
    }

    /// 여러 이름 조회 (없는 이름은 빠진다)
    pub async fn get_many(&self, names: &[String]) -> Result<HashMap<String, Metric>, CoreError> {
        self.repo.get_many(names).await
    }

    /// 전체 목록 (이름순)
    pub async fn list(&self) -> Result<Vec<Metric>, CoreError> {
        self.repo.list().await
    }

    /// 영구 저장소 도달 가능 여부
    pub async fn ping(&self) -> Result<(), CoreError> {
        self.repo.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_storage::MemoryRepository;

    fn service() -> MetricService {
        MetricService::new(Arc::new(MemoryRepository::new()))
    }

    #[tokio::test]
    async fn gauge_replaces_and_counter_accumulates() {
        let service = service();

        service.update(Metric::gauge("cpu", 42.0)).await.unwrap();
        let cpu = service.update(Metric::gauge("cpu", 7.0)).await.unwrap();
        assert_eq!(cpu, Metric::gauge("cpu", 7.0));

        service.update(Metric::counter("hits", 10)).await.unwrap();
        let hits = service.update(Metric::counter("hits", 5)).await.unwrap();
        assert_eq!(hits, Metric::counter("hits", 15));
    }

    #[tokio::test]
    async fn replaying_a_counter_doubles_it() {
        let service = service();
        let delta = Metric::counter("hits", 4);
        service.update(delta.clone()).await.unwrap();
        let replayed = service.update(delta).await.unwrap();
        assert_eq!(replayed.delta, Some(8));
    }

    #[tokio::test]
    async fn batch_dedups_by_name() {
        let service = service();
        let merged = service
            .update_many(vec![
                Metric::gauge("cpu", 1.0),
                Metric::counter("hits", 2),
                Metric::gauge("cpu", 3.0),
                Metric::counter("hits", 5),
            ])
            .await
            .unwrap();
        assert_eq!(merged, vec![Metric::gauge("cpu", 3.0), Metric::counter("hits", 7)]);

        let both = service
            .get_many(&["cpu".to_string(), "hits".to_string()])
            .await
            .unwrap();
        assert_eq!(both.len(), 2);
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let err = service().update_many(Vec::new()).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[tokio::test]
    async fn get_checks_type() {
        let service = service();
        service.update(Metric::gauge("cpu", 1.0)).await.unwrap();

        assert!(service.get(MetricType::Gauge, "cpu").await.is_ok());
        let err = service.get(MetricType::Counter, "cpu").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
        assert!(service.get(MetricType::Gauge, "absent").await.is_err());
    }

    #[tokio::test]
    async fn invalid_metric_never_reaches_storage() {
        let service = service();
        let mut broken = Metric::gauge("cpu", 1.0);
        broken.delta = Some(1);
        assert!(service.update(broken).await.is_err());
        assert!(service.list().await.unwrap().is_empty());
    }
}
