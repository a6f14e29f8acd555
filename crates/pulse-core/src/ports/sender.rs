//! 메트릭 송신 포트.
//!
//! 구현: `pulse-network` crate (HTTP/JSON, gRPC)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::metric::Metric;

/// 서버로 메트릭을 보내는 송신기.
///
/// 송신기는 재시도하지 않는다. 실패는 결과로 돌려주고,
/// 다음 보고 주기가 현재 스냅샷을 다시 보낸다.
#[async_trait]
pub trait MetricSender: Send + Sync {
    /// 단건 전송: 서버가 병합한 메트릭 반환
    async fn send_metric(&self, metric: &Metric) -> Result<Metric, CoreError>;

    /// 배치 전송: 서버가 병합한 메트릭 목록 반환
    async fn send_batch(&self, metrics: &[Metric]) -> Result<Vec<Metric>, CoreError>;

    /// 종료 시 한 번 호출. 이후 전송은 `CoreError::Closed`로 실패한다.
    async fn close(&self) -> Result<(), CoreError>;
}
