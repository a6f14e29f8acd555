//! 전송 결과 모델.

use crate::error::CoreError;
use crate::models::metric::Metric;

/// 한 번의 전송 결과. 결과 싱크가 소비하며 저장되지 않는다.
#[derive(Debug)]
pub enum SendOutcome {
    /// 단건 전송 성공: 서버가 병합한 메트릭
    Single(Metric),
    /// 배치 전송 성공: 서버가 병합한 메트릭 목록
    Batch(Vec<Metric>),
    /// 전송 실패
    Failed(CoreError),
}

impl SendOutcome {
    /// 성공 여부
    pub fn is_success(&self) -> bool {
        !matches!(self, SendOutcome::Failed(_))
    }

    /// 결과에 포함된 메트릭 수 (실패는 0)
    pub fn metric_count(&self) -> usize {
        match self {
            SendOutcome::Single(_) => 1,
            SendOutcome::Batch(metrics) => metrics.len(),
            SendOutcome::Failed(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_counts() {
        assert_eq!(SendOutcome::Single(Metric::gauge("a", 1.0)).metric_count(), 1);
        let batch = SendOutcome::Batch(vec![Metric::gauge("a", 1.0), Metric::counter("b", 2)]);
        assert_eq!(batch.metric_count(), 2);
        assert!(batch.is_success());

        let failed = SendOutcome::Failed(CoreError::Closed);
        assert_eq!(failed.metric_count(), 0);
        assert!(!failed.is_success());
    }
}
