//! proto ↔ 도메인 메트릭 변환.

use pulse_core::error::CoreError;
use pulse_core::models::metric::{Metric, MetricType};

use crate::pulse::v1;

impl From<MetricType> for v1::MetricKind {
    fn from(mtype: MetricType) -> Self {
        match mtype {
            MetricType::Gauge => v1::MetricKind::Gauge,
            MetricType::Counter => v1::MetricKind::Counter,
        }
    }
}

impl From<&Metric> for v1::Metric {
    fn from(metric: &Metric) -> Self {
        Self {
            id: metric.name.clone(),
            kind: v1::MetricKind::from(metric.mtype) as i32,
            value: metric.value,
            delta: metric.delta,
        }
    }
}

impl TryFrom<v1::Metric> for Metric {
    type Error = CoreError;

    fn try_from(proto: v1::Metric) -> Result<Self, Self::Error> {
        let mtype = match v1::MetricKind::try_from(proto.kind) {
            Ok(v1::MetricKind::Gauge) => MetricType::Gauge,
            Ok(v1::MetricKind::Counter) => MetricType::Counter,
            _ => {
                return Err(CoreError::validation(
                    "kind",
                    format!("알 수 없는 메트릭 종류: {}", proto.kind),
                ))
            }
        };

        let metric = Metric {
            name: proto.id,
            mtype,
            value: proto.value,
            delta: proto.delta,
        };
        metric.validate()?;
        Ok(metric)
    }
}

/// 도메인 배치 → proto 목록
pub fn to_proto_batch(metrics: &[Metric]) -> Vec<v1::Metric> {
    metrics.iter().map(v1::Metric::from).collect()
}

/// proto 목록 → 도메인 배치 (하나라도 잘못되면 실패)
pub fn from_proto_batch(metrics: Vec<v1::Metric>) -> Result<Vec<Metric>, CoreError> {
    metrics.into_iter().map(Metric::try_from).collect()
}
