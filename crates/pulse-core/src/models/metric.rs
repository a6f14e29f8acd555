//! 메트릭 값 타입과 병합 규칙.
//!
//! 게이지는 마지막 값으로 교체, 카운터는 누적한다.
//! 카운터 병합은 멱등이 아니다. 같은 증분을 두 번 적용하면 두 배가 된다.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// 메트릭 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// 최신 값만 유지
    Gauge,
    /// 증분 누적
    Counter,
}

impl MetricType {
    /// 와이어 표기 (`gauge` / `counter`)
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Gauge => "gauge",
            MetricType::Counter => "counter",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gauge" => Ok(MetricType::Gauge),
            "counter" => Ok(MetricType::Counter),
            other => Err(CoreError::validation(
                "type",
                format!("알 수 없는 메트릭 종류: {other}"),
            )),
        }
    }
}

/// 단일 메트릭.
///
/// 와이어 형태: `{"id": "...", "type": "gauge", "value": 1.5}` 또는
/// `{"id": "...", "type": "counter", "delta": 3}`. 없는 필드는 생략된다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// 고유 이름
    #[serde(rename = "id")]
    pub name: String,
    /// 종류
    #[serde(rename = "type")]
    pub mtype: MetricType,
    /// 게이지 값
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// 카운터 증분
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
}

impl Metric {
    /// 게이지 메트릭 생성
    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            mtype: MetricType::Gauge,
            value: Some(value),
            delta: None,
        }
    }

    /// 카운터 메트릭 생성
    pub fn counter(name: impl Into<String>, delta: i64) -> Self {
        Self {
            name: name.into(),
            mtype: MetricType::Counter,
            value: None,
            delta: Some(delta),
        }
    }

    /// URL 경로 세그먼트(`/update/{type}/{name}/{value}`)로부터 메트릭 생성
    pub fn parse(mtype: &str, name: &str, raw_value: &str) -> Result<Self, CoreError> {
        let mtype = MetricType::from_str(mtype)?;
        let metric = match mtype {
            MetricType::Gauge => {
                let value = raw_value.parse::<f64>().map_err(|e| {
                    CoreError::validation("value", format!("게이지 값 파싱 실패: {e}"))
                })?;
                Metric::gauge(name, value)
            }
            MetricType::Counter => {
                let delta = raw_value.parse::<i64>().map_err(|e| {
                    CoreError::validation("delta", format!("카운터 증분 파싱 실패: {e}"))
                })?;
                Metric::counter(name, delta)
            }
        };
        metric.validate()?;
        Ok(metric)
    }

    /// 불변식 검증: 이름 비어있지 않음, 종류에 맞는 필드 하나만 존재
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.is_empty() {
            return Err(CoreError::validation("id", "이름이 비어 있음"));
        }
        match (self.mtype, self.value, self.delta) {
            (MetricType::Gauge, Some(v), None) => {
                if v.is_finite() {
                    Ok(())
                } else {
                    Err(CoreError::validation("value", "유한하지 않은 게이지 값"))
                }
            }
            (MetricType::Counter, None, Some(_)) => Ok(()),
            (_, Some(_), Some(_)) => Err(CoreError::validation(
                "value",
                "value와 delta가 동시에 존재",
            )),
            (MetricType::Gauge, _, _) => Err(CoreError::validation("value", "게이지 값 누락")),
            (MetricType::Counter, _, _) => {
                Err(CoreError::validation("delta", "카운터 증분 누락"))
            }
        }
    }

    /// 들어온 메트릭을 현재 메트릭에 병합한다.
    ///
    /// 게이지는 값을 교체하고, 카운터는 증분을 더한다(오버플로 시 포화).
    /// 이미 저장된 이름의 종류는 바꿀 수 없다.
    pub fn merge(&mut self, incoming: &Metric) -> Result<(), CoreError> {
        if self.name != incoming.name {
            return Err(CoreError::validation(
                "id",
                format!("이름이 다른 메트릭 병합: {} / {}", self.name, incoming.name),
            ));
        }
        if self.mtype != incoming.mtype {
            return Err(CoreError::validation(
                "type",
                format!(
                    "{}의 종류는 {}이며 {}로 바꿀 수 없음",
                    self.name, self.mtype, incoming.mtype
                ),
            ));
        }
        match self.mtype {
            MetricType::Gauge => self.value = incoming.value,
            MetricType::Counter => {
                let current = self.delta.unwrap_or(0);
                self.delta = Some(current.saturating_add(incoming.delta.unwrap_or(0)));
            }
        }
        Ok(())
    }

    /// 평문 표현 (`GET /value/{type}/{name}` 응답)
    pub fn value_string(&self) -> String {
        match (self.value, self.delta) {
            (Some(v), _) => format!("{v}"),
            (None, Some(d)) => d.to_string(),
            (None, None) => String::new(),
        }
    }
}

/// 배치를 순서대로 기존 상태 위에 접어 병합한다.
///
/// 반환값은 이름당 하나, 배치에서 처음 등장한 순서.
/// 같은 이름의 게이지는 마지막 값이, 카운터는 증분 합계가 남는다.
pub fn merge_batch(
    existing: &HashMap<String, Metric>,
    batch: &[Metric],
) -> Result<Vec<Metric>, CoreError> {
    let mut order: Vec<String> = Vec::with_capacity(batch.len());
    let mut merged: HashMap<String, Metric> = HashMap::with_capacity(batch.len());

    for incoming in batch {
        incoming.validate()?;
        match merged.get_mut(&incoming.name) {
            Some(current) => current.merge(incoming)?,
            None => {
                let next = match existing.get(&incoming.name) {
                    Some(stored) => {
                        let mut stored = stored.clone();
                        stored.merge(incoming)?;
                        stored
                    }
                    None => incoming.clone(),
                };
                order.push(incoming.name.clone());
                merged.insert(incoming.name.clone(), next);
            }
        }
    }

    Ok(order
        .into_iter()
        .filter_map(|name| merged.remove(&name))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_wire_shape() {
        let json = serde_json::to_string(&Metric::gauge("cpu", 42.5)).unwrap();
        assert_eq!(json, r#"{"id":"cpu","type":"gauge","value":42.5}"#);
    }

    #[test]
    fn counter_wire_shape() {
        let json = serde_json::to_string(&Metric::counter("hits", 3)).unwrap();
        assert_eq!(json, r#"{"id":"hits","type":"counter","delta":3}"#);

        let parsed: Metric = serde_json::from_str(r#"{"id":"hits","type":"counter","delta":3}"#).unwrap();
        assert_eq!(parsed, Metric::counter("hits", 3));
    }

    #[test]
    fn unknown_type_is_rejected_by_serde() {
        let parsed = serde_json::from_str::<Metric>(r#"{"id":"x","type":"histogram","value":1}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn validate_rejects_broken_metrics() {
        let empty_name = Metric::gauge("", 1.0);
        assert!(empty_name.validate().is_err());

        let gauge_with_delta = Metric {
            name: "x".into(),
            mtype: MetricType::Gauge,
            value: None,
            delta: Some(1),
        };
        assert!(gauge_with_delta.validate().is_err());

        let both = Metric {
            name: "x".into(),
            mtype: MetricType::Counter,
            value: Some(1.0),
            delta: Some(1),
        };
        assert!(both.validate().is_err());

        assert!(Metric::gauge("x", f64::NAN).validate().is_err());
        assert!(Metric::gauge("x", f64::INFINITY).validate().is_err());
        assert!(Metric::counter("x", -5).validate().is_ok());
    }

    #[test]
    fn gauge_merge_is_last_write_wins_and_replay_safe() {
        let mut stored = Metric::gauge("cpu", 42.0);
        let incoming = Metric::gauge("cpu", 7.0);
        stored.merge(&incoming).unwrap();
        assert_eq!(stored.value, Some(7.0));
        stored.merge(&incoming).unwrap();
        assert_eq!(stored.value, Some(7.0));
    }

    #[test]
    fn counter_merge_accumulates() {
        let mut stored = Metric::counter("hits", 10);
        stored.merge(&Metric::counter("hits", 5)).unwrap();
        assert_eq!(stored.delta, Some(15));
    }

    #[test]
    fn counter_merge_is_not_idempotent() {
        let mut stored = Metric::counter("hits", 0);
        let incoming = Metric::counter("hits", 4);
        stored.merge(&incoming).unwrap();
        stored.merge(&incoming).unwrap();
        assert_eq!(stored.delta, Some(8));
    }

    #[test]
    fn counter_merge_saturates() {
        let mut stored = Metric::counter("hits", i64::MAX - 1);
        stored.merge(&Metric::counter("hits", 10)).unwrap();
        assert_eq!(stored.delta, Some(i64::MAX));

        let mut low = Metric::counter("hits", i64::MIN + 1);
        low.merge(&Metric::counter("hits", -10)).unwrap();
        assert_eq!(low.delta, Some(i64::MIN));
    }

    #[test]
    fn merge_rejects_type_change() {
        let mut stored = Metric::gauge("x", 1.0);
        let err = stored.merge(&Metric::counter("x", 1)).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        assert_eq!(stored.value, Some(1.0));
    }

    #[test]
    fn merge_batch_folds_in_order() {
        let mut existing = HashMap::new();
        existing.insert("hits".to_string(), Metric::counter("hits", 10));
        existing.insert("cpu".to_string(), Metric::gauge("cpu", 1.0));

        let batch = vec![
            Metric::gauge("cpu", 42.0),
            Metric::counter("hits", 5),
            Metric::counter("new", 1),
            Metric::gauge("cpu", 7.0),
            Metric::counter("hits", 2),
        ];
        let merged = merge_batch(&existing, &batch).unwrap();

        assert_eq!(
            merged,
            vec![
                Metric::gauge("cpu", 7.0),
                Metric::counter("hits", 17),
                Metric::counter("new", 1),
            ]
        );
    }

    #[test]
    fn merge_batch_rejects_invalid_member() {
        let batch = vec![Metric::gauge("ok", 1.0), Metric::gauge("", 2.0)];
        assert!(merge_batch(&HashMap::new(), &batch).is_err());
    }

    #[test]
    fn parse_from_url_segments() {
        assert_eq!(Metric::parse("gauge", "cpu", "7.5").unwrap(), Metric::gauge("cpu", 7.5));
        assert_eq!(Metric::parse("counter", "hits", "3").unwrap(), Metric::counter("hits", 3));
        assert!(Metric::parse("counter", "hits", "3.5").is_err());
        assert!(Metric::parse("gauge", "cpu", "abc").is_err());
        assert!(Metric::parse("summary", "cpu", "1").is_err());
    }

    #[test]
    fn value_string_is_plain() {
        assert_eq!(Metric::gauge("cpu", 42.0).value_string(), "42");
        assert_eq!(Metric::gauge("cpu", 0.25).value_string(), "0.25");
        assert_eq!(Metric::counter("hits", -3).value_string(), "-3");
    }
}
