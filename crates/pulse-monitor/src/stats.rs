//! 수집 값 묶음과 메트릭 표.
//!
//! 이름 → 값 매핑은 정적 표 하나로 끝낸다. 코어별 CPU 사용률만 개수가 가변이라 따로 만든다.

use pulse_core::models::metric::{Metric, MetricType};

use crate::poll_counter::POLL_COUNT;

/// 한 번의 폴링에서 읽은 값
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatSource {
    /// 전체 메모리 (bytes)
    pub total_memory: f64,
    /// 비어 있는 메모리 (bytes)
    pub free_memory: f64,
    /// 사용 가능한 메모리 (bytes)
    pub available_memory: f64,
    /// 사용 중인 메모리 (bytes)
    pub used_memory: f64,
    /// 전체 스왑 (bytes)
    pub total_swap: f64,
    /// 사용 중인 스왑 (bytes)
    pub used_swap: f64,
    /// 전체 CPU 사용률 (%)
    pub cpu_utilization: f64,
    /// 코어별 CPU 사용률 (%)
    pub per_cpu_utilization: Vec<f64>,
    /// 1분 부하 평균
    pub load_average_1: f64,
    /// 5분 부하 평균
    pub load_average_5: f64,
    /// 15분 부하 평균
    pub load_average_15: f64,
    /// 에이전트 프로세스 상주 메모리 (bytes)
    pub process_memory: f64,
    /// 에이전트 프로세스 CPU 사용률 (%)
    pub process_cpu: f64,
    /// 가동 시간 (초)
    pub uptime_secs: f64,
    /// 0 이상 1 미만 난수
    pub random_value: f64,
    /// 아직 서버에 전달되지 않은 폴링 횟수
    pub poll_count: i64,
}

/// 표 한 줄: 이름, 종류, 값 읽기
#[derive(Clone, Copy)]
pub struct StatEntry {
    /// 메트릭 이름
    pub name: &'static str,
    /// 메트릭 종류
    pub mtype: MetricType,
    /// 값 읽기
    pub read: fn(&StatSource) -> f64,
}

const fn gauge(name: &'static str, read: fn(&StatSource) -> f64) -> StatEntry {
    StatEntry {
        name,
        mtype: MetricType::Gauge,
        read,
    }
}

/// 고정 이름 메트릭 표
pub const STAT_TABLE: &[StatEntry] = &[
    gauge("TotalMemory", |s| s.total_memory),
    gauge("FreeMemory", |s| s.free_memory),
    gauge("AvailableMemory", |s| s.available_memory),
    gauge("UsedMemory", |s| s.used_memory),
    gauge("TotalSwap", |s| s.total_swap),
    gauge("SwapUsed", |s| s.used_swap),
    gauge("CPUutilization", |s| s.cpu_utilization),
    gauge("LoadAverage1", |s| s.load_average_1),
    gauge("LoadAverage5", |s| s.load_average_5),
    gauge("LoadAverage15", |s| s.load_average_15),
    gauge("ProcessMemory", |s| s.process_memory),
    gauge("ProcessCPU", |s| s.process_cpu),
    gauge("Uptime", |s| s.uptime_secs),
    gauge("RandomValue", |s| s.random_value),
    StatEntry {
        name: POLL_COUNT,
        mtype: MetricType::Counter,
        read: |s| s.poll_count as f64,
    },
];

impl StatEntry {
    /// 표 항목을 메트릭으로 변환
    pub fn to_metric(&self, source: &StatSource) -> Metric {
        let raw = (self.read)(source);
        match self.mtype {
            MetricType::Gauge => Metric::gauge(self.name, finite_or_zero(raw)),
            MetricType::Counter => Metric::counter(self.name, raw as i64),
        }
    }
}

impl StatSource {
    /// 표와 코어별 CPU로 스냅샷 생성
    pub fn to_metrics(&self) -> Vec<Metric> {
        let mut metrics: Vec<Metric> = STAT_TABLE.iter().map(|e| e.to_metric(self)).collect();
        metrics.extend(
            self.per_cpu_utilization
                .iter()
                .enumerate()
                .map(|(i, usage)| {
                    Metric::gauge(format!("CPUutilization{}", i + 1), finite_or_zero(*usage))
                }),
        );
        metrics
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}
