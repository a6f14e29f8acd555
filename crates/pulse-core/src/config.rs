//! 에이전트/서버 설정 구조체.
//!
//! 주소, 수집/보고 주기, 워커 수, 보안 키, 저장소 설정 등
//! 런타임 설정을 정의한다. JSON 파일에서 로드한 뒤 CLI 플래그와
//! 환경변수로 덮어쓴다.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::CoreError;

// ============================================================
// 에이전트 설정
// ============================================================

/// 에이전트 전송 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// HTTP/JSON (gzip)
    #[default]
    Http,
    /// gRPC (`pulse.v1.Metrics`)
    Grpc,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Http => f.write_str("http"),
            Transport::Grpc => f.write_str("grpc"),
        }
    }
}

impl FromStr for Transport {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Transport::Http),
            "grpc" => Ok(Transport::Grpc),
            other => Err(CoreError::Config(format!("알 수 없는 전송 방식: {other}"))),
        }
    }
}

/// 에이전트 설정. 리포터 수명 동안 불변.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// 서버 주소 (`host:port` 또는 URL)
    #[serde(default = "default_address")]
    pub address: String,
    /// 전송 방식
    #[serde(default)]
    pub transport: Transport,
    /// 배치 전송 여부 (false면 메트릭당 한 요청)
    #[serde(default = "default_true")]
    pub batch: bool,
    /// 수집 주기 (초)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// 보고 주기 (초)
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
    /// 동시 전송 워커 수
    #[serde(default = "default_rate_limit")]
    pub rate_limit: usize,
    /// HMAC 서명 공유 키
    #[serde(default)]
    pub key: Option<String>,
    /// 서버 RSA 공개키 PEM 경로
    #[serde(default)]
    pub crypto_key: Option<PathBuf>,
    /// 요청 타임아웃 (초)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            transport: Transport::default(),
            batch: true,
            poll_interval_secs: default_poll_interval_secs(),
            report_interval_secs: default_report_interval_secs(),
            rate_limit: default_rate_limit(),
            key: None,
            crypto_key: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AgentConfig {
    /// 설정값 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.address.trim().is_empty() {
            return Err(CoreError::Config("서버 주소가 비어 있음".to_string()));
        }
        if self.poll_interval_secs == 0 {
            return Err(CoreError::Config("수집 주기는 0보다 커야 함".to_string()));
        }
        if self.report_interval_secs == 0 {
            return Err(CoreError::Config("보고 주기는 0보다 커야 함".to_string()));
        }
        if self.rate_limit == 0 {
            return Err(CoreError::Config("워커 수는 1 이상이어야 함".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(CoreError::Config("요청 타임아웃은 0보다 커야 함".to_string()));
        }
        Ok(())
    }

    /// 수집 주기
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// 보고 주기
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    /// 요청 타임아웃
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ============================================================
// 서버 설정
// ============================================================

/// 영구 저장소 재시도 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageRetryConfig {
    /// 최대 재시도 횟수 (총 시도 = 1 + max_retries)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 첫 대기 시간 (밀리초)
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// 대기 시간 배수
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// 대기 시간 상한 (밀리초)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// 호출당 타임아웃 (밀리초, 없으면 무제한)
    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
}

impl Default for StorageRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            call_timeout_ms: None,
        }
    }
}

/// 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP 수신 주소
    #[serde(default = "default_address")]
    pub address: String,
    /// gRPC 수신 주소 (없으면 gRPC 비활성)
    #[serde(default)]
    pub grpc_address: Option<String>,
    /// 메모리 저장소 파일 덤프 주기 (초, 0이면 쓰기마다 동기 저장)
    #[serde(default = "default_store_interval_secs")]
    pub store_interval_secs: u64,
    /// 메모리 저장소 스냅샷 파일 경로
    #[serde(default)]
    pub file_storage_path: Option<PathBuf>,
    /// 시작 시 스냅샷 복원 여부
    #[serde(default = "default_true")]
    pub restore: bool,
    /// PostgreSQL DSN
    #[serde(default)]
    pub database_dsn: Option<String>,
    /// HMAC 서명 공유 키
    #[serde(default)]
    pub key: Option<String>,
    /// RSA 개인키 PEM 경로
    #[serde(default)]
    pub crypto_key: Option<PathBuf>,
    /// 신뢰 서브넷 (CIDR)
    #[serde(default)]
    pub trusted_subnet: Option<IpNet>,
    /// 영구 저장소 상태 점검 주기 (초)
    #[serde(default = "default_db_check_interval_secs")]
    pub db_check_interval_secs: u64,
    /// 영구 저장소 재시도 설정
    #[serde(default)]
    pub storage_retry: StorageRetryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            grpc_address: None,
            store_interval_secs: default_store_interval_secs(),
            file_storage_path: None,
            restore: true,
            database_dsn: None,
            key: None,
            crypto_key: None,
            trusted_subnet: None,
            db_check_interval_secs: default_db_check_interval_secs(),
            storage_retry: StorageRetryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// 설정값 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.address.trim().is_empty() {
            return Err(CoreError::Config("수신 주소가 비어 있음".to_string()));
        }
        if self.db_check_interval_secs == 0 {
            return Err(CoreError::Config(
                "저장소 점검 주기는 0보다 커야 함".to_string(),
            ));
        }
        let retry = &self.storage_retry;
        if !(retry.multiplier.is_finite() && retry.multiplier >= 1.0) {
            return Err(CoreError::Config(format!(
                "재시도 배수는 1 이상이어야 함: {}",
                retry.multiplier
            )));
        }
        if retry.max_delay_ms < retry.initial_delay_ms {
            return Err(CoreError::Config(
                "재시도 대기 상한이 첫 대기보다 작음".to_string(),
            ));
        }
        if matches!(self.database_dsn.as_deref(), Some(dsn) if dsn.trim().is_empty()) {
            return Err(CoreError::Config("DSN이 비어 있음".to_string()));
        }
        Ok(())
    }

    /// 스냅샷 덤프 주기 (0이면 동기 저장)
    pub fn store_interval(&self) -> Duration {
        Duration::from_secs(self.store_interval_secs)
    }

    /// 영구 저장소 점검 주기
    pub fn db_check_interval(&self) -> Duration {
        Duration::from_secs(self.db_check_interval_secs)
    }
}

fn default_address() -> String {
    "localhost:8080".to_string()
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_report_interval_secs() -> u64 {
    10
}

fn default_rate_limit() -> usize {
    1
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_store_interval_secs() -> u64 {
    300
}

fn default_db_check_interval_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_multiplier() -> f64 {
    3.0
}

fn default_max_delay_ms() -> u64 {
    5_000
}
