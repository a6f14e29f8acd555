//! # pulse-server
//!
//! PULSE 수집 서버 바이너리 진입점.
//! 설정 로드, 저장소/보안 조립, HTTP·gRPC 서버 실행, 종료 처리.

use anyhow::{Context, Result};
use clap::Parser;
use ipnet::IpNet;
use pulse_core::config::ServerConfig;
use pulse_core::config_manager::ConfigFile;
use pulse_core::lifecycle::Lifecycle;
use pulse_security::{Decryptor, Signer};
use pulse_server::http::{self, AppState};
use pulse_server::storage::StorageStack;
use pulse_server::{MetricService, TransportSecurity};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// PULSE 메트릭 수집 서버
///
/// 우선순위: 설정 파일 < 환경 변수 < 명령줄 플래그
#[derive(Parser, Debug)]
#[command(name = "pulse-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON 설정 파일 경로
    #[arg(short = 'c', long, env = "CONFIG")]
    config: Option<PathBuf>,

    /// HTTP 수신 주소 (기본: localhost:8080)
    #[arg(short = 'a', long, env = "ADDRESS")]
    address: Option<String>,

    /// gRPC 수신 주소 (없으면 gRPC 비활성)
    #[arg(long, env = "GRPC_ADDRESS")]
    grpc_address: Option<String>,

    /// 메모리 저장소 파일 덤프 주기 (초, 0이면 쓰기마다 저장)
    #[arg(short = 'i', long, env = "STORE_INTERVAL")]
    store_interval: Option<u64>,

    /// 메모리 저장소 스냅샷 파일 경로
    #[arg(short = 'f', long, env = "FILE_STORAGE_PATH")]
    file_storage_path: Option<PathBuf>,

    /// 시작 시 스냅샷 복원 여부
    #[arg(short = 'r', long, env = "RESTORE")]
    restore: Option<bool>,

    /// PostgreSQL DSN
    #[arg(short = 'd', long, env = "DATABASE_DSN")]
    database_dsn: Option<String>,

    /// HMAC 서명 공유 키
    #[arg(short = 'k', long, env = "KEY")]
    key: Option<String>,

    /// RSA 개인키 PEM 경로
    #[arg(long, env = "CRYPTO_KEY")]
    crypto_key: Option<PathBuf>,

    /// 신뢰 서브넷 (CIDR)
    #[arg(short = 't', long, env = "TRUSTED_SUBNET")]
    trusted_subnet: Option<IpNet>,

    /// 영구 저장소 상태 점검 주기 (초)
    #[arg(long, env = "DB_CHECK_INTERVAL")]
    db_check_interval: Option<u64>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info", env = "LOG_LEVEL")]
    log_level: String,
}

impl Args {
    /// 지정된 값만 설정에 덮어쓴다
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(address) = &self.address {
            config.address = address.clone();
        }
        if let Some(grpc_address) = &self.grpc_address {
            config.grpc_address = Some(grpc_address.clone());
        }
        if let Some(secs) = self.store_interval {
            config.store_interval_secs = secs;
        }
        if let Some(path) = &self.file_storage_path {
            config.file_storage_path = Some(path.clone());
        }
        if let Some(restore) = self.restore {
            config.restore = restore;
        }
        if let Some(dsn) = &self.database_dsn {
            config.database_dsn = Some(dsn.clone());
        }
        if let Some(key) = &self.key {
            config.key = Some(key.clone());
        }
        if let Some(path) = &self.crypto_key {
            config.crypto_key = Some(path.clone());
        }
        if let Some(subnet) = self.trusted_subnet {
            config.trusted_subnet = Some(subnet);
        }
        if let Some(secs) = self.db_check_interval {
            config.db_check_interval_secs = secs;
        }
    }
}

/// 설정으로 전송 보안 구성
fn load_security(config: &ServerConfig) -> Result<TransportSecurity> {
    let signer = config
        .key
        .as_deref()
        .filter(|key| !key.is_empty())
        .map(Signer::new);

    let decryptor = match &config.crypto_key {
        Some(path) => Some(
            Decryptor::from_pem_file(path)
                .with_context(|| format!("개인키 로드 실패: {}", path.display()))?,
        ),
        None => None,
    };

    info!(
        "전송 보안: 서명={}, 복호화={}, 신뢰 서브넷={}",
        signer.is_some(),
        decryptor.is_some(),
        config
            .trusted_subnet
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    Ok(TransportSecurity::new(signer, decryptor, config.trusted_subnet))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_filter = format!(
        "pulse_server={},pulse_storage={},pulse_core={},pulse::security={},tower_http={}",
        args.log_level, args.log_level, args.log_level, args.log_level, args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    let mut config: ServerConfig = ConfigFile::load_or_default(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    info!("PULSE 서버 시작: {}", config.address);

    let lifecycle = Lifecycle::new();
    let shutdown_rx = lifecycle.subscribe();

    let security = Arc::new(load_security(&config)?);
    let storage = StorageStack::build(&config, shutdown_rx.clone()).await?;
    let background = storage.spawn_background(&config, &shutdown_rx);
    let service = Arc::new(MetricService::new(storage.repository.clone()));

    let listener = TcpListener::bind(&config.address)
        .await
        .with_context(|| format!("HTTP 주소 바인드 실패: {}", config.address))?;
    let http_task = tokio::spawn(http::serve(
        listener,
        AppState::new(service.clone(), security.clone()),
        shutdown_rx.clone(),
    ));

    #[cfg(feature = "grpc")]
    let grpc_task = match &config.grpc_address {
        Some(addr) => {
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("gRPC 주소 바인드 실패: {addr}"))?;
            let grpc_service =
                pulse_server::grpc::GrpcMetricsService::new(service.clone(), security.clone());
            Some(tokio::spawn(pulse_server::grpc::serve(
                listener,
                grpc_service,
                shutdown_rx.clone(),
            )))
        }
        None => None,
    };

    #[cfg(not(feature = "grpc"))]
    if config.grpc_address.is_some() {
        warn!("grpc feature 없이 빌드됨: gRPC 주소 무시");
    }

    if let Err(e) = lifecycle.stop_on_signal().await {
        warn!("시그널 핸들러 등록 실패: {e}");
        lifecycle.trigger("시그널 대기 불가");
    }

    match http_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("HTTP 서버 에러: {e}"),
        Err(e) => error!("HTTP 서버 태스크 실패: {e}"),
    }

    #[cfg(feature = "grpc")]
    if let Some(task) = grpc_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("gRPC 서버 에러: {e}"),
            Err(e) => error!("gRPC 서버 태스크 실패: {e}"),
        }
    }

    for task in background {
        if let Err(e) = task.await {
            error!("백그라운드 태스크 실패: {e}");
        }
    }
    storage.close().await;

    info!("PULSE 서버 종료");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_values() {
        let args = Args::try_parse_from([
            "pulse-server",
            "-a",
            "0.0.0.0:9090",
            "-i",
            "0",
            "-r",
            "false",
            "-t",
            "10.0.0.0/8",
        ])
        .unwrap();

        let mut config = ServerConfig {
            address: "from-file:1".to_string(),
            database_dsn: Some("postgres://file".to_string()),
            ..ServerConfig::default()
        };
        args.apply(&mut config);

        assert_eq!(config.address, "0.0.0.0:9090");
        assert_eq!(config.store_interval_secs, 0);
        assert!(!config.restore);
        assert_eq!(config.trusted_subnet, Some("10.0.0.0/8".parse().unwrap()));
        // 지정하지 않은 값은 파일 값 유지
        assert_eq!(config.database_dsn.as_deref(), Some("postgres://file"));
    }

    #[test]
    fn bad_subnet_is_rejected_by_parser() {
        assert!(Args::try_parse_from(["pulse-server", "-t", "not-a-cidr"]).is_err());
    }

    #[test]
    fn security_without_keys_is_open() {
        let security = load_security(&ServerConfig::default()).unwrap();
        assert!(!security.signs());
    }

    #[test]
    fn missing_private_key_file_fails() {
        let config = ServerConfig {
            crypto_key: Some(PathBuf::from("/nonexistent/private.pem")),
            ..ServerConfig::default()
        };
        assert!(load_security(&config).is_err());
    }
}
