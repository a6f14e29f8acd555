//! # pulse-agent
//!
//! PULSE 에이전트 바이너리 진입점.
//! 설정 로드, 송신기 조립, 수집 루프와 보고 파이프라인 실행, 종료 처리.

use anyhow::{Context, Result};
use clap::Parser;
use pulse_agent::{Reporter, ReporterConfig};
use pulse_core::config::{AgentConfig, Transport};
use pulse_core::config_manager::ConfigFile;
use pulse_core::lifecycle::Lifecycle;
use pulse_core::ports::sender::MetricSender;
use pulse_monitor::RuntimeCollector;
use pulse_network::http_client::HttpMetricSender;
use pulse_network::local_ip;
use pulse_security::{Encryptor, Signer};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// PULSE 메트릭 에이전트
///
/// 우선순위: 설정 파일 < 환경 변수 < 명령줄 플래그
#[derive(Parser, Debug)]
#[command(name = "pulse-agent")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON 설정 파일 경로
    #[arg(short = 'c', long, env = "CONFIG")]
    config: Option<PathBuf>,

    /// 서버 주소 (기본: localhost:8080)
    #[arg(short = 'a', long, env = "ADDRESS")]
    address: Option<String>,

    /// 수집 주기 (초)
    #[arg(short = 'p', long, env = "POLL_INTERVAL")]
    poll_interval: Option<u64>,

    /// 보고 주기 (초)
    #[arg(short = 'r', long, env = "REPORT_INTERVAL")]
    report_interval: Option<u64>,

    /// 동시 전송 워커 수
    #[arg(short = 'l', long, env = "RATE_LIMIT")]
    rate_limit: Option<usize>,

    /// HMAC 서명 공유 키
    #[arg(short = 'k', long, env = "KEY")]
    key: Option<String>,

    /// 서버 RSA 공개키 PEM 경로
    #[arg(long, env = "CRYPTO_KEY")]
    crypto_key: Option<PathBuf>,

    /// 전송 방식 (http, grpc)
    #[arg(long, env = "TRANSPORT")]
    transport: Option<Transport>,

    /// 배치 전송 여부
    #[arg(long, env = "BATCH")]
    batch: Option<bool>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,
}

impl Args {
    /// 지정된 값만 설정에 덮어쓴다
    fn apply(&self, config: &mut AgentConfig) {
        if let Some(address) = &self.address {
            config.address = address.clone();
        }
        if let Some(secs) = self.poll_interval {
            config.poll_interval_secs = secs;
        }
        if let Some(secs) = self.report_interval {
            config.report_interval_secs = secs;
        }
        if let Some(workers) = self.rate_limit {
            config.rate_limit = workers;
        }
        if let Some(key) = &self.key {
            config.key = Some(key.clone());
        }
        if let Some(path) = &self.crypto_key {
            config.crypto_key = Some(path.clone());
        }
        if let Some(transport) = self.transport {
            config.transport = transport;
        }
        if let Some(batch) = self.batch {
            config.batch = batch;
        }
    }
}

/// 송신기에 붙일 보안 설정
struct SealOptions {
    signer: Option<Signer>,
    encryptor: Option<Encryptor>,
    real_ip: Option<IpAddr>,
}

impl SealOptions {
    fn load(config: &AgentConfig) -> Result<Self> {
        let signer = config
            .key
            .as_deref()
            .filter(|key| !key.is_empty())
            .map(Signer::new);

        let encryptor = match &config.crypto_key {
            Some(path) => Some(
                Encryptor::from_pem_file(path)
                    .with_context(|| format!("공개키 로드 실패: {}", path.display()))?,
            ),
            None => None,
        };

        let real_ip = local_ip::outbound_ip(&config.address);
        if real_ip.is_none() {
            warn!("에이전트 IP 탐지 실패: X-Real-IP 없이 전송");
        }

        Ok(Self {
            signer,
            encryptor,
            real_ip,
        })
    }
}

/// 설정의 전송 방식으로 송신기 생성
fn build_sender(config: &AgentConfig) -> Result<Arc<dyn MetricSender>> {
    let seal = SealOptions::load(config)?;
    info!(
        "송신기: {} → {}, 서명={}, 암호화={}",
        config.transport,
        config.address,
        seal.signer.is_some(),
        seal.encryptor.is_some()
    );

    match config.transport {
        Transport::Http => {
            let mut sender = HttpMetricSender::new(&config.address, config.request_timeout())?;
            if let Some(signer) = seal.signer {
                sender = sender.with_signer(signer);
            }
            if let Some(encryptor) = seal.encryptor {
                sender = sender.with_encryptor(encryptor);
            }
            if let Some(ip) = seal.real_ip {
                sender = sender.with_real_ip(ip);
            }
            Ok(Arc::new(sender))
        }
        #[cfg(feature = "grpc")]
        Transport::Grpc => {
            use pulse_network::grpc::GrpcMetricSender;

            let mut sender =
                GrpcMetricSender::connect_lazy(&config.address, config.request_timeout())?;
            if let Some(signer) = seal.signer {
                sender = sender.with_signer(signer);
            }
            if let Some(encryptor) = seal.encryptor {
                sender = sender.with_encryptor(encryptor);
            }
            if let Some(ip) = seal.real_ip {
                sender = sender.with_real_ip(ip);
            }
            Ok(Arc::new(sender))
        }
        #[cfg(not(feature = "grpc"))]
        Transport::Grpc => anyhow::bail!("grpc feature 없이 빌드됨: --transport http 사용"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_filter = format!(
        "pulse_agent={},pulse_monitor={},pulse_network={},pulse_core={}",
        args.log_level, args.log_level, args.log_level, args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    let mut config: AgentConfig = ConfigFile::load_or_default(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;
    if config.report_interval_secs < config.poll_interval_secs {
        warn!(
            "보고 주기({}s)가 수집 주기({}s)보다 짧음: 같은 스냅샷을 반복 전송",
            config.report_interval_secs, config.poll_interval_secs
        );
    }

    info!("PULSE 에이전트 시작: 서버={}", config.address);

    let lifecycle = Lifecycle::new();
    let shutdown_rx = lifecycle.subscribe();

    let sender = build_sender(&config)?;
    let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(Vec::new()));

    let collector = RuntimeCollector::new();
    let polls = collector.poll_counter();
    let collector_task = tokio::spawn(collector.run(
        config.poll_interval(),
        snapshot_tx,
        shutdown_rx.clone(),
    ));
    let reporter = Reporter::new(ReporterConfig::from(&config), sender).with_poll_counter(polls);
    let reporter_task = tokio::spawn(reporter.run(snapshot_rx, shutdown_rx));

    if let Err(e) = lifecycle.stop_on_signal().await {
        warn!("시그널 핸들러 등록 실패: {e}");
        lifecycle.trigger("시그널 대기 불가");
    }

    if let Err(e) = collector_task.await {
        error!("수집 루프 실패: {e}");
    }
    match reporter_task.await {
        Ok(stats) => info!(
            "PULSE 에이전트 종료: 성공={}, 실패={}",
            stats.sent, stats.failed
        ),
        Err(e) => error!("리포터 실패: {e}"),
    }

    Ok(())
}
