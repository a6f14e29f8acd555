//! 에이전트 송신기 → 서버 → 저장소 전 구간 테스트.
//!
//! 실제 TCP 포트에 서버를 띄우고 `HttpMetricSender`/`GrpcMetricSender`로 보낸다.
//! 요청은 gzip + 서명 + 하이브리드 암호화를 모두 거친다.

#![cfg(feature = "grpc")]

use pulse_core::error::CoreError;
use pulse_core::models::metric::Metric;
use pulse_core::ports::repository::MetricRepository;
use pulse_core::ports::sender::MetricSender;
use pulse_network::grpc::GrpcMetricSender;
use pulse_network::http_client::HttpMetricSender;
use pulse_security::{generate_keypair, Encryptor, Signer};
use pulse_server::grpc::GrpcMetricsService;
use pulse_server::http::{self, AppState};
use pulse_server::{MetricService, TransportSecurity};
use pulse_storage::MemoryRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const KEY: &str = "e2e-shared-key";

/// 테스트 서버 핸들
struct TestServer {
    http_addr: String,
    grpc_addr: String,
    repo: Arc<MemoryRepository>,
    encryptor: Encryptor,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl TestServer {
    async fn start(trusted_subnet: Option<&str>) -> Self {
        let (decryptor, encryptor) = generate_keypair(2048).unwrap();
        let security = Arc::new(TransportSecurity::new(
            Some(Signer::new(KEY)),
            Some(decryptor),
            trusted_subnet.map(|s| s.parse().unwrap()),
        ));
        let repo = Arc::new(MemoryRepository::new());
        let service = Arc::new(MetricService::new(repo.clone()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let http_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let grpc_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let http_addr = http_listener.local_addr().unwrap().to_string();
        let grpc_addr = grpc_listener.local_addr().unwrap().to_string();

        let http_task = tokio::spawn({
            let state = AppState::new(service.clone(), security.clone());
            let rx = shutdown_rx.clone();
            async move {
                http::serve(http_listener, state, rx).await.unwrap();
            }
        });
        let grpc_task = tokio::spawn({
            let grpc = GrpcMetricsService::new(service, security);
            async move {
                pulse_server::grpc::serve(grpc_listener, grpc, shutdown_rx)
                    .await
                    .unwrap();
            }
        });

        Self {
            http_addr,
            grpc_addr,
            repo,
            encryptor,
            shutdown_tx,
            tasks: vec![http_task, grpc_task],
        }
    }

    fn http_sender(&self) -> HttpMetricSender {
        HttpMetricSender::new(&self.http_addr, Duration::from_secs(5))
            .unwrap()
            .with_signer(Signer::new(KEY))
            .with_encryptor(self.encryptor.clone())
    }

    fn grpc_sender(&self) -> GrpcMetricSender {
        GrpcMetricSender::connect_lazy(&self.grpc_addr, Duration::from_secs(5))
            .unwrap()
            .with_signer(Signer::new(KEY))
            .with_encryptor(self.encryptor.clone())
    }

    async fn stop(self) {
        self.shutdown_tx.send(true).unwrap();
        for task in self.tasks {
            task.await.unwrap();
        }
    }
}

#[tokio::test]
async fn http_scenario_gauge_replace_counter_accumulate() {
    let server = TestServer::start(None).await;
    let sender = server.http_sender();

    sender.send_metric(&Metric::gauge("cpu", 42.0)).await.unwrap();
    let cpu = sender.send_metric(&Metric::gauge("cpu", 7.0)).await.unwrap();
    assert_eq!(cpu, Metric::gauge("cpu", 7.0));

    sender.send_metric(&Metric::counter("hits", 10)).await.unwrap();
    let hits = sender.send_metric(&Metric::counter("hits", 5)).await.unwrap();
    assert_eq!(hits, Metric::counter("hits", 15));

    let merged = sender
        .send_batch(&[Metric::gauge("cpu", 1.5), Metric::counter("hits", 1)])
        .await
        .unwrap();
    assert_eq!(merged, vec![Metric::gauge("cpu", 1.5), Metric::counter("hits", 16)]);

    let stored = server
        .repo
        .get_many(&["cpu".to_string(), "hits".to_string()])
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored["cpu"], Metric::gauge("cpu", 1.5));
    assert_eq!(stored["hits"], Metric::counter("hits", 16));

    drop(sender);
    server.stop().await;
}

#[tokio::test]
async fn grpc_scenario_matches_http() {
    let server = TestServer::start(None).await;
    let sender = server.grpc_sender();

    sender.send_metric(&Metric::gauge("cpu", 42.0)).await.unwrap();
    sender.send_metric(&Metric::gauge("cpu", 7.0)).await.unwrap();
    sender.send_metric(&Metric::counter("hits", 10)).await.unwrap();
    let merged = sender
        .send_batch(&[Metric::counter("hits", 5)])
        .await
        .unwrap();
    assert_eq!(merged, vec![Metric::counter("hits", 15)]);

    assert_eq!(
        server.repo.get("cpu").await.unwrap(),
        Some(Metric::gauge("cpu", 7.0))
    );

    drop(sender);
    server.stop().await;
}

#[tokio::test]
async fn wrong_key_is_rejected_on_both_transports() {
    let server = TestServer::start(None).await;

    let http = HttpMetricSender::new(&server.http_addr, Duration::from_secs(5))
        .unwrap()
        .with_signer(Signer::new("wrong"));
    assert!(http.send_metric(&Metric::gauge("cpu", 1.0)).await.is_err());

    let grpc = GrpcMetricSender::connect_lazy(&server.grpc_addr, Duration::from_secs(5))
        .unwrap()
        .with_signer(Signer::new("wrong"));
    let err = grpc.send_metric(&Metric::gauge("cpu", 1.0)).await.unwrap_err();
    assert!(matches!(err, CoreError::Signature(_)));

    assert!(server.repo.is_empty());
    drop((http, grpc));
    server.stop().await;
}

#[tokio::test]
async fn trusted_subnet_checks_agent_ip() {
    let server = TestServer::start(Some("127.0.0.0/8")).await;

    let outsider = server.http_sender().with_real_ip("192.168.10.1".parse().unwrap());
    let err = outsider.send_metric(&Metric::gauge("cpu", 1.0)).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    let insider = server.http_sender().with_real_ip("127.0.0.1".parse().unwrap());
    insider.send_metric(&Metric::gauge("cpu", 1.0)).await.unwrap();

    let grpc_outsider = server.grpc_sender().with_real_ip("192.168.10.1".parse().unwrap());
    let err = grpc_outsider
        .send_metric(&Metric::gauge("cpu", 2.0))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    drop((outsider, insider, grpc_outsider));
    server.stop().await;
}

#[tokio::test]
async fn closed_sender_stops_sending() {
    let server = TestServer::start(None).await;
    let sender = server.http_sender();
    sender.close().await.unwrap();
    assert!(matches!(
        sender.send_metric(&Metric::gauge("cpu", 1.0)).await.unwrap_err(),
        CoreError::Closed
    ));
    drop(sender);
    server.stop().await;
}
