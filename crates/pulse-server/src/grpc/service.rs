//! `Metrics` gRPC 서비스 구현.
//!
//! 메타데이터: `x-real-ip`(신뢰 서브넷), `hashsha256`(평문 JSON 서명), `encrypted`.
//! 암호화된 요청은 `metric(s)`가 비어 있고 `encrypted_message`에 JSON 평문의 봉투가 담긴다.

use pulse_api_contracts::pulse::v1::metrics_server::{Metrics, MetricsServer};
use pulse_api_contracts::pulse::v1::{
    MetricRequest, MetricResponse, MetricsRequest, MetricsResponse,
};
use pulse_api_contracts::{from_proto_batch, to_proto_batch};
use pulse_core::error::CoreError;
use pulse_core::lifecycle::{stopped, ShutdownRx};
use pulse_core::models::metric::Metric;
use pulse_security::headers::{ENCRYPTED_METADATA, HASH_METADATA, REAL_IP_METADATA};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::metadata::MetadataMap;
use tonic::{Request, Response, Status};
use tracing::{debug, info};

use super::map_core_error;
use crate::ingest::MetricService;
use crate::security::TransportSecurity;

/// gRPC 메트릭 서비스
#[derive(Clone)]
pub struct GrpcMetricsService {
    service: Arc<MetricService>,
    security: Arc<TransportSecurity>,
}

impl GrpcMetricsService {
    /// 새 서비스 생성
    pub fn new(service: Arc<MetricService>, security: Arc<TransportSecurity>) -> Self {
        Self { service, security }
    }

    /// tonic 서버에 붙일 서비스로 변환
    pub fn into_service(self) -> MetricsServer<Self> {
        MetricsServer::new(self)
    }

    /// 서브넷 확인 → 복호화(또는 proto 디코딩) → 평문 서명 검증
    fn unseal<T, F>(
        &self,
        metadata: &MetadataMap,
        encrypted_message: Vec<u8>,
        decode_plain: F,
    ) -> Result<T, CoreError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, CoreError>,
    {
        self.security
            .check_peer(metadata_str(metadata, REAL_IP_METADATA))?;

        let encrypted = metadata_str(metadata, ENCRYPTED_METADATA)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        let (payload, plaintext) = if encrypted {
            let plaintext = self.security.open(encrypted_message, true)?;
            (serde_json::from_slice::<T>(&plaintext)?, plaintext)
        } else {
            let payload = decode_plain()?;
            let plaintext = serde_json::to_vec(&payload)?;
            (payload, plaintext)
        };

        self.security
            .verify(&plaintext, metadata_str(metadata, HASH_METADATA))?;
        Ok(payload)
    }
}

#[tonic::async_trait]
impl Metrics for GrpcMetricsService {
    async fn set_metric(
        &self,
        request: Request<MetricRequest>,
    ) -> Result<Response<MetricResponse>, Status> {
        let (metadata, _, message) = request.into_parts();
        let metric: Metric = self
            .unseal(&metadata, message.encrypted_message, || {
                let proto = message
                    .metric
                    .ok_or_else(|| CoreError::validation("metric", "메트릭 누락"))?;
                Metric::try_from(proto)
            })
            .map_err(map_core_error)?;

        debug!("gRPC 메트릭 수신: {}", metric.name);
        let merged = self.service.update(metric).await.map_err(map_core_error)?;

        Ok(Response::new(MetricResponse {
            metric: Some((&merged).into()),
        }))
    }

    async fn set_metrics(
        &self,
        request: Request<MetricsRequest>,
    ) -> Result<Response<MetricsResponse>, Status> {
        let (metadata, _, message) = request.into_parts();
        let batch: Vec<Metric> = self
            .unseal(&metadata, message.encrypted_message, || {
                from_proto_batch(message.metrics)
            })
            .map_err(map_core_error)?;

        debug!("gRPC 배치 수신: {}개", batch.len());
        let merged = self
            .service
            .update_many(batch)
            .await
            .map_err(map_core_error)?;

        Ok(Response::new(MetricsResponse {
            metrics: to_proto_batch(&merged),
        }))
    }
}

fn metadata_str<'a>(metadata: &'a MetadataMap, key: &str) -> Option<&'a str> {
    metadata.get(key).and_then(|v| v.to_str().ok())
}

/// 종료 신호까지 gRPC 서버 실행
pub async fn serve(
    listener: TcpListener,
    service: GrpcMetricsService,
    mut shutdown_rx: ShutdownRx,
) -> Result<(), tonic::transport::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!("gRPC 서버 시작: {addr}");
    }

    tonic::transport::Server::builder()
        .add_service(service.into_service())
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
            stopped(&mut shutdown_rx).await;
            info!("gRPC 서버 종료 신호 수신");
        })
        .await?;

    info!("gRPC 서버 종료");
    Ok(())
}
