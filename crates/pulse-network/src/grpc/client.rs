//! gRPC 메트릭 송신기
//!
//! `MetricSender` 포트 구현. 평문일 때는 proto 메시지에 메트릭을 담고,
//! 암호화할 때는 `metric(s)`를 비우고 JSON 평문의 봉투를 `encrypted_message`에 담는다.
//! 서명은 두 경우 모두 JSON 평문 위에서 계산해 `hashsha256` 메타데이터로 보낸다.

use async_trait::async_trait;
use pulse_api_contracts::pulse::v1::metrics_client::MetricsClient;
use pulse_api_contracts::pulse::v1::{MetricRequest, MetricsRequest};
use pulse_api_contracts::{from_proto_batch, to_proto_batch};
use pulse_core::error::CoreError;
use pulse_core::models::metric::Metric;
use pulse_core::ports::sender::MetricSender;
use pulse_security::headers::{ENCRYPTED_METADATA, HASH_METADATA, REAL_IP_METADATA};
use pulse_security::{Encryptor, Signer};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tonic::metadata::MetadataValue;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, error};

use super::status_to_core_error;
use crate::sealing::{PayloadSealer, SealedPayload};

/// gRPC 메트릭 송신기
pub struct GrpcMetricSender {
    client: MetricsClient<Channel>,
    endpoint: String,
    sealer: PayloadSealer,
    real_ip: Option<IpAddr>,
    closed: AtomicBool,
}

impl GrpcMetricSender {
    /// 지연 연결 채널로 송신기 생성. 첫 요청 때 연결한다.
    pub fn connect_lazy(address: &str, timeout: Duration) -> Result<Self, CoreError> {
        let endpoint_url = normalize_endpoint(address);
        let channel = Endpoint::from_shared(endpoint_url.clone())
            .map_err(|e| CoreError::Network(format!("invalid gRPC endpoint: {e}")))?
            .connect_timeout(timeout)
            .timeout(timeout)
            .connect_lazy();

        debug!(endpoint = %endpoint_url, "gRPC 송신기 생성");
        Ok(Self {
            client: MetricsClient::new(channel),
            endpoint: endpoint_url,
            sealer: PayloadSealer::default(),
            real_ip: None,
            closed: AtomicBool::new(false),
        })
    }

    /// HMAC 서명기 설정
    pub fn with_signer(mut self, signer: Signer) -> Self {
        self.sealer.set_signer(signer);
        self
    }

    /// 봉투 암호화기 설정
    pub fn with_encryptor(mut self, encryptor: Encryptor) -> Self {
        self.sealer.set_encryptor(encryptor);
        self
    }

    /// `x-real-ip`로 보낼 에이전트 IP 설정
    pub fn with_real_ip(mut self, ip: IpAddr) -> Self {
        self.real_ip = Some(ip);
        self
    }

    fn ensure_open(&self) -> Result<(), CoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CoreError::Closed);
        }
        Ok(())
    }

    fn apply_metadata<T>(
        &self,
        request: &mut tonic::Request<T>,
        sealed: &SealedPayload,
    ) -> Result<(), CoreError> {
        let metadata = request.metadata_mut();
        if let Some(signature) = &sealed.signature {
            let value: MetadataValue<_> = signature
                .parse()
                .map_err(|e| CoreError::Internal(format!("서명 메타데이터 생성 실패: {e}")))?;
            metadata.insert(HASH_METADATA, value);
        }
        if sealed.encrypted {
            metadata.insert(ENCRYPTED_METADATA, MetadataValue::from_static("true"));
        }
        if let Some(ip) = self.real_ip {
            let value: MetadataValue<_> = ip
                .to_string()
                .parse()
                .map_err(|e| CoreError::Internal(format!("IP 메타데이터 생성 실패: {e}")))?;
            metadata.insert(REAL_IP_METADATA, value);
        }
        Ok(())
    }

    fn metric_request(&self, metric: &Metric) -> Result<tonic::Request<MetricRequest>, CoreError> {
        let sealed = self.sealer.seal(serde_json::to_vec(metric)?)?;
        let message = if sealed.encrypted {
            MetricRequest {
                metric: None,
                encrypted_message: sealed.body.clone(),
            }
        } else {
            MetricRequest {
                metric: Some(metric.into()),
                encrypted_message: Vec::new(),
            }
        };

        let mut request = tonic::Request::new(message);
        self.apply_metadata(&mut request, &sealed)?;
        Ok(request)
    }

    fn metrics_request(
        &self,
        metrics: &[Metric],
    ) -> Result<tonic::Request<MetricsRequest>, CoreError> {
        let sealed = self.sealer.seal(serde_json::to_vec(metrics)?)?;
        let message = if sealed.encrypted {
            MetricsRequest {
                metrics: Vec::new(),
                encrypted_message: sealed.body.clone(),
            }
        } else {
            MetricsRequest {
                metrics: to_proto_batch(metrics),
                encrypted_message: Vec::new(),
            }
        };

        let mut request = tonic::Request::new(message);
        self.apply_metadata(&mut request, &sealed)?;
        Ok(request)
    }
}

#[async_trait]
impl MetricSender for GrpcMetricSender {
    async fn send_metric(&self, metric: &Metric) -> Result<Metric, CoreError> {
        self.ensure_open()?;
        debug!("gRPC 메트릭 전송: {}", metric.name);

        let request = self.metric_request(metric)?;
        let mut client = self.client.clone();
        let response = client.set_metric(request).await.map_err(|status| {
            error!(error = %status, "gRPC 메트릭 전송 실패");
            status_to_core_error("SetMetric", &status)
        })?;

        let merged = response
            .into_inner()
            .metric
            .ok_or_else(|| CoreError::Internal("gRPC 응답에 메트릭 없음".to_string()))?;
        Metric::try_from(merged)
    }

    async fn send_batch(&self, metrics: &[Metric]) -> Result<Vec<Metric>, CoreError> {
        self.ensure_open()?;
        debug!("gRPC 배치 전송: {}개", metrics.len());

        let request = self.metrics_request(metrics)?;
        let mut client = self.client.clone();
        let response = client.set_metrics(request).await.map_err(|status| {
            error!(error = %status, "gRPC 배치 전송 실패");
            status_to_core_error("SetMetrics", &status)
        })?;

        from_proto_batch(response.into_inner().metrics)
    }

    async fn close(&self) -> Result<(), CoreError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(endpoint = %self.endpoint, "gRPC 송신기 닫힘");
        }
        Ok(())
    }
}

/// `host:port`를 `http://host:port`로 정규화
fn normalize_endpoint(address: &str) -> String {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_security::generate_keypair;

    #[tokio::test]
    async fn plain_request_carries_metric_and_signature() {
        let sender = GrpcMetricSender::connect_lazy("localhost:3200", Duration::from_secs(1))
            .unwrap()
            .with_signer(Signer::new("k"))
            .with_real_ip("192.168.0.7".parse().unwrap());

        let metric = Metric::counter("hits", 3);
        let request = sender.metric_request(&metric).unwrap();

        let expected = Signer::new("k").sign(&serde_json::to_vec(&metric).unwrap()).unwrap();
        let metadata = request.metadata();
        assert_eq!(metadata.get(HASH_METADATA).unwrap().to_str().unwrap(), expected);
        assert_eq!(metadata.get(REAL_IP_METADATA).unwrap().to_str().unwrap(), "192.168.0.7");
        assert!(metadata.get(ENCRYPTED_METADATA).is_none());

        let message = request.into_inner();
        assert!(message.encrypted_message.is_empty());
        assert_eq!(Metric::try_from(message.metric.unwrap()).unwrap(), metric);
    }

    #[tokio::test]
    async fn encrypted_request_hides_metrics() {
        let (decryptor, encryptor) = generate_keypair(1024).unwrap();
        let sender = GrpcMetricSender::connect_lazy("http://localhost:3200", Duration::from_secs(1))
            .unwrap()
            .with_encryptor(encryptor);

        let batch = vec![Metric::gauge("cpu", 1.0), Metric::counter("hits", 2)];
        let request = sender.metrics_request(&batch).unwrap();
        assert_eq!(
            request.metadata().get(ENCRYPTED_METADATA).unwrap().to_str().unwrap(),
            "true"
        );

        let message = request.into_inner();
        assert!(message.metrics.is_empty());
        let plaintext = decryptor.decrypt(&message.encrypted_message).unwrap();
        let decoded: Vec<Metric> = serde_json::from_slice(&plaintext).unwrap();
        assert_eq!(decoded, batch);
    }

    #[tokio::test]
    async fn closed_sender_refuses() {
        let sender =
            GrpcMetricSender::connect_lazy("localhost:3200", Duration::from_secs(1)).unwrap();
        sender.close().await.unwrap();
        let err = sender.send_metric(&Metric::gauge("x", 1.0)).await.unwrap_err();
        assert!(matches!(err, CoreError::Closed));
    }

    #[tokio::test]
    async fn unreachable_server_fails_without_panicking() {
        let sender = GrpcMetricSender::connect_lazy("127.0.0.1:1", Duration::from_secs(1)).unwrap();
        assert!(sender.send_batch(&[Metric::gauge("x", 1.0)]).await.is_err());
    }
}
