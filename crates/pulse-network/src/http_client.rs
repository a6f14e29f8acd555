//! HTTP/JSON 메트릭 송신기.
//!
//! `MetricSender` 포트 구현. 본문 파이프라인:
//! JSON 직렬화 → 평문 서명 → (선택) 봉투 암호화 → gzip → POST.
//! 응답은 reqwest가 gzip을 풀고, 서명 헤더가 있으면 검증한다.

use async_trait::async_trait;
use pulse_core::error::CoreError;
use pulse_core::models::metric::Metric;
use pulse_core::ports::compressor::Compressor;
use pulse_core::ports::sender::MetricSender;
use pulse_security::headers::{ENCRYPTED_HEADER, HASH_HEADER, REAL_IP_HEADER};
use pulse_security::{Encryptor, Signer};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::compression::GzipCompressor;
use crate::sealing::PayloadSealer;

/// 단건 업데이트 경로
const UPDATE_PATH: &str = "/update/";

/// 배치 업데이트 경로
const UPDATES_PATH: &str = "/updates/";

/// HTTP 메트릭 송신기: `MetricSender` 포트 구현
pub struct HttpMetricSender {
    client: reqwest::Client,
    base_url: String,
    sealer: PayloadSealer,
    compressor: Arc<dyn Compressor>,
    real_ip: Option<IpAddr>,
    closed: AtomicBool,
}

impl HttpMetricSender {
    /// 새 HTTP 송신기 생성
    pub fn new(address: &str, timeout: Duration) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {}", e)))?;

        Ok(Self {
            client,
            base_url: normalize_base_url(address),
            sealer: PayloadSealer::default(),
            compressor: Arc::new(GzipCompressor::new()),
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

    /// `X-Real-IP`로 보낼 에이전트 IP 설정
    pub fn with_real_ip(mut self, ip: IpAddr) -> Self {
        self.real_ip = Some(ip);
        self
    }

    /// 서버 기본 URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn ensure_open(&self) -> Result<(), CoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CoreError::Closed);
        }
        Ok(())
    }

    /// 봉인된 JSON 본문 POST 후 응답 역직렬화
    async fn post<T, R>(&self, path: &str, payload: &T) -> Result<R, CoreError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.ensure_open()?;

        let plaintext = serde_json::to_vec(payload)?;
        let sealed = self.sealer.seal(plaintext)?;
        let body = self.compressor.compress(&sealed.body)?;

        let url = format!("{}{}", self.base_url, path);
        let mut req = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::CONTENT_ENCODING, self.compressor.encoding())
            .body(body);

        if let Some(signature) = &sealed.signature {
            req = req.header(HASH_HEADER, signature.as_str());
        }
        if sealed.encrypted {
            req = req.header(ENCRYPTED_HEADER, "true");
        }
        if let Some(ip) = self.real_ip {
            req = req.header(REAL_IP_HEADER, ip.to_string());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("요청 실패: {url}: {e}")))?;
        let resp = self.check_response(resp).await?;

        let signature = resp
            .headers()
            .get(HASH_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| CoreError::Network(format!("응답 본문 읽기 실패: {e}")))?;

        if let (Some(signer), Some(signature)) = (self.sealer.signer(), signature.as_deref()) {
            signer.verify(&bytes, signature).map_err(|e| {
                warn!(target: "pulse::security", "응답 서명 불일치: {url}");
                CoreError::from(e)
            })?;
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    /// 응답 상태 코드 확인 및 에러 매핑
    async fn check_response(
        &self,
        resp: reqwest::Response,
    ) -> Result<reqwest::Response, CoreError> {
        let status = resp.status();

        if status.is_success() {
            return Ok(resp);
        }

        let status_code = status.as_u16();
        let text = resp.text().await.unwrap_or_else(|e| {
            warn!("응답 본문 읽기 실패: {e}");
            String::new()
        });

        match status_code {
            400 => Err(CoreError::validation("request", text)),
            401 => Err(CoreError::Signature(text)),
            403 => Err(CoreError::Forbidden(text)),
            404 => Err(CoreError::metric_not_found(text)),
            500 | 502 | 503 | 504 => Err(CoreError::ServiceUnavailable(format!(
                "서버 에러 ({status}): {text}"
            ))),
            _ => Err(CoreError::Network(format!("API 에러 ({status}): {text}"))),
        }
    }
}

#[async_trait]
impl MetricSender for HttpMetricSender {
    async fn send_metric(&self, metric: &Metric) -> Result<Metric, CoreError> {
        debug!("메트릭 전송: {} ({})", metric.name, metric.mtype);
        self.post(UPDATE_PATH, metric).await
    }

    async fn send_batch(&self, metrics: &[Metric]) -> Result<Vec<Metric>, CoreError> {
        debug!("배치 전송: {}개", metrics.len());
        self.post(UPDATES_PATH, metrics).await
    }

    async fn close(&self) -> Result<(), CoreError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("HTTP 송신기 닫힘: {}", self.base_url);
        }
        Ok(())
    }
}

/// `host:port`를 `http://host:port`로 정규화
fn normalize_base_url(address: &str) -> String {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}
