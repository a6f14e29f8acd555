//! HTTP API.
//!
//! 레이어 순서 (바깥 → 안): 요청 로그 → 신뢰 서브넷 → 응답 서명/gzip → 요청 해제 → 핸들러

pub mod handlers;
pub mod middleware;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use pulse_core::lifecycle::{stopped, ShutdownRx};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::ingest::MetricService;
use crate::security::TransportSecurity;

/// 요청 본문 최대 크기
pub const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// HTTP 핸들러/미들웨어 공유 상태
#[derive(Clone)]
pub struct AppState {
    /// 수신/병합 서비스
    pub service: Arc<MetricService>,
    /// 전송 보안 설정
    pub security: Arc<TransportSecurity>,
}

impl AppState {
    /// 상태 생성
    pub fn new(service: Arc<MetricService>, security: Arc<TransportSecurity>) -> Self {
        Self { service, security }
    }
}

/// 라우터 생성
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/ping", get(handlers::ping))
        .route("/update/", post(handlers::update))
        .route("/updates/", post(handlers::update_many))
        .route(
            "/update/{mtype}/{name}/{value}",
            post(handlers::update_from_path),
        )
        .route("/value/", post(handlers::value))
        .route("/value/{mtype}/{name}", get(handlers::value_from_path))
        .layer(from_fn_with_state(state.clone(), middleware::unseal_request))
        .layer(from_fn_with_state(state.clone(), middleware::seal_response))
        .layer(from_fn_with_state(state.clone(), middleware::trusted_subnet))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 종료 신호까지 HTTP 서버 실행
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown_rx: ShutdownRx,
) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!("HTTP 서버 시작: http://{addr}");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            stopped(&mut shutdown_rx).await;
            info!("HTTP 서버 종료 신호 수신");
        })
        .await?;

    info!("HTTP 서버 종료");
    Ok(())
}
