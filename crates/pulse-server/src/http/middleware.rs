//! 요청/응답 보안 미들웨어.
//!
//! 요청: gzip 해제 → 봉투 복호화 → 평문 서명 검증 후 평문 본문으로 교체.
//! 응답: 평문 서명(`HashSHA256`) → `Accept-Encoding: gzip`이면 압축.

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use pulse_core::error::CoreError;
use pulse_core::ports::compressor::Compressor;
use pulse_network::compression::GzipCompressor;
use pulse_security::headers::{ENCRYPTED_HEADER, HASH_HEADER, REAL_IP_HEADER};
use tracing::{debug, error};

use super::{AppState, MAX_BODY_BYTES};
use crate::error::ApiError;

/// 신뢰 서브넷 확인 (`X-Real-IP`)
pub async fn trusted_subnet(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let real_ip = header_str(request.headers(), REAL_IP_HEADER);
    if let Err(e) = state.security.check_peer(real_ip) {
        return ApiError::from(e).into_response();
    }
    next.run(request).await
}

/// 요청 본문 해제: gzip → 복호화 → 서명 검증
pub async fn unseal_request(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return ApiError::BadRequest(format!("요청 본문 읽기 실패: {e}")).into_response();
        }
    };

    if bytes.is_empty() {
        return next.run(Request::from_parts(parts, Body::empty())).await;
    }

    let gzipped = header_str(&parts.headers, header::CONTENT_ENCODING.as_str())
        .is_some_and(|v| v.eq_ignore_ascii_case("gzip"));
    let encrypted = header_str(&parts.headers, ENCRYPTED_HEADER)
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));
    let signature = header_str(&parts.headers, HASH_HEADER).map(str::to_string);

    let plaintext = match open_body(&state, bytes.to_vec(), gzipped, encrypted) {
        Ok(plaintext) => plaintext,
        Err(e) => return ApiError::from(e).into_response(),
    };

    if parts.method == Method::POST {
        if let Err(e) = state.security.verify(&plaintext, signature.as_deref()) {
            return ApiError::from(e).into_response();
        }
    }

    parts.headers.remove(header::CONTENT_ENCODING);
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.remove(ENCRYPTED_HEADER);
    debug!("요청 본문 해제: {}바이트", plaintext.len());

    next.run(Request::from_parts(parts, Body::from(plaintext))).await
}

fn open_body(
    state: &AppState,
    body: Vec<u8>,
    gzipped: bool,
    encrypted: bool,
) -> Result<Vec<u8>, CoreError> {
    let body = if gzipped {
        GzipCompressor::with_limit(MAX_BODY_BYTES).decompress(&body)?
    } else {
        body
    };
    state.security.open(body, encrypted)
}

/// 응답 서명과 gzip 압축
pub async fn seal_response(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let accepts_gzip = header_str(request.headers(), header::ACCEPT_ENCODING.as_str())
        .is_some_and(|v| v.split(',').any(|enc| enc.trim().starts_with("gzip")));

    let response = next.run(request).await;
    if !state.security.signs() && !accepts_gzip {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("응답 본문 읽기 실패: {e}");
            return ApiError::Internal("응답 본문 읽기 실패".to_string()).into_response();
        }
    };
    if bytes.is_empty() {
        return Response::from_parts(parts, Body::empty());
    }

    match state.security.sign(&bytes) {
        Ok(Some(signature)) => match HeaderValue::from_str(&signature) {
            Ok(value) => {
                parts.headers.insert(HASH_HEADER, value);
            }
            Err(e) => error!("응답 서명 헤더 생성 실패: {e}"),
        },
        Ok(None) => {}
        Err(e) => error!("응답 서명 실패: {e}"),
    }

    if !accepts_gzip {
        return Response::from_parts(parts, Body::from(bytes));
    }

    let compressor = GzipCompressor::new();
    match compressor.compress(&bytes) {
        Ok(compressed) => {
            parts.headers.remove(header::CONTENT_LENGTH);
            parts.headers.insert(
                header::CONTENT_ENCODING,
                HeaderValue::from_static(compressor.encoding()),
            );
            Response::from_parts(parts, Body::from(compressed))
        }
        Err(e) => {
            error!("응답 압축 실패: {e}");
            Response::from_parts(parts, Body::from(bytes))
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
