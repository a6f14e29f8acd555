//! API 에러 처리.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pulse_core::error::CoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

/// API 에러
#[derive(Debug, Error)]
pub enum ApiError {
    /// 내부 서버 오류 (저장소 장애 포함)
    #[error("내부 서버 오류: {0}")]
    Internal(String),

    /// 리소스를 찾을 수 없음
    #[error("리소스를 찾을 수 없음: {0}")]
    NotFound(String),

    /// 잘못된 요청 (디코딩, 검증, 복호화, 서명)
    #[error("잘못된 요청: {0}")]
    BadRequest(String),

    /// 신뢰 서브넷 밖의 요청
    #[error("접근 거부: {0}")]
    Forbidden(String),
}

/// 에러 응답 본문
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 에러 메시지
    pub error: String,
    /// HTTP 상태 코드
    pub status: u16,
}

impl ApiError {
    /// 응답 상태 코드
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Internal(msg)
            | ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Forbidden(msg) => msg,
        };

        let body = ErrorResponse {
            error: message,
            status: status.as_u16(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::Validation { .. } | CoreError::Serialization(_) => {
                ApiError::BadRequest(err.to_string())
            }
            CoreError::Signature(_) => {
                warn!(target: "pulse::security", "서명 거부: {err}");
                ApiError::BadRequest("서명 검증 실패".to_string())
            }
            CoreError::Decrypt => {
                warn!(target: "pulse::security", "복호화 거부");
                ApiError::BadRequest(err.to_string())
            }
            CoreError::Forbidden(_) => {
                warn!(target: "pulse::security", "접근 거부: {err}");
                ApiError::Forbidden(err.to_string())
            }
            CoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            _ => {
                error!("요청 처리 실패: {err}");
                ApiError::Internal(err.to_string())
            }
        }
    }
}
