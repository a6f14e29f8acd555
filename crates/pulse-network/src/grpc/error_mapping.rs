//! 서버가 돌려준 `Status` → `CoreError`.
//!
//! 서버 매핑의 역방향이다. 복호화 실패도 InvalidArgument로 오므로
//! 클라이언트에서는 Validation과 구분하지 않는다.

use pulse_core::error::CoreError;
use tonic::{Code, Status};

/// RPC 이름과 함께 에러로 변환
pub fn status_to_core_error(rpc: &str, status: &Status) -> CoreError {
    let detail = format!("{rpc}: {}", status.message());
    match status.code() {
        Code::Unauthenticated => CoreError::Signature(detail),
        Code::PermissionDenied => CoreError::Forbidden(detail),
        Code::InvalidArgument => CoreError::validation(rpc, status.message()),
        Code::NotFound => CoreError::NotFound {
            resource_type: "Metric".to_string(),
            id: status.message().to_string(),
        },
        Code::Unavailable => CoreError::ServiceUnavailable(detail),
        Code::DeadlineExceeded => CoreError::Network(format!("{detail} (타임아웃)")),
        Code::Cancelled => CoreError::Cancelled,
        code => CoreError::Network(format!("{detail} ({code})")),
    }
}
