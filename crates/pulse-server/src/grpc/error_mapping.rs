use pulse_core::error::CoreError;
use tonic::Status;
use tracing::{error, warn};

/// `CoreError` → gRPC 상태 코드
pub fn map_core_error(err: CoreError) -> Status {
    match err {
        CoreError::Signature(_) => {
            warn!(target: "pulse::security", "gRPC 서명 거부: {err}");
            Status::unauthenticated("서명 검증 실패")
        }
        CoreError::Decrypt => {
            warn!(target: "pulse::security", "gRPC 복호화 거부");
            Status::invalid_argument(err.to_string())
        }
        CoreError::Forbidden(_) => {
            warn!(target: "pulse::security", "gRPC 접근 거부: {err}");
            Status::permission_denied(err.to_string())
        }
        CoreError::Validation { .. } | CoreError::Serialization(_) => {
            Status::invalid_argument(err.to_string())
        }
        CoreError::NotFound { .. } => Status::not_found(err.to_string()),
        CoreError::StorageUnavailable(_) | CoreError::ServiceUnavailable(_) => {
            error!("gRPC 요청 처리 실패 (일시 불가): {err}");
            Status::unavailable(err.to_string())
        }
        _ => {
            error!("gRPC 요청 처리 실패: {err}");
            Status::internal(err.to_string())
        }
    }
}
