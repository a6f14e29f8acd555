//! PULSE 핵심 에러 타입.
//!
//! 어댑터 crate는 자체 에러 타입을 `From` 변환으로 `CoreError`에 합류시킨다.

use thiserror::Error;

/// 코어 레이어 에러.
/// 직렬화, 설정, 유효성 검증, 전송 보안, 저장소 등 공통 에러를 정의한다.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패: {field}: {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 리소스를 찾을 수 없음
    #[error("{resource_type} 미발견: {id}")]
    NotFound {
        /// 리소스 종류 (예: "Metric")
        resource_type: String,
        /// 리소스 식별자
        id: String,
    },

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),

    /// 네트워크 에러 (연결 실패, 타임아웃)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 서비스 일시 불가 (503)
    #[error("서비스 일시 불가: {0}")]
    ServiceUnavailable(String),

    /// 영구 저장소 일시 불가: 재시도 대상
    #[error("저장소 일시 불가: {0}")]
    StorageUnavailable(String),

    /// 영구 저장소 에러: 재시도하지 않음
    #[error("저장소 에러: {0}")]
    Storage(String),

    /// 서명 누락/불일치
    #[error("서명 검증 실패: {0}")]
    Signature(String),

    /// 봉투 복호화 실패. 원인은 구분하지 않는다.
    #[error("복호화 실패")]
    Decrypt,

    /// 봉투 암호화 실패
    #[error("암호화 실패: {0}")]
    Encrypt(String),

    /// 신뢰 서브넷 밖의 요청
    #[error("접근 거부: {0}")]
    Forbidden(String),

    /// 닫힌 송신기 사용
    #[error("송신기가 이미 닫힘")]
    Closed,

    /// 종료 신호로 작업 중단
    #[error("작업 취소됨")]
    Cancelled,

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// 재시도 가능한 일시적 인프라 에러인지 판별
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::StorageUnavailable(_))
    }

    /// 유효성 검증 에러 생성 헬퍼
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 메트릭 미발견 에러 생성 헬퍼
    pub fn metric_not_found(name: impl Into<String>) -> Self {
        CoreError::NotFound {
            resource_type: "Metric".to_string(),
            id: name.into(),
        }
    }
}
