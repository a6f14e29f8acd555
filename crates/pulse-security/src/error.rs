//! 보안 에러 타입.

use pulse_core::error::CoreError;
use thiserror::Error;

/// 전송 보안 에러.
///
/// 복호화 실패는 원인(키/암호문/길이)을 구분하지 않는다.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// 서명 누락/형식 오류/불일치
    #[error("서명 검증 실패: {0}")]
    Signature(String),

    /// 봉투 복호화 실패
    #[error("복호화 실패")]
    Decrypt,

    /// 봉투 암호화 실패
    #[error("암호화 실패: {0}")]
    Encrypt(String),

    /// 키 로드/파싱 실패
    #[error("키 로드 실패: {0}")]
    Key(String),
}

impl From<SecurityError> for CoreError {
    fn from(err: SecurityError) -> Self {
        match err {
            SecurityError::Signature(msg) => CoreError::Signature(msg),
            SecurityError::Decrypt => CoreError::Decrypt,
            SecurityError::Encrypt(msg) => CoreError::Encrypt(msg),
            SecurityError::Key(msg) => CoreError::Config(format!("키 로드 실패: {msg}")),
        }
    }
}
