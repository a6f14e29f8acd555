//! sqlx 에러 분류.
//!
//! 연결 계열 에러만 일시적(`StorageUnavailable`)으로 보고 나머지는 영구 에러.

use pulse_core::error::CoreError;

/// SQLSTATE가 일시적 장애인지 판별.
///
/// - `08xxx` 연결 예외
/// - `57P01`/`57P02`/`57P03` 관리자/크래시 종료, 아직 연결 불가
/// - `53300` 연결 수 초과
pub fn is_transient_sqlstate(code: &str) -> bool {
    code.starts_with("08") || matches!(code, "57P01" | "57P02" | "57P03" | "53300")
}

/// sqlx 에러를 `CoreError`로 변환
pub fn classify(operation: &str, err: sqlx::Error) -> CoreError {
    let transient = match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => db
            .code()
            .map(|code| is_transient_sqlstate(&code))
            .unwrap_or(false),
        _ => false,
    };

    if transient {
        CoreError::StorageUnavailable(format!("{operation}: {err}"))
    } else {
        CoreError::Storage(format!("{operation}: {err}"))
    }
}
