//! # pulse-security
//!
//! 전송 구간 보안.
//!
//! - [`hybrid`]: 요청마다 새 AES-256 세션 키를 만들고 RSA(PKCS#1 v1.5)로 감싸는 봉투
//! - [`signing`]: 평문 페이로드의 HMAC-SHA256 서명 (hex)
//!
//! 규칙: 서명은 항상 평문 위에서 계산한다. 암호화는 평문을 통째로 대체한다.
//! 수신 측 순서는 압축 해제 → 복호화 → 서명 검증.

pub mod error;
pub mod hybrid;
pub mod signing;

pub use error::SecurityError;
pub use hybrid::{generate_keypair, Decryptor, Encryptor};
pub use signing::Signer;

/// HTTP 헤더/gRPC 메타데이터 이름
pub mod headers {
    /// 평문 HMAC-SHA256 서명 (HTTP)
    pub const HASH_HEADER: &str = "HashSHA256";
    /// 암호화 봉투 표시 (HTTP, 값 `true`)
    pub const ENCRYPTED_HEADER: &str = "X-Encrypted";
    /// 에이전트 IP (HTTP)
    pub const REAL_IP_HEADER: &str = "X-Real-IP";

    /// 평문 HMAC-SHA256 서명 (gRPC 메타데이터)
    pub const HASH_METADATA: &str = "hashsha256";
    /// 암호화 봉투 표시 (gRPC 메타데이터)
    pub const ENCRYPTED_METADATA: &str = "encrypted";
    /// 에이전트 IP (gRPC 메타데이터)
    pub const REAL_IP_METADATA: &str = "x-real-ip";
}
