//! HMAC-SHA256 페이로드 서명.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::SecurityError;

type HmacSha256 = Hmac<Sha256>;

/// 공유 키 기반 서명기
#[derive(Clone)]
pub struct Signer {
    key: Vec<u8>,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").field("key", &"***").finish()
    }
}

impl Signer {
    /// 공유 키로 서명기 생성
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self {
            key: key.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> Result<HmacSha256, SecurityError> {
        HmacSha256::new_from_slice(&self.key)
            .map_err(|e| SecurityError::Key(format!("HMAC 키 초기화 실패: {e}")))
    }

    /// 페이로드 서명 (소문자 hex)
    pub fn sign(&self, payload: &[u8]) -> Result<String, SecurityError> {
        let mut mac = self.mac()?;
        mac.update(payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// 서명 검증 (상수 시간 비교)
    pub fn verify(&self, payload: &[u8], signature: &str) -> Result<(), SecurityError> {
        let expected = hex::decode(signature.trim())
            .map_err(|_| SecurityError::Signature("hex 형식이 아님".to_string()))?;

        let mut mac = self.mac()?;
        mac.update(payload);
        mac.verify_slice(&expected)
            .map_err(|_| SecurityError::Signature("서명 불일치".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_same_payload_verifies() {
        let signer = Signer::new("secret");
        let signature = signer.sign(b"{\"id\":\"cpu\"}").unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signer.verify(b"{\"id\":\"cpu\"}", &signature).is_ok());
    }

    #[test]
    fn known_vector() {
        // RFC 4231 테스트 케이스 2
        let signer = Signer::new("Jefe");
        let signature = signer.sign(b"what do ya want for nothing?").unwrap();
        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn different_payload_fails() {
        let signer = Signer::new("secret");
        let signature = signer.sign(b"payload-a").unwrap();
        let err = signer.verify(b"payload-b", &signature).unwrap_err();
        assert!(matches!(err, SecurityError::Signature(_)));
    }

    #[test]
    fn different_key_fails() {
        let signature = Signer::new("key-a").sign(b"payload").unwrap();
        assert!(Signer::new("key-b").verify(b"payload", &signature).is_err());
    }

    #[test]
    fn non_hex_signature_fails() {
        let signer = Signer::new("secret");
        assert!(signer.verify(b"payload", "zz-not-hex").is_err());
        assert!(signer.verify(b"payload", "").is_err());
    }

    #[test]
    fn debug_hides_key() {
        let printed = format!("{:?}", Signer::new("top-secret"));
        assert!(!printed.contains("top-secret"));
    }
}
