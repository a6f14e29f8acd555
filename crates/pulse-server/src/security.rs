//! 수신 측 전송 보안.
//!
//! HTTP 미들웨어와 gRPC 서비스가 같은 규칙을 쓴다:
//! 신뢰 서브넷 확인 → (압축 해제) → 복호화 → 평문 서명 검증.

use ipnet::IpNet;
use pulse_core::error::CoreError;
use pulse_security::{Decryptor, Signer};
use std::net::IpAddr;
use tracing::warn;

/// 서버 전송 보안 설정
#[derive(Debug, Clone, Default)]
pub struct TransportSecurity {
    signer: Option<Signer>,
    decryptor: Option<Decryptor>,
    trusted_subnet: Option<IpNet>,
}

impl TransportSecurity {
    /// 보안 설정 생성
    pub fn new(
        signer: Option<Signer>,
        decryptor: Option<Decryptor>,
        trusted_subnet: Option<IpNet>,
    ) -> Self {
        Self {
            signer,
            decryptor,
            trusted_subnet,
        }
    }

    /// 서명 키 설정 여부
    pub fn signs(&self) -> bool {
        self.signer.is_some()
    }

    /// 에이전트가 보낸 IP가 신뢰 서브넷 안인지 확인
    pub fn check_peer(&self, real_ip: Option<&str>) -> Result<(), CoreError> {
        let Some(subnet) = &self.trusted_subnet else {
            return Ok(());
        };

        let raw = real_ip.map(str::trim).unwrap_or_default();
        let ip: IpAddr = raw.parse().map_err(|_| {
            warn!(target: "pulse::security", "에이전트 IP 누락/오류: {raw:?}");
            CoreError::Forbidden(format!("에이전트 IP 확인 불가: {raw:?}"))
        })?;

        if subnet.contains(&ip) {
            Ok(())
        } else {
            warn!(target: "pulse::security", "신뢰 서브넷 밖 요청: {ip} ∉ {subnet}");
            Err(CoreError::Forbidden(format!("{ip}는 신뢰 서브넷 밖")))
        }
    }

    /// 봉투 해제. `encrypted`가 아니면 본문을 그대로 돌려준다.
    pub fn open(&self, body: Vec<u8>, encrypted: bool) -> Result<Vec<u8>, CoreError> {
        if !encrypted {
            return Ok(body);
        }
        let Some(decryptor) = &self.decryptor else {
            warn!(target: "pulse::security", "개인키 없이 암호화된 요청 수신");
            return Err(CoreError::Decrypt);
        };
        decryptor.decrypt(&body).map_err(|e| {
            warn!(target: "pulse::security", "봉투 복호화 실패 ({}바이트)", body.len());
            CoreError::from(e)
        })
    }

    /// 평문 서명 검증. 키가 없으면 항상 통과한다.
    pub fn verify(&self, plaintext: &[u8], signature: Option<&str>) -> Result<(), CoreError> {
        let Some(signer) = &self.signer else {
            return Ok(());
        };
        let Some(signature) = signature else {
            warn!(target: "pulse::security", "서명 누락");
            return Err(CoreError::Signature("서명 누락".to_string()));
        };
        signer.verify(plaintext, signature).map_err(|e| {
            warn!(target: "pulse::security", "서명 불일치");
            CoreError::from(e)
        })
    }

    /// 응답 서명 (키가 없으면 `None`)
    pub fn sign(&self, body: &[u8]) -> Result<Option<String>, CoreError> {
        match &self.signer {
            Some(signer) => Ok(Some(signer.sign(body)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_security::generate_keypair;

    #[test]
    fn open_without_security_passes_through() {
        let security = TransportSecurity::default();
        assert_eq!(security.open(b"{}".to_vec(), false).unwrap(), b"{}".to_vec());
        assert!(security.verify(b"{}", None).is_ok());
        assert!(security.check_peer(None).is_ok());
        assert!(security.sign(b"{}").unwrap().is_none());
    }

    #[test]
    fn encrypted_body_without_private_key_is_rejected() {
        let security = TransportSecurity::default();
        let err = security.open(vec![1, 2, 3], true).unwrap_err();
        assert!(matches!(err, CoreError::Decrypt));
    }

    #[test]
    fn decrypts_envelope() {
        let (decryptor, encryptor) = generate_keypair(1024).unwrap();
        let security = TransportSecurity::new(None, Some(decryptor), None);
        let envelope = encryptor.encrypt(b"payload").unwrap();
        assert_eq!(security.open(envelope, true).unwrap(), b"payload".to_vec());
    }

    #[test]
    fn signature_required_when_key_configured() {
        let security = TransportSecurity::new(Some(Signer::new("k")), None, None);
        let signature = Signer::new("k").sign(b"payload").unwrap();

        assert!(security.verify(b"payload", Some(&signature)).is_ok());
        assert!(matches!(
            security.verify(b"payload", None).unwrap_err(),
            CoreError::Signature(_)
        ));
        assert!(security.verify(b"tampered", Some(&signature)).is_err());
        assert!(security.verify(b"payload", Some("not-hex")).is_err());
    }

    #[test]
    fn trusted_subnet_filters_peers() {
        let subnet: IpNet = "192.168.1.0/24".parse().unwrap();
        let security = TransportSecurity::new(None, None, Some(subnet));

        assert!(security.check_peer(Some("192.168.1.15")).is_ok());
        assert!(matches!(
            security.check_peer(Some("10.0.0.1")).unwrap_err(),
            CoreError::Forbidden(_)
        ));
        assert!(security.check_peer(None).is_err());
        assert!(security.check_peer(Some("garbage")).is_err());
    }
}
