//! 송신 페이로드 봉인.
//!
//! 서명은 평문 JSON 위에서 계산하고, 공개키가 있으면 본문을 봉투로 대체한다.

use pulse_core::error::CoreError;
use pulse_security::{Encryptor, Signer};

/// 봉인된 페이로드
#[derive(Debug, Clone)]
pub struct SealedPayload {
    /// 전송 본문 (평문 또는 봉투)
    pub body: Vec<u8>,
    /// 평문 HMAC-SHA256 (hex)
    pub signature: Option<String>,
    /// 본문이 봉투인지 여부
    pub encrypted: bool,
}

/// 서명기/암호화기 조합
#[derive(Debug, Clone, Default)]
pub struct PayloadSealer {
    signer: Option<Signer>,
    encryptor: Option<Encryptor>,
}

impl PayloadSealer {
    /// 새 봉인기
    pub fn new(signer: Option<Signer>, encryptor: Option<Encryptor>) -> Self {
        Self { signer, encryptor }
    }

    /// 서명기 설정
    pub fn set_signer(&mut self, signer: Signer) {
        self.signer = Some(signer);
    }

    /// 암호화기 설정
    pub fn set_encryptor(&mut self, encryptor: Encryptor) {
        self.encryptor = Some(encryptor);
    }

    /// 응답 서명 검증에 쓰는 서명기
    pub fn signer(&self) -> Option<&Signer> {
        self.signer.as_ref()
    }

    /// 평문 봉인
    pub fn seal(&self, plaintext: Vec<u8>) -> Result<SealedPayload, CoreError> {
        let signature = match &self.signer {
            Some(signer) => Some(signer.sign(&plaintext)?),
            None => None,
        };

        match &self.encryptor {
            Some(encryptor) => Ok(SealedPayload {
                body: encryptor.encrypt(&plaintext)?,
                signature,
                encrypted: true,
            }),
            None => Ok(SealedPayload {
                body: plaintext,
                signature,
                encrypted: false,
            }),
        }
    }
}
