//! RSA + AES-256-GCM 하이브리드 봉투.
//!
//! 와이어 형식: `RSA(PKCS#1 v1.5, 세션 키) || AES-256-GCM(평문)`.
//! 앞부분 길이는 수신자 RSA 모듈러스 크기(N 바이트)와 같다.
//!
//! 세션 키는 페이로드마다 새로 만들고 한 번만 쓴다. 그래서 논스는
//! 0으로 고정된 12바이트를 쓴다. 키를 재사용하면 안 된다.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand_core::{OsRng, RngCore};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use std::path::Path;
use tracing::debug;

use crate::error::SecurityError;

/// 세션 키 길이 (AES 블록 두 개)
const SESSION_KEY_LEN: usize = 32;

/// 고정 논스 (세션 키가 일회용일 때만 안전)
const ZERO_NONCE: [u8; 12] = [0u8; 12];

/// 공개키로 봉투를 만드는 암호화기 (에이전트 측)
#[derive(Debug, Clone)]
pub struct Encryptor {
    public_key: RsaPublicKey,
}

impl Encryptor {
    /// 공개키로 생성
    pub fn new(public_key: RsaPublicKey) -> Self {
        Self { public_key }
    }

    /// PEM 문자열에서 로드 (PKCS#1 `RSA PUBLIC KEY` 또는 SPKI `PUBLIC KEY`)
    pub fn from_pem(pem: &str) -> Result<Self, SecurityError> {
        let public_key = RsaPublicKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPublicKey::from_public_key_pem(pem))
            .map_err(|e| SecurityError::Key(format!("공개키 PEM 파싱 실패: {e}")))?;
        Ok(Self::new(public_key))
    }

    /// PEM 파일에서 로드
    pub fn from_pem_file(path: &Path) -> Result<Self, SecurityError> {
        let pem = std::fs::read_to_string(path)
            .map_err(|e| SecurityError::Key(format!("{}: {e}", path.display())))?;
        let encryptor = Self::from_pem(&pem)?;
        debug!("공개키 로드: {} ({}비트)", path.display(), encryptor.key_size() * 8);
        Ok(encryptor)
    }

    /// 감싼 세션 키 길이 (바이트)
    pub fn key_size(&self) -> usize {
        self.public_key.size()
    }

    /// 평문을 봉투로 봉인
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, SecurityError> {
        let mut session_key = [0u8; SESSION_KEY_LEN];
        OsRng.fill_bytes(&mut session_key);

        let wrapped_key = self
            .public_key
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, &session_key)
            .map_err(|e| SecurityError::Encrypt(format!("세션 키 암호화 실패: {e}")))?;

        let cipher = Aes256Gcm::new_from_slice(&session_key)
            .map_err(|e| SecurityError::Encrypt(format!("AES 키 초기화 실패: {e}")))?;
        let sealed = cipher
            .encrypt(Nonce::from_slice(&ZERO_NONCE), plaintext)
            .map_err(|e| SecurityError::Encrypt(format!("본문 암호화 실패: {e}")))?;

        let mut envelope = Vec::with_capacity(wrapped_key.len() + sealed.len());
        envelope.extend_from_slice(&wrapped_key);
        envelope.extend_from_slice(&sealed);
        Ok(envelope)
    }
}

/// 개인키로 봉투를 여는 복호화기 (서버 측)
#[derive(Debug, Clone)]
pub struct Decryptor {
    private_key: RsaPrivateKey,
}

impl Decryptor {
    /// 개인키로 생성
    pub fn new(private_key: RsaPrivateKey) -> Self {
        Self { private_key }
    }

    /// PEM 문자열에서 로드 (PKCS#1 `RSA PRIVATE KEY` 또는 PKCS#8 `PRIVATE KEY`)
    pub fn from_pem(pem: &str) -> Result<Self, SecurityError> {
        let private_key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| SecurityError::Key(format!("개인키 PEM 파싱 실패: {e}")))?;
        Ok(Self::new(private_key))
    }

    /// PEM 파일에서 로드
    pub fn from_pem_file(path: &Path) -> Result<Self, SecurityError> {
        let pem = std::fs::read_to_string(path)
            .map_err(|e| SecurityError::Key(format!("{}: {e}", path.display())))?;
        let decryptor = Self::from_pem(&pem)?;
        debug!("개인키 로드: {} ({}비트)", path.display(), decryptor.key_size() * 8);
        Ok(decryptor)
    }

    /// 감싼 세션 키 길이 (바이트)
    pub fn key_size(&self) -> usize {
        self.private_key.size()
    }

    /// 봉투를 열어 평문 반환. 어떤 실패든 `SecurityError::Decrypt`.
    pub fn decrypt(&self, envelope: &[u8]) -> Result<Vec<u8>, SecurityError> {
        let key_len = self.key_size();
        if envelope.len() < key_len {
            return Err(SecurityError::Decrypt);
        }
        let (wrapped_key, sealed) = envelope.split_at(key_len);

        let session_key = self
            .private_key
            .decrypt(Pkcs1v15Encrypt, wrapped_key)
            .map_err(|_| SecurityError::Decrypt)?;
        if session_key.len() != SESSION_KEY_LEN {
            return Err(SecurityError::Decrypt);
        }

        let cipher = Aes256Gcm::new_from_slice(&session_key).map_err(|_| SecurityError::Decrypt)?;
        cipher
            .decrypt(Nonce::from_slice(&ZERO_NONCE), sealed)
            .map_err(|_| SecurityError::Decrypt)
    }
}

/// 키 쌍 생성 (테스트/도구용)
pub fn generate_keypair(bits: usize) -> Result<(Decryptor, Encryptor), SecurityError> {
    let private_key = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| SecurityError::Key(format!("키 생성 실패: {e}")))?;
    let public_key = RsaPublicKey::from(&private_key);
    Ok((Decryptor::new(private_key), Encryptor::new(public_key)))
}
