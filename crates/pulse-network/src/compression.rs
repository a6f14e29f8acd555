//! gzip 압축 어댑터.
//!
//! `Compressor` 포트 구현. 에이전트 요청 본문과 서버 응답 본문에 쓰인다.
//! 해제 결과는 `max_output` 바이트를 넘지 못한다.

use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;
use pulse_core::error::CoreError;
use pulse_core::ports::compressor::Compressor;
use std::io::Read;

/// 해제 결과 기본 상한
pub const DEFAULT_MAX_DECOMPRESSED_BYTES: usize = 64 * 1024 * 1024;

/// gzip 압축기: `Compressor` 포트 구현
#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
    max_output: usize,
}

impl GzipCompressor {
    /// 기본 상한을 쓰는 압축기
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_DECOMPRESSED_BYTES)
    }

    /// 해제 결과 상한 지정
    pub fn with_limit(max_output: usize) -> Self {
        Self { max_output }
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for GzipCompressor {
    fn encoding(&self) -> &'static str {
        "gzip"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CoreError> {
        let mut encoder = GzEncoder::new(data, Compression::default());
        let mut compressed = Vec::new();
        encoder
            .read_to_end(&mut compressed)
            .map_err(|e| CoreError::Internal(format!("gzip 압축 실패: {e}")))?;
        Ok(compressed)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CoreError> {
        let limit = self.max_output as u64;
        let mut decoder = GzDecoder::new(data).take(limit.saturating_add(1));
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| CoreError::validation("body", format!("gzip 해제 실패: {e}")))?;
        if decompressed.len() as u64 > limit {
            return Err(CoreError::validation(
                "body",
                format!("gzip 해제 결과가 {}바이트 상한 초과", self.max_output),
            ));
        }
        Ok(decompressed)
    }
}
