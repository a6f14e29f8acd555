//! 설정 파일 관리.
//!
//! JSON 설정 파일을 로드한다. 바이너리는 로드한 값 위에
//! CLI 플래그와 환경변수를 덮어쓴다.

use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::CoreError;

/// JSON 설정 파일 로더
pub struct ConfigFile;

impl ConfigFile {
    /// 설정 파일 로드. 빠진 필드는 serde 기본값으로 채운다.
    pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T, CoreError> {
        let content = fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("설정 파일 읽기 실패: {}: {}", path.display(), e))
        })?;

        let config = serde_json::from_str(&content).map_err(|e| {
            CoreError::Config(format!("설정 파일 파싱 실패: {}: {}", path.display(), e))
        })?;

        info!("설정 파일 로드: {}", path.display());
        Ok(config)
    }

    /// 경로가 주어졌으면 로드, 없으면 기본값
    pub fn load_or_default<T>(path: Option<&Path>) -> Result<T, CoreError>
    where
        T: DeserializeOwned + Default,
    {
        match path {
            Some(path) => Self::load(path),
            None => Ok(T::default()),
        }
    }
}
