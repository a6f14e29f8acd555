//! 메모리 저장소의 JSON 파일 스냅샷.
//!
//! 임시 파일에 쓴 뒤 rename으로 교체한다.

use pulse_core::error::CoreError;
use pulse_core::models::metric::Metric;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 스냅샷 파일
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    path: PathBuf,
}

impl FileSnapshot {
    /// 경로로 생성 (파일은 아직 없어도 된다)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 스냅샷 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 스냅샷 로드. 파일이 없으면 빈 목록, 잘못된 항목은 건너뛴다.
    pub fn load(&self) -> Result<Vec<Metric>, CoreError> {
        if !self.path.exists() {
            debug!("스냅샷 파일 없음: {}", self.path.display());
            return Ok(Vec::new());
        }

        let content = fs::read(&self.path)?;
        if content.is_empty() {
            return Ok(Vec::new());
        }
        let metrics: Vec<Metric> = serde_json::from_slice(&content)?;

        Ok(metrics
            .into_iter()
            .filter(|metric| match metric.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!("스냅샷 항목 건너뜀: {}: {e}", metric.name);
                    false
                }
            })
            .collect())
    }

    /// 스냅샷 저장 (원자적 교체)
    pub fn save(&self, metrics: &[Metric]) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut tmp: OsString = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, serde_json::to_vec(metrics)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!("스냅샷 저장: {} ({}개)", self.path.display(), metrics.len());
        Ok(())
    }
}
