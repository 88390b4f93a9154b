//! 컨트롤 플레인 메시지 (JSON)
//!
//! 스트림 외의 요청/응답은 작은 JSON 데이터그램으로 오간다.
//! 요청은 클라이언트가 보내는 평문 JSON, 응답은 INFO/ERROR 패킷의
//! 페이로드로 실려 간다. 엔진 자체는 페이로드를 해석하지 않는다.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::planner::ChunkRange;
use crate::Result;

/// 클라이언트 요청
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlRequest {
    /// 사용 가능한 미디어 파일 목록 요청
    ListFiles,

    /// 파일 스트리밍 요청
    StreamFile {
        filename: String,

        #[serde(default)]
        quality: QualityPreset,
    },
}

impl ControlRequest {
    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// 품질 프리셋
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    Low,
    Medium,
    High,

    /// 파일 메타데이터 기반 자동 선택
    #[default]
    Auto,
}

impl QualityPreset {
    /// 프리셋별 청크 범위 (Auto는 파일별 범위를 따름)
    pub fn chunk_range(self) -> Option<ChunkRange> {
        match self {
            QualityPreset::Low => Some(ChunkRange::new(1000, 1300)),
            QualityPreset::Medium => Some(ChunkRange::new(1300, 1700)),
            QualityPreset::High => Some(ChunkRange::new(1700, 2000)),
            QualityPreset::Auto => None,
        }
    }

    pub const ALL: [QualityPreset; 4] = [
        QualityPreset::Low,
        QualityPreset::Medium,
        QualityPreset::High,
        QualityPreset::Auto,
    ];
}

/// 파일 목록 항목
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub filename: String,
    pub size: u64,
    pub size_mb: f64,
    pub quality: String,
    pub chunk_range: (usize, usize),
}

/// 파일 목록 응답 (INFO 패킷 페이로드)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileListResponse {
    pub files: Vec<FileEntry>,
    pub total_files: usize,
    pub quality_presets: Vec<String>,
}

impl FileListResponse {
    pub fn new(files: Vec<FileEntry>) -> Self {
        let total_files = files.len();
        Self {
            files,
            total_files,
            quality_presets: QualityPreset::ALL
                .iter()
                .map(|q| format!("{q:?}").to_lowercase())
                .collect(),
        }
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// 스트림 시작 메타데이터 (첫 INFO 패킷 페이로드)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamInfo {
    pub filename: String,
    pub size: u64,
    pub quality: String,
    pub chunk_range: (usize, usize),
}

impl StreamInfo {
    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// 에러 응답 (ERROR 패킷 페이로드)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
