//! 미디어 라이브러리
//!
//! 미디어 디렉토리를 스캔하여 파일 크기 기반으로 품질 등급과
//! 파일별 최적 청크 범위를 추정한다. 실제 코덱 분석은 하지 않는다.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::control::FileEntry;
use crate::planner::ChunkRange;
use crate::{Error, Result};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "aac", "ogg"];

/// 추정 품질 등급
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaQuality {
    Q480p,
    Q720p,
    Q1080p,
    Audio,
    Unknown,
}

impl MediaQuality {
    pub fn label(self) -> &'static str {
        match self {
            MediaQuality::Q480p => "480p",
            MediaQuality::Q720p => "720p",
            MediaQuality::Q1080p => "1080p",
            MediaQuality::Audio => "audio",
            MediaQuality::Unknown => "unknown",
        }
    }

    /// 품질 등급별 최적 청크 범위
    pub fn chunk_range(self) -> ChunkRange {
        match self {
            MediaQuality::Q1080p => ChunkRange::new(1800, 2000),
            MediaQuality::Q720p => ChunkRange::new(1400, 1800),
            MediaQuality::Q480p => ChunkRange::new(1000, 1400),
            MediaQuality::Audio | MediaQuality::Unknown => ChunkRange::new(1000, 2000),
        }
    }
}

/// 스트리밍 가능한 미디어 파일 하나의 메타데이터
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub path: PathBuf,
    pub filename: String,
    pub size: u64,
    pub quality: MediaQuality,
}

impl MediaFile {
    /// 파일 메타데이터 조회 및 품질 추정
    pub fn probe(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::FileNotFound(path.display().to_string()))?;

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let size = metadata.len();
        let size_mb = size as f64 / (1024.0 * 1024.0);

        let quality = if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            if size_mb < 50.0 {
                MediaQuality::Q480p
            } else if size_mb < 200.0 {
                MediaQuality::Q720p
            } else {
                MediaQuality::Q1080p
            }
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            MediaQuality::Audio
        } else {
            MediaQuality::Unknown
        };

        Ok(Self {
            path: path.to_path_buf(),
            filename,
            size,
            quality,
        })
    }

    pub fn entry(&self) -> FileEntry {
        let range = self.quality.chunk_range();
        FileEntry {
            filename: self.filename.clone(),
            size: self.size,
            size_mb: (self.size as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0,
            quality: self.quality.label().to_string(),
            chunk_range: (range.min, range.max),
        }
    }
}

/// 미디어 디렉토리 캐시
#[derive(Debug, Default)]
pub struct MediaLibrary {
    files: Vec<MediaFile>,
}

impl MediaLibrary {
    /// 디렉토리 스캔 (비재귀, 알려진 확장자만)
    pub fn scan(dir: &Path) -> Result<Self> {
        let mut files = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if !VIDEO_EXTENSIONS.contains(&ext.as_str())
                && !AUDIO_EXTENSIONS.contains(&ext.as_str())
            {
                debug!("스캔 제외: {:?}", path);
                continue;
            }

            let media = MediaFile::probe(&path)?;
            info!(
                "media file: {} - {} ({:.2} MB)",
                media.filename,
                media.quality.label(),
                media.size as f64 / (1024.0 * 1024.0)
            );
            files.push(media);
        }

        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(Self { files })
    }

    pub fn get(&self, filename: &str) -> Option<&MediaFile> {
        self.files.iter().find(|f| f.filename == filename)
    }

    pub fn entries(&self) -> Vec<FileEntry> {
        self.files.iter().map(|f| f.entry()).collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
