//! 에러 타입 정의

use thiserror::Error;

/// UVS 프로토콜 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON 에러: {0}")]
    Json(#[from] serde_json::Error),

    #[error("잘린 패킷: {got} 바이트 (최소 {need} 바이트 필요)")]
    TruncatedPacket { got: usize, need: usize },

    #[error("손상된 패킷: payload_length={declared}, 실제 {got} 바이트")]
    MalformedPacket { declared: usize, got: usize },

    #[error("세션 타임아웃: {idle_ms}ms 동안 수신 없음")]
    SessionTimeout { idle_ms: u64 },

    #[error("스트림 에러 수신: {0}")]
    StreamError(String),

    #[error("파일 없음: {0}")]
    FileNotFound(String),

    #[error("연결 종료")]
    ConnectionClosed,
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
