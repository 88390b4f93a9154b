//! # UVS (UDP Video Stream)
//!
//! UDP 기반 적응형 청크 미디어 스트리밍 프로토콜
//!
//! ## 핵심 특징
//! - **가변 청크**: [1000, 2000] 범위 내 랜덤/적응형 청크 크기
//! - **적응형 전송**: 대역폭 추정 기반 청크 범위 및 pacing 조정
//! - **순서 복원**: 수신측에서 out-of-order 패킷을 연속 스트림으로 재조립
//! - **재생 임계값**: 버퍼링 중 일정 바이트 도달 시 재생 시작 신호
//! - **무재전송**: 손실 허용 (UDP best-effort, NACK/재전송 없음)
//! - **동시 세션**: 클라이언트 주소별 독립 전송 태스크

pub mod config;
pub mod control;
pub mod error;
pub mod media;
pub mod monitor;
pub mod packet;
pub mod planner;
pub mod receiver;
pub mod sender;
pub mod session;
pub mod stats;

pub use config::Config;
pub use control::{
    ControlRequest, ErrorResponse, FileEntry, FileListResponse, QualityPreset, StreamInfo,
};
pub use error::{Error, Result};
pub use media::{MediaFile, MediaLibrary, MediaQuality};
pub use monitor::NetworkMonitor;
pub use packet::{Packet, PacketType, HEADER_LEN};
pub use planner::{ChunkPlanner, ChunkRange, ChunkSizing};
pub use receiver::{ReceiveBuffer, ReceiverEvent, StreamSummary};
pub use sender::{SenderEvent, StreamSender};
pub use session::{SessionHandle, SessionRegistry};
pub use stats::TransferStats;

/// 기본 청크 크기 하한 (바이트)
pub const DEFAULT_CHUNK_MIN: usize = 1000;

/// 기본 청크 크기 상한 (바이트)
pub const DEFAULT_CHUNK_MAX: usize = 2000;

/// 대역폭 추정 기본값 (KB/s, 워밍업 구간)
pub const DEFAULT_BANDWIDTH_KBPS: f64 = 100.0;
