//! 프로토콜 설정

use crate::planner::ChunkRange;

/// UVS 프로토콜 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 기본 청크 크기 범위 (바이트)
    pub chunk_range: ChunkRange,

    /// 적응형 청크/pacing 사용 여부
    pub adaptive: bool,

    /// 저대역폭 pacing 간격 (밀리초, 추정치 < 100 KB/s)
    pub pacing_slow_ms: u64,

    /// 중간 대역폭 pacing 간격 (밀리초)
    pub pacing_default_ms: u64,

    /// 고대역폭 pacing 간격 (마이크로초, 추정치 > 300 KB/s)
    pub pacing_fast_us: u64,

    /// 대역폭 추정 윈도우 (송신 기록 수)
    pub monitor_window: usize,

    /// 재생 시작 임계값 (연속 수신 바이트)
    pub playback_threshold: u64,

    /// out-of-order 버퍼 한도 (패킷 수)
    /// expected_sequence + window 밖의 시퀀스는 손실 처리
    pub reorder_window: usize,

    /// 수신 유휴 타임아웃 (밀리초, END 없이 이 시간 경과 시 세션 종료)
    pub recv_timeout_ms: u64,

    /// 진행률 이벤트 주기 (패킷 수)
    pub progress_interval_packets: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_range: ChunkRange::default(), // [1000, 2000]
            adaptive: true,
            pacing_slow_ms: 10,
            pacing_default_ms: 5,
            pacing_fast_us: 800,
            monitor_window: 100,
            playback_threshold: 100 * 1024,   // 100KB
            reorder_window: 256,
            recv_timeout_ms: 30_000,          // 30초
            progress_interval_packets: 50,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// 불안정한 네트워크용 설정
    pub fn unstable_network() -> Self {
        Self {
            chunk_range: ChunkRange::new(1000, 1400),
            adaptive: true,
            pacing_slow_ms: 20,
            pacing_default_ms: 10,
            pacing_fast_us: 2000,
            monitor_window: 50,
            playback_threshold: 50 * 1024,    // 50KB, 더 일찍 재생 시작
            reorder_window: 512,
            recv_timeout_ms: 60_000,
            progress_interval_packets: 25,
        }
    }

    /// 고처리량 환경용 설정 (LAN 등)
    pub fn high_throughput() -> Self {
        Self {
            chunk_range: ChunkRange::new(1400, 2000),
            adaptive: false,
            pacing_slow_ms: 5,
            pacing_default_ms: 2,
            pacing_fast_us: 200,
            monitor_window: 200,
            playback_threshold: 100 * 1024,
            reorder_window: 128,
            recv_timeout_ms: 10_000,
            progress_interval_packets: 100,
        }
    }
}
