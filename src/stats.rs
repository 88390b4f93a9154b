//! 전송 통계

use std::time::{Duration, Instant};

/// 세션 단위 전송 통계 (송신/수신 공용)
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 처리한 패킷 수 (DATA 기준)
    pub packets: u64,

    /// 누적 페이로드 바이트
    pub bytes: u64,

    /// 소스/예상 전체 크기
    pub total_size: u64,

    /// 손실 처리된 패킷 수 (수신측: 윈도우 밖 드롭 + 버퍼 축출)
    pub lost_packets: u64,

    /// 중복 수신 패킷 수
    pub duplicate_packets: u64,
}

impl TransferStats {
    pub fn new(total_size: u64) -> Self {
        Self {
            start_time: Instant::now(),
            packets: 0,
            bytes: 0,
            total_size,
            lost_packets: 0,
            duplicate_packets: 0,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 진행률 (0.0 ~ 100.0)
    pub fn progress_percent(&self) -> f64 {
        if self.total_size == 0 {
            return 0.0;
        }
        (self.bytes as f64 / self.total_size as f64) * 100.0
    }

    /// 평균 처리율 (KB/s)
    pub fn throughput_kbps(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        (self.bytes as f64 / 1024.0) / elapsed
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Bytes: {}/{} ({:.1}%) | Packets: {} | Lost: {} | Dup: {} | Avg: {:.2} KB/s",
            self.elapsed().as_secs_f64(),
            self.bytes,
            self.total_size,
            self.progress_percent(),
            self.packets,
            self.lost_packets,
            self.duplicate_packets,
            self.throughput_kbps(),
        )
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new(0)
    }
}
