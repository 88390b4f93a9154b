//! 네트워크 상태 모니터링
//!
//! 최근 송신 기록의 롤링 윈도우로 순간 대역폭을 추정한다.
//! 세션별 상태이며 세션 간 공유되지 않는다.

use std::collections::VecDeque;
use std::time::Instant;

use crate::DEFAULT_BANDWIDTH_KBPS;

/// 송신 기록
#[derive(Debug, Clone, Copy)]
struct SendRecord {
    timestamp: Instant,
    size: usize,
}

/// 대역폭 추정기
///
/// 추정에만 사용되며 프로토콜 정확성과는 무관하다.
#[derive(Debug)]
pub struct NetworkMonitor {
    /// 최근 송신 기록 (오래된 항목부터 제거)
    records: VecDeque<SendRecord>,

    /// 윈도우 크기 (기록 수)
    window_size: usize,

    /// 추정에 사용할 최근 샘플 수
    estimate_samples: usize,

    /// 추정에 필요한 최소 샘플 수
    min_samples: usize,
}

impl NetworkMonitor {
    pub fn new(window_size: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(window_size),
            window_size,
            estimate_samples: 20,
            min_samples: 10,
        }
    }

    /// 송신 기록 추가 (타임스탬프를 외부에서 받아 테스트 가능)
    pub fn record_send(&mut self, size: usize, timestamp: Instant) {
        if self.records.len() >= self.window_size {
            self.records.pop_front();
        }
        self.records.push_back(SendRecord { timestamp, size });
    }

    /// 순간 대역폭 추정 (KB/s)
    ///
    /// 최근 20개 샘플의 바이트 합을 샘플 구간의 wall-clock 시간으로 나눈다.
    /// 샘플이 부족하거나 구간이 0이면 기본값 100을 반환하고,
    /// 결과는 [50, 1000]으로 클램프된다.
    pub fn estimate_bandwidth_kbps(&self) -> f64 {
        if self.records.len() < self.min_samples {
            return DEFAULT_BANDWIDTH_KBPS;
        }

        let start = self.records.len().saturating_sub(self.estimate_samples);
        let recent: Vec<&SendRecord> = self.records.range(start..).collect();

        let total_bytes: usize = recent.iter().map(|r| r.size).sum();
        let span = recent[recent.len() - 1]
            .timestamp
            .duration_since(recent[0].timestamp)
            .as_secs_f64();

        if span <= 0.0 {
            return DEFAULT_BANDWIDTH_KBPS;
        }

        let kbps = (total_bytes as f64 / 1024.0) / span;
        kbps.clamp(50.0, 1000.0)
    }

    /// 기록된 샘플 수
    pub fn sample_count(&self) -> usize {
        self.records.len()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn monitor_with_samples(count: usize, size: usize, interval: Duration) -> NetworkMonitor {
        let mut monitor = NetworkMonitor::default();
        let base = Instant::now();
        for i in 0..count {
            monitor.record_send(size, base + interval * i as u32);
        }
        monitor
    }

    #[test]
    fn test_too_few_samples_returns_default() {
        let monitor = monitor_with_samples(9, 1500, Duration::from_millis(10));
        assert_eq!(monitor.estimate_bandwidth_kbps(), 100.0);
    }

    #[test]
    fn test_zero_span_returns_default() {
        let mut monitor = NetworkMonitor::default();
        let now = Instant::now();
        for _ in 0..20 {
            monitor.record_send(1500, now);
        }
        assert_eq!(monitor.estimate_bandwidth_kbps(), 100.0);
    }

    #[test]
    fn test_estimate_in_expected_range() {
        // 20 샘플 x 10KB, 샘플 간 100ms -> 1.9초에 200KB ≈ 105 KB/s
        let monitor = monitor_with_samples(20, 10 * 1024, Duration::from_millis(100));
        let kbps = monitor.estimate_bandwidth_kbps();
        assert!((100.0..110.0).contains(&kbps), "got {kbps}");
    }

    #[test]
    fn test_clamped_to_upper_bound() {
        // 거대 버스트: 1ms 간격의 1MB 샘플
        let monitor = monitor_with_samples(20, 1024 * 1024, Duration::from_millis(1));
        assert_eq!(monitor.estimate_bandwidth_kbps(), 1000.0);
    }

    #[test]
    fn test_clamped_to_lower_bound() {
        // 매우 느린 전송: 2초 간격의 64바이트 샘플
        let monitor = monitor_with_samples(20, 64, Duration::from_secs(2));
        assert_eq!(monitor.estimate_bandwidth_kbps(), 50.0);
    }

    #[test]
    fn test_window_is_bounded() {
        let monitor = monitor_with_samples(250, 1000, Duration::from_millis(1));
        assert_eq!(monitor.sample_count(), 100);
    }
}
