//! 청크 크기 결정
//!
//! - 정적 모드: 범위 내 균등 랜덤
//! - 적응형 모드: 대역폭 추정치에 따라 범위를 좁힌 후 랜덤
//!
//! 전략은 trait으로 분리되어 테스트에서 결정적 구현을 주입할 수 있다.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::monitor::NetworkMonitor;
use crate::{DEFAULT_CHUNK_MAX, DEFAULT_CHUNK_MIN};

/// 청크 크기 범위 (닫힌 구간 [min, max], 바이트)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub min: usize,
    pub max: usize,
}

impl ChunkRange {
    pub fn new(min: usize, max: usize) -> Self {
        debug_assert!(min >= 1 && min <= max);
        Self { min, max }
    }

    /// 외부 입력(CLI 등) 검증용. `1 <= min <= max`가 아니면 None.
    pub fn checked(min: usize, max: usize) -> Option<Self> {
        (min >= 1 && min <= max).then_some(Self { min, max })
    }

    /// 대역폭 기반 범위 조정
    ///
    /// 100 KB/s 미만이면 하위 1/3로 축소, 300 KB/s 초과면 상위 절반 사용.
    /// 중간 대역에서는 범위를 그대로 둔다. 대역폭이 확실히 넉넉할 때만
    /// 큰 패킷을 쓰고, 혼잡 시에는 공격적으로 줄인다.
    pub fn adapt(self, bandwidth_kbps: f64) -> Self {
        let span = self.max - self.min;
        if bandwidth_kbps < 100.0 {
            Self {
                min: self.min,
                max: self.min + span / 3,
            }
        } else if bandwidth_kbps > 300.0 {
            Self {
                min: self.min + span / 2,
                max: self.max,
            }
        } else {
            self
        }
    }
}

impl Default for ChunkRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_CHUNK_MIN,
            max: DEFAULT_CHUNK_MAX,
        }
    }
}

/// 청크 크기 전략
///
/// 송신자가 trait object로 소유한 채 spawn된 태스크에서 구동하므로
/// `Send + Sync`가 필요하다.
pub trait ChunkSizing: Send + Sync {
    /// 다음 청크 크기 결정 (최종 청크의 remaining 클리핑은 송신 루프 담당)
    fn next_chunk_size(&mut self, range: ChunkRange, monitor: &NetworkMonitor) -> usize;
}

/// 기본 청크 플래너
#[derive(Debug)]
pub struct ChunkPlanner {
    rng: StdRng,

    /// 적응형 모드 여부
    adaptive: bool,
}

impl ChunkPlanner {
    /// 정적 모드 플래너
    pub fn fixed_range() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            adaptive: false,
        }
    }

    /// 적응형 모드 플래너
    pub fn adaptive() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            adaptive: true,
        }
    }

    /// 시드 지정 (테스트용 결정성)
    pub fn with_seed(seed: u64, adaptive: bool) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            adaptive,
        }
    }
}

impl ChunkSizing for ChunkPlanner {
    fn next_chunk_size(&mut self, range: ChunkRange, monitor: &NetworkMonitor) -> usize {
        let effective = if self.adaptive {
            range.adapt(monitor.estimate_bandwidth_kbps())
        } else {
            range
        };
        self.rng.gen_range(effective.min..=effective.max).max(1)
    }
}
