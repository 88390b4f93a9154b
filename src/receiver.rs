//! 수신자 (클라이언트측)
//!
//! - 데이터그램 파싱 및 시퀀스 재정렬
//! - 연속 프리픽스만 출력에 기록 (gap 없는 기록이 핵심 불변식)
//! - 재생 임계값 교차 신호 (세션당 1회)
//!
//! 재전송이 없는 프로토콜이므로 윈도우 밖 패킷은 영구 손실로 기록한다.

use std::collections::BTreeMap;
use std::io::Write;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::config::Config;
use crate::packet::{Packet, PacketType};
use crate::stats::TransferStats;
use crate::{Error, Result};

/// 패킷 처리 결과 이벤트
#[derive(Debug)]
pub enum ReceiverEvent {
    /// 연속 구간에 기록됨 (또는 무해한 no-op)
    BufferedInOrder,

    /// 순서가 앞선 패킷, 재정렬 버퍼에 보관 (윈도우 밖이면 손실 기록)
    BufferedOutOfOrder,

    /// 재생 시작 가능 임계값 최초 교차
    PlaybackThresholdCrossed,

    /// 스트림 종료 (END 수신 또는 예상 크기 도달)
    StreamComplete,

    /// 패킷 단위 에러 (패킷만 폐기, 세션은 유지)
    ProtocolError(Error),
}

/// 세션 종료 후 요약
///
/// END/타임아웃/에러 어느 경로로 끝나든 항상 얻을 수 있어야 한다.
#[derive(Debug, Clone)]
pub struct StreamSummary {
    pub bytes_received: u64,
    pub total_expected: Option<u64>,
    pub packets: u64,
    pub lost_packets: u64,
    pub duplicate_packets: u64,
    pub end_sequence: Option<u32>,
    pub complete: bool,
    pub elapsed: Duration,
}

impl StreamSummary {
    /// 손실 없이 전체를 받았는지
    pub fn is_clean(&self) -> bool {
        self.complete
            && self.lost_packets == 0
            && self.total_expected.map_or(false, |t| t == self.bytes_received)
    }

    pub fn summary(&self) -> String {
        format!(
            "Received: {}/{} bytes | Packets: {} | Lost: {} | Dup: {} | Complete: {} | Elapsed: {:.2}s",
            self.bytes_received,
            self.total_expected
                .map(|t| t.to_string())
                .unwrap_or_else(|| "?".into()),
            self.packets,
            self.lost_packets,
            self.duplicate_packets,
            self.complete,
            self.elapsed.as_secs_f64(),
        )
    }
}

/// 수신 재조립 버퍼
///
/// 출력에 기록된 바이트는 항상 스트림 시작부터 `expected_sequence - 1`까지의
/// 연속 시퀀스에 정확히 대응한다.
pub struct ReceiveBuffer<W: Write> {
    sink: W,

    /// 연속 프리픽스를 확장할 다음 시퀀스
    expected_sequence: u32,

    /// 먼저 도착한 패킷 보관소 (시퀀스 -> 페이로드)
    pending: BTreeMap<u32, Bytes>,

    /// 재정렬 윈도우 (expected_sequence + window 이상은 손실 처리)
    reorder_window: usize,

    /// 재생 임계값 (연속 수신 바이트)
    playback_threshold: u64,
    threshold_fired: bool,

    total_expected: Option<u64>,
    end_sequence: Option<u32>,
    complete: bool,

    stats: TransferStats,
}

impl<W: Write> ReceiveBuffer<W> {
    pub fn new(sink: W, config: &Config) -> Self {
        Self {
            sink,
            expected_sequence: 0,
            pending: BTreeMap::new(),
            reorder_window: config.reorder_window,
            playback_threshold: config.playback_threshold,
            threshold_fired: false,
            total_expected: None,
            end_sequence: None,
            complete: false,
            stats: TransferStats::default(),
        }
    }

    /// 원시 데이터그램 처리
    ///
    /// 디코드 실패는 해당 패킷만 폐기한다. 잘못된 데이터그램 하나가
    /// 세션을 종료시키지 않는다.
    pub fn on_datagram(&mut self, raw: &[u8]) -> ReceiverEvent {
        match Packet::decode(raw) {
            Ok(packet) => self.on_packet(&packet),
            Err(e) => {
                debug!("패킷 폐기: {}", e);
                ReceiverEvent::ProtocolError(e)
            }
        }
    }

    /// 디코드된 패킷 처리
    pub fn on_packet(&mut self, packet: &Packet) -> ReceiverEvent {
        match packet.packet_type {
            PacketType::Info => {
                // 시퀀스 상태는 건드리지 않는다
                self.total_expected = Some(packet.total_size);
                self.stats.total_size = packet.total_size;
                debug!("stream info: total_size={}", packet.total_size);
                ReceiverEvent::BufferedInOrder
            }
            PacketType::End => self.on_end(packet.sequence),
            PacketType::Error => {
                let message = String::from_utf8_lossy(&packet.payload).into_owned();
                warn!("서버 에러 수신: {}", message);
                ReceiverEvent::ProtocolError(Error::StreamError(message))
            }
            PacketType::Data => self.on_data(packet),
            PacketType::Unknown(b) => {
                // forward compatibility: 경고 후 폐기, 치명적이지 않음
                warn!("알 수 없는 패킷 타입 {:#04x}, 폐기", b);
                ReceiverEvent::BufferedInOrder
            }
        }
    }

    fn on_end(&mut self, sequence: u32) -> ReceiverEvent {
        // END는 권위적 종료: 미처리 out-of-order 데이터는 손실로 기록하고
        // 버린다 (원 설계의 동작, 잠재적 데이터 유실 지점)
        if !self.pending.is_empty() {
            warn!(
                "END 수신 시점에 미조립 패킷 {}개 폐기",
                self.pending.len()
            );
            self.stats.lost_packets += self.pending.len() as u64;
            self.pending.clear();
        }

        self.complete = true;
        self.end_sequence = Some(sequence);
        self.threshold_fired = true;
        ReceiverEvent::StreamComplete
    }

    fn on_data(&mut self, packet: &Packet) -> ReceiverEvent {
        if self.complete {
            // END 이후 도착한 지각 패킷
            return ReceiverEvent::BufferedInOrder;
        }

        let seq = packet.sequence;

        // 이미 기록된 시퀀스의 중복: 멱등 no-op
        if seq < self.expected_sequence {
            self.stats.duplicate_packets += 1;
            return ReceiverEvent::BufferedInOrder;
        }

        if seq == self.expected_sequence {
            if let Err(e) = self.write_contiguous(&packet.payload) {
                return ReceiverEvent::ProtocolError(e);
            }
            if let Err(e) = self.drain_pending() {
                return ReceiverEvent::ProtocolError(e);
            }

            if self
                .total_expected
                .map_or(false, |total| self.stats.bytes >= total)
            {
                self.complete = true;
                self.threshold_fired = true;
                return ReceiverEvent::StreamComplete;
            }

            if !self.threshold_fired && self.stats.bytes >= self.playback_threshold {
                self.threshold_fired = true;
                return ReceiverEvent::PlaybackThresholdCrossed;
            }

            return ReceiverEvent::BufferedInOrder;
        }

        // 윈도우 밖: 재전송이 없으므로 기다려도 소용없다
        if seq as u64 >= self.expected_sequence as u64 + self.reorder_window as u64 {
            warn!(
                "재정렬 윈도우 밖 시퀀스 {} (expected {}), 손실 처리",
                seq, self.expected_sequence
            );
            self.stats.lost_packets += 1;
            return ReceiverEvent::BufferedOutOfOrder;
        }

        // 앞선 패킷 보관 (중복 도착은 덮어써도 무해)
        if self.pending.insert(seq, packet.payload.clone()).is_some() {
            self.stats.duplicate_packets += 1;
        }

        // 보관소 한도 초과 시 가장 오래된 키부터 축출
        while self.pending.len() > self.reorder_window {
            if let Some((evicted, _)) = self.pending.pop_first() {
                warn!("재정렬 버퍼 초과, 시퀀스 {} 축출", evicted);
                self.stats.lost_packets += 1;
            }
        }

        ReceiverEvent::BufferedOutOfOrder
    }

    /// 연속 구간 기록 및 카운터 갱신
    fn write_contiguous(&mut self, payload: &[u8]) -> Result<()> {
        self.sink.write_all(payload)?;
        self.stats.bytes += payload.len() as u64;
        self.stats.packets += 1;
        self.expected_sequence += 1;
        Ok(())
    }

    /// 새 도착으로 완성된 연속 run을 보관소에서 빼내 기록
    fn drain_pending(&mut self) -> Result<()> {
        while let Some(payload) = self.pending.remove(&self.expected_sequence) {
            self.write_contiguous(&payload)?;
        }
        Ok(())
    }

    /// 다음에 필요한 시퀀스
    pub fn expected_sequence(&self) -> u32 {
        self.expected_sequence
    }

    /// 연속 구간에 기록된 바이트
    pub fn bytes_received(&self) -> u64 {
        self.stats.bytes
    }

    pub fn total_expected(&self) -> Option<u64> {
        self.total_expected
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    /// 현재 시점 요약 (종료 여부와 무관하게 호출 가능)
    pub fn summary(&self) -> StreamSummary {
        StreamSummary {
            bytes_received: self.stats.bytes,
            total_expected: self.total_expected,
            packets: self.stats.packets,
            lost_packets: self.stats.lost_packets,
            duplicate_packets: self.stats.duplicate_packets,
            end_sequence: self.end_sequence,
            complete: self.complete,
            elapsed: self.stats.elapsed(),
        }
    }

    /// 세션 종료: 싱크 flush 후 요약 반환
    pub fn finish(mut self) -> Result<StreamSummary> {
        self.sink.flush()?;
        Ok(self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::NetworkMonitor;
    use crate::planner::{ChunkPlanner, ChunkRange, ChunkSizing};

    fn buffer(config: &Config) -> ReceiveBuffer<Vec<u8>> {
        ReceiveBuffer::new(Vec::new(), config)
    }

    fn data_packet(seq: u32, payload: &[u8]) -> Packet {
        Packet::data(seq, Bytes::copy_from_slice(payload), 0, 0)
    }

    #[test]
    fn test_clean_completion_5000_bytes() {
        // 5000바이트 소스를 송신 루프와 동일한 방식으로 청킹
        let source = vec![0x5Au8; 5000];
        let mut planner = ChunkPlanner::with_seed(42, false);
        let monitor = NetworkMonitor::default();
        let range = ChunkRange::new(1000, 2000);

        let mut packets = Vec::new();
        let mut offset = 0usize;
        let mut seq = 0u32;
        while offset < source.len() {
            let planned = planner.next_chunk_size(range, &monitor);
            let len = planned.min(source.len() - offset);
            packets.push(Packet::data(
                seq,
                Bytes::copy_from_slice(&source[offset..offset + len]),
                offset as u64,
                source.len() as u64,
            ));
            offset += len;
            seq += 1;
        }
        let end = Packet::end(seq, 5000, 5000);

        let mut config = Config::default();
        config.playback_threshold = 1_000_000; // 이 테스트에서는 교차하지 않음
        let mut buf = buffer(&config);

        buf.on_packet(&Packet::info(Bytes::new(), 5000));
        for pkt in &packets {
            buf.on_packet(pkt);
        }
        let event = buf.on_packet(&end);
        assert!(matches!(event, ReceiverEvent::StreamComplete));

        let summary = buf.finish().unwrap();
        assert_eq!(summary.bytes_received, 5000);
        assert_eq!(summary.packets, packets.len() as u64);
        assert_eq!(summary.end_sequence, Some(packets.len() as u32));
        assert_eq!(summary.lost_packets, 0);
        assert!(summary.is_clean());
    }

    #[test]
    fn test_out_of_order_flush() {
        let config = Config::default();
        let mut buf = buffer(&config);

        assert!(matches!(
            buf.on_packet(&data_packet(0, b"A")),
            ReceiverEvent::BufferedInOrder
        ));
        assert!(matches!(
            buf.on_packet(&data_packet(2, b"C")),
            ReceiverEvent::BufferedOutOfOrder
        ));

        // 시퀀스 1 도착 시 1, 2가 순서대로 즉시 flush
        buf.on_packet(&data_packet(1, b"B"));
        assert_eq!(buf.expected_sequence(), 3);

        buf.on_packet(&data_packet(3, b"D"));
        let (sink, summary) = (buf.sink.clone(), buf.summary());
        assert_eq!(sink, b"ABCD");
        assert_eq!(summary.packets, 4);
        assert_eq!(summary.lost_packets, 0);
    }

    #[test]
    fn test_contiguity_under_permutation() {
        let config = Config::default();
        let mut buf = buffer(&config);
        let original = b"abcdefgh";

        // 임의 순서 + 항상 연속 프리픽스 불변식 확인
        for &seq in &[3u32, 0, 5, 1, 2, 7, 4, 6] {
            buf.on_packet(&data_packet(seq, &original[seq as usize..seq as usize + 1]));
            let written = buf.sink.len();
            assert_eq!(&buf.sink[..], &original[..written]);
        }
        assert_eq!(&buf.sink[..], original);
    }

    #[test]
    fn test_duplicate_is_idempotent() {
        let config = Config::default();
        let mut buf = buffer(&config);

        buf.on_packet(&data_packet(0, b"AAAA"));
        let event = buf.on_packet(&data_packet(0, b"AAAA"));

        assert!(matches!(event, ReceiverEvent::BufferedInOrder));
        assert_eq!(buf.bytes_received(), 4);
        assert_eq!(buf.sink, b"AAAA");
        assert_eq!(buf.stats().duplicate_packets, 1);
        assert_eq!(buf.expected_sequence(), 1);
    }

    #[test]
    fn test_playback_threshold_fires_once() {
        let mut config = Config::default();
        config.playback_threshold = 10;
        let mut buf = buffer(&config);

        assert!(matches!(
            buf.on_packet(&data_packet(0, b"123456")),
            ReceiverEvent::BufferedInOrder
        ));
        assert!(matches!(
            buf.on_packet(&data_packet(1, b"789012")),
            ReceiverEvent::PlaybackThresholdCrossed
        ));
        // 임계값을 계속 넘어도 다시 발화하지 않음
        assert!(matches!(
            buf.on_packet(&data_packet(2, b"345678")),
            ReceiverEvent::BufferedInOrder
        ));
    }

    #[test]
    fn test_loss_beyond_reorder_window() {
        let mut config = Config::default();
        config.reorder_window = 5;
        let mut buf = buffer(&config);

        buf.on_packet(&data_packet(0, b"X"));
        let event = buf.on_packet(&data_packet(100, b"Y"));

        assert!(matches!(event, ReceiverEvent::BufferedOutOfOrder));
        assert_eq!(buf.expected_sequence(), 1); // 스톨 상태 유지
        assert_eq!(buf.pending_len(), 0);       // 보관하지 않음
        assert_eq!(buf.stats().lost_packets, 1);
    }

    #[test]
    fn test_truncated_datagram_is_dropped() {
        let config = Config::default();
        let mut buf = buffer(&config);

        let event = buf.on_datagram(&[0u8; 10]);
        assert!(matches!(
            event,
            ReceiverEvent::ProtocolError(Error::TruncatedPacket { .. })
        ));
        assert!(buf.sink.is_empty());
        assert_eq!(buf.expected_sequence(), 0);
    }

    #[test]
    fn test_end_with_gaps_counts_loss() {
        let config = Config::default();
        let mut buf = buffer(&config);

        buf.on_packet(&Packet::info(Bytes::new(), 3));
        buf.on_packet(&data_packet(0, b"A"));
        buf.on_packet(&data_packet(2, b"C")); // gap: 1 누락

        let event = buf.on_packet(&Packet::end(3, 3, 3));
        assert!(matches!(event, ReceiverEvent::StreamComplete));

        let summary = buf.finish().unwrap();
        assert!(summary.complete);
        assert_eq!(summary.bytes_received, 1);
        assert_eq!(summary.lost_packets, 1); // 버려진 시퀀스 2
        assert!(!summary.is_clean());
    }

    #[test]
    fn test_info_sets_total_without_sequence_change() {
        let config = Config::default();
        let mut buf = buffer(&config);

        buf.on_packet(&Packet::info(Bytes::from_static(b"{}"), 1234));
        assert_eq!(buf.total_expected(), Some(1234));
        assert_eq!(buf.expected_sequence(), 0);
        assert!(buf.sink.is_empty());
    }

    #[test]
    fn test_completion_by_expected_size() {
        let config = Config::default();
        let mut buf = buffer(&config);

        buf.on_packet(&Packet::info(Bytes::new(), 4));
        buf.on_packet(&data_packet(0, b"AB"));
        let event = buf.on_packet(&data_packet(1, b"CD"));

        assert!(matches!(event, ReceiverEvent::StreamComplete));
        assert!(buf.is_complete());
    }

    #[test]
    fn test_error_packet_is_protocol_error() {
        let config = Config::default();
        let mut buf = buffer(&config);

        let pkt = Packet::error(Bytes::from_static(b"file vanished"));
        let event = buf.on_packet(&pkt);
        assert!(matches!(
            event,
            ReceiverEvent::ProtocolError(Error::StreamError(_))
        ));
    }
}
