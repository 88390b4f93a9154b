//! 송신자 (서버측)
//!
//! - 클라이언트당 하나의 독립 송신 루프
//! - 적응형 청크 크기 + 적응형 pacing
//! - 진행/종료는 이벤트 채널로만 외부에 전달 (공유 상태 변이 없음)

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::control::{ErrorResponse, StreamInfo};
use crate::media::MediaFile;
use crate::monitor::NetworkMonitor;
use crate::packet::Packet;
use crate::planner::{ChunkRange, ChunkSizing};
use crate::stats::TransferStats;
use crate::Result;

/// 송신 세션 이벤트 (엔진 -> 컨트롤/UI 계층)
#[derive(Debug)]
pub enum SenderEvent {
    Progress {
        bytes_sent: u64,
        total_size: u64,
        percent: f64,
        bandwidth_kbps: f64,
    },
    Completed(TransferStats),
    Failed(String),
    Cancelled,
}

/// 스트림 송신자
///
/// 소스 파일과 클라이언트 주소 하나에 대한 전송 전체를 소유한다.
/// 파일 핸들은 `serve` 스코프에 묶여 모든 종료 경로에서 닫힌다.
pub struct StreamSender {
    config: Config,
    socket: Arc<UdpSocket>,
    client_addr: SocketAddr,
    planner: Box<dyn ChunkSizing>,
    monitor: NetworkMonitor,
    cancelled: Arc<AtomicBool>,
    events: mpsc::Sender<SenderEvent>,
}

impl StreamSender {
    pub fn new(
        config: Config,
        socket: Arc<UdpSocket>,
        client_addr: SocketAddr,
        planner: Box<dyn ChunkSizing>,
        cancelled: Arc<AtomicBool>,
        events: mpsc::Sender<SenderEvent>,
    ) -> Self {
        let monitor = NetworkMonitor::new(config.monitor_window);
        Self {
            config,
            socket,
            client_addr,
            planner,
            monitor,
            cancelled,
            events,
        }
    }

    /// 전송 루프: INFO -> DATA* -> END (또는 ERROR)
    ///
    /// 소스가 소진되면 END를 정확히 한 번 보내고 종료한다. 소스 IO 에러는
    /// best-effort ERROR 패킷 전송 후 세션 실패로 이어진다.
    pub async fn serve(mut self, media: &MediaFile, chunk_range: ChunkRange) -> Result<TransferStats> {
        let total_size = media.size;
        let mut stats = TransferStats::new(total_size);

        let mut file = match tokio::fs::File::open(&media.path).await {
            Ok(f) => f,
            Err(e) => {
                self.fail(&format!("소스 열기 실패: {e}")).await;
                return Err(e.into());
            }
        };

        // 1. 스트림 메타데이터 (INFO, 시퀀스 0)
        let info = StreamInfo {
            filename: media.filename.clone(),
            size: total_size,
            quality: media.quality.label().to_string(),
            chunk_range: (chunk_range.min, chunk_range.max),
        };
        let info_packet = Packet::info(info.to_bytes()?, total_size);
        self.socket
            .send_to(&info_packet.encode(), self.client_addr)
            .await?;

        info!(
            "streaming {} ({} bytes, {}) to {}",
            media.filename,
            total_size,
            media.quality.label(),
            self.client_addr
        );

        let mut sequence: u32 = 0;
        let mut bytes_sent: u64 = 0;
        let mut read_buf = vec![0u8; chunk_range.max];

        // 2. 데이터 루프
        while bytes_sent < total_size {
            if self.cancelled.load(Ordering::SeqCst) {
                info!("세션 취소됨: {}", self.client_addr);
                let _ = self.events.send(SenderEvent::Cancelled).await;
                return Ok(stats);
            }

            let planned = self.planner.next_chunk_size(chunk_range, &self.monitor);
            let remaining = (total_size - bytes_sent) as usize;
            // 마지막 청크는 남은 바이트 수로 정확히 클리핑
            let len = planned.min(remaining).max(1);

            if let Err(e) = file.read_exact(&mut read_buf[..len]).await {
                self.fail(&format!("소스 읽기 실패: {e}")).await;
                return Err(e.into());
            }

            let packet = Packet::data(
                sequence,
                Bytes::copy_from_slice(&read_buf[..len]),
                bytes_sent,
                total_size,
            );
            let wire = packet.encode();
            self.socket.send_to(&wire, self.client_addr).await?;
            self.monitor.record_send(wire.len(), Instant::now());

            bytes_sent += len as u64;
            sequence += 1;
            stats.packets += 1;
            stats.bytes += len as u64;

            if stats.packets % self.config.progress_interval_packets == 0 {
                let bandwidth = self.monitor.estimate_bandwidth_kbps();
                debug!(
                    "progress: {:.1}% | {:.1} KB/s | chunk {} bytes",
                    stats.progress_percent(),
                    bandwidth,
                    len
                );
                let _ = self
                    .events
                    .send(SenderEvent::Progress {
                        bytes_sent,
                        total_size,
                        percent: stats.progress_percent(),
                        bandwidth_kbps: bandwidth,
                    })
                    .await;
            }

            // 3. 적응형 pacing: 혼잡 시 전송을 늦춰 손실 증폭을 줄인다
            if bytes_sent < total_size {
                tokio::time::sleep(self.pacing_delay()).await;
            }
        }

        // 4. END는 정확히 한 번, 마지막 DATA 이후 도달한 시퀀스 값 전달
        let end_packet = Packet::end(sequence, bytes_sent, total_size);
        self.socket
            .send_to(&end_packet.encode(), self.client_addr)
            .await?;

        info!("전송 완료: {} | {}", self.client_addr, stats.summary());
        let _ = self.events.send(SenderEvent::Completed(stats.clone())).await;
        Ok(stats)
    }

    /// 대역폭 추정 기반 패킷 간 지연
    fn pacing_delay(&self) -> Duration {
        if !self.config.adaptive {
            return Duration::from_millis(self.config.pacing_default_ms);
        }

        let bandwidth = self.monitor.estimate_bandwidth_kbps();
        if bandwidth < 100.0 {
            Duration::from_millis(self.config.pacing_slow_ms)
        } else if bandwidth > 300.0 {
            Duration::from_micros(self.config.pacing_fast_us)
        } else {
            Duration::from_millis(self.config.pacing_default_ms)
        }
    }

    /// best-effort ERROR 패킷 전송 + 실패 이벤트
    async fn fail(&self, message: &str) {
        warn!("세션 실패 ({}): {}", self.client_addr, message);

        if let Ok(payload) = ErrorResponse::new(message).to_bytes() {
            let packet = Packet::error(payload);
            if let Err(e) = self.socket.send_to(&packet.encode(), self.client_addr).await {
                warn!("ERROR 패킷 전송 실패: {}", e);
            }
        }

        let _ = self.events.send(SenderEvent::Failed(message.to_string())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::ChunkPlanner;
    use crate::receiver::ReceiveBuffer;
    use std::io::Write;

    // serve 퓨처는 tokio::spawn으로 태스크 경계를 넘는다
    fn _serve_future_is_send(sender: StreamSender, media: &'static MediaFile) {
        fn require_send<F: Send>(_: F) {}
        require_send(sender.serve(media, ChunkRange::default()));
    }

    async fn bound_pair() -> (Arc<UdpSocket>, Arc<UdpSocket>, SocketAddr) {
        let server = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let client = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let client_addr = client.local_addr().unwrap();
        (server, client, client_addr)
    }

    fn temp_media(size: usize) -> (tempfile::TempDir, MediaFile) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&data).unwrap();
        let media = MediaFile::probe(&path).unwrap();
        (dir, media)
    }

    #[tokio::test]
    async fn test_loopback_transfer() {
        let (server, client, client_addr) = bound_pair().await;
        let (_dir, media) = temp_media(5000);

        let config = Config::high_throughput();
        let (events_tx, mut events_rx) = mpsc::channel(64);
        let sender = StreamSender::new(
            config.clone(),
            server,
            client_addr,
            Box::new(ChunkPlanner::with_seed(3, false)),
            Arc::new(AtomicBool::new(false)),
            events_tx,
        );

        let range = ChunkRange::new(1000, 2000);
        let serve_task = tokio::spawn(async move { sender.serve(&media, range).await });

        // 수신측: 로컬 루프백이므로 순서/무손실 가정
        let mut buf = ReceiveBuffer::new(Vec::new(), &config);
        let mut datagram = vec![0u8; 65535];
        loop {
            let (len, _) = client.recv_from(&mut datagram).await.unwrap();
            buf.on_datagram(&datagram[..len]);
            // 예상 크기 도달로 먼저 완료되더라도 END까지 소비
            if buf.summary().end_sequence.is_some() {
                break;
            }
        }

        let stats = serve_task.await.unwrap().unwrap();
        assert_eq!(stats.bytes, 5000);
        assert_eq!(buf.bytes_received(), 5000);
        assert_eq!(buf.total_expected(), Some(5000));

        let summary = buf.finish().unwrap();
        assert_eq!(summary.end_sequence, Some(stats.packets as u32));
        assert!(summary.is_clean());

        // 완료 이벤트 확인
        let mut completed = false;
        while let Ok(event) = events_rx.try_recv() {
            if matches!(event, SenderEvent::Completed(_)) {
                completed = true;
            }
        }
        assert!(completed);
    }

    #[tokio::test]
    async fn test_cancelled_before_data() {
        let (server, _client, client_addr) = bound_pair().await;
        let (_dir, media) = temp_media(5000);

        let cancelled = Arc::new(AtomicBool::new(true));
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let sender = StreamSender::new(
            Config::default(),
            server,
            client_addr,
            Box::new(ChunkPlanner::with_seed(3, false)),
            cancelled,
            events_tx,
        );

        let stats = sender.serve(&media, ChunkRange::default()).await.unwrap();
        assert_eq!(stats.packets, 0);
        assert!(matches!(
            events_rx.recv().await,
            Some(SenderEvent::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_missing_source_sends_error_packet() {
        let (server, client, client_addr) = bound_pair().await;
        let (dir, media) = temp_media(100);
        drop(std::fs::remove_file(&media.path));
        drop(dir);

        let (events_tx, mut events_rx) = mpsc::channel(8);
        let sender = StreamSender::new(
            Config::default(),
            server,
            client_addr,
            Box::new(ChunkPlanner::with_seed(3, false)),
            Arc::new(AtomicBool::new(false)),
            events_tx,
        );

        let result = sender.serve(&media, ChunkRange::default()).await;
        assert!(result.is_err());
        assert!(matches!(
            events_rx.recv().await,
            Some(SenderEvent::Failed(_))
        ));

        // 클라이언트에는 ERROR 패킷이 도착
        let mut datagram = vec![0u8; 65535];
        let (len, _) = client.recv_from(&mut datagram).await.unwrap();
        let packet = Packet::decode(&datagram[..len]).unwrap();
        assert_eq!(packet.packet_type, crate::packet::PacketType::Error);
    }
}
