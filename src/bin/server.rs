//! UVS 서버 (송신자) - UDP Video Stream
//!
//! 적응형 청크 미디어 스트리밍 서버
//! - 미디어 디렉토리 스캔 + JSON 컨트롤 요청 처리
//! - 클라이언트별 독립 송신 세션 (cancel-and-restart)
//!
//! 사용법:
//!   cargo run --release --bin uvs-server -- [OPTIONS]
//!
//! 예시:
//!   # 기본 실행
//!   cargo run --release --bin uvs-server -- --bind 0.0.0.0:9999 --media-dir media_files
//!
//!   # 정적 청크 모드
//!   cargo run --release --bin uvs-server -- -m media_files --no-adaptive

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use uvs::control::{ControlRequest, ErrorResponse, FileListResponse};
use uvs::packet::Packet;
use uvs::planner::{ChunkPlanner, ChunkRange};
use uvs::sender::{SenderEvent, StreamSender};
use uvs::session::SessionRegistry;
use uvs::{Config, MediaLibrary};

/// 서버 설정
struct ServerConfig {
    bind_addr: SocketAddr,
    media_dir: PathBuf,
    config: Config,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9999".parse().unwrap(),
            media_dir: PathBuf::from("media_files"),
            config: Config::default(),
        }
    }
}

fn parse_args() -> ServerConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ServerConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    config.bind_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--media-dir" | "-m" => {
                if i + 1 < args.len() {
                    config.media_dir = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--chunk-min" => {
                if i + 1 < args.len() {
                    config.config.chunk_range.min =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--chunk-max" => {
                if i + 1 < args.len() {
                    config.config.chunk_range.max =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--no-adaptive" => {
                config.config.adaptive = false;
            }
            "--help" | "-h" => {
                println!(
                    r#"UVS Server - UDP Video Stream 서버

적응형 청크 미디어 스트리밍 서버
- 파일 목록/스트림 요청은 JSON 데이터그램으로 수신
- 클라이언트별 독립 송신 세션, 중복 요청은 cancel-and-restart

사용법:
  cargo run --release --bin uvs-server -- [OPTIONS]

옵션:
  -b, --bind <ADDR>       바인드 주소 (기본: 0.0.0.0:9999)
  -m, --media-dir <DIR>   미디어 디렉토리 (기본: media_files)
  --chunk-min <SIZE>      청크 크기 하한 바이트 (기본: 1000)
  --chunk-max <SIZE>      청크 크기 상한 바이트 (기본: 2000)
  --no-adaptive           적응형 청크/pacing 비활성화
  -h, --help              이 도움말 출력

예시:
  # 미디어 디렉토리 스트리밍
  cargo run --release --bin uvs-server -- -m media_files

  # 고정 범위 전송
  cargo run --release --bin uvs-server -- --chunk-min 1200 --chunk-max 1500 --no-adaptive
"#
                );
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    // min > max인 범위가 송신 루프까지 내려가면 gen_range가 패닉한다
    let range = config.config.chunk_range;
    if ChunkRange::checked(range.min, range.max).is_none() {
        eprintln!(
            "유효하지 않은 청크 범위: [{}, {}] (1 <= min <= max 필요)",
            range.min, range.max
        );
        std::process::exit(1);
    }

    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let server_config = parse_args();

    info!("UVS Server starting...");
    info!("Bind address: {}", server_config.bind_addr);
    info!("Media directory: {:?}", server_config.media_dir);
    info!(
        "Chunk range: [{}, {}] bytes (adaptive: {})",
        server_config.config.chunk_range.min,
        server_config.config.chunk_range.max,
        server_config.config.adaptive
    );

    // 미디어 라이브러리 스캔
    if !server_config.media_dir.exists() {
        std::fs::create_dir_all(&server_config.media_dir)?;
        info!("Created media directory: {:?}", server_config.media_dir);
    }
    let library = Arc::new(MediaLibrary::scan(&server_config.media_dir)?);
    info!("Found {} media files", library.len());

    // 소켓 바인딩
    let socket = Arc::new(UdpSocket::bind(server_config.bind_addr).await?);
    info!("Server listening on {}", server_config.bind_addr);

    let registry = Arc::new(SessionRegistry::new());
    let config = server_config.config.clone();

    let mut buf = vec![0u8; 4096];
    info!("Waiting for client requests...");

    loop {
        let (len, addr) = socket.recv_from(&mut buf).await?;

        let request = match ControlRequest::from_bytes(&buf[..len]) {
            Ok(req) => req,
            Err(e) => {
                warn!("유효하지 않은 요청 ({}): {}", addr, e);
                continue;
            }
        };

        match request {
            ControlRequest::ListFiles => {
                let response = FileListResponse::new(library.entries());
                let packet = Packet::info(response.to_bytes()?, 0);
                socket.send_to(&packet.encode(), addr).await?;
                info!("Sent file list to {} ({} files)", addr, library.len());
            }

            ControlRequest::StreamFile { filename, quality } => {
                let media = match library.get(&filename) {
                    Some(m) => m.clone(),
                    None => {
                        warn!("파일 없음: {} (요청자 {})", filename, addr);
                        let payload =
                            ErrorResponse::new(format!("File not found: {filename}")).to_bytes()?;
                        let packet = Packet::error(payload);
                        socket.send_to(&packet.encode(), addr).await?;
                        continue;
                    }
                };

                // 프리셋 우선, Auto는 파일별 최적 범위
                let chunk_range = quality
                    .chunk_range()
                    .unwrap_or_else(|| media.quality.chunk_range());

                info!(
                    "Stream request: {} (quality: {:?}, range: [{}, {}]) from {}",
                    filename, quality, chunk_range.min, chunk_range.max, addr
                );

                let planner = if config.adaptive {
                    Box::new(ChunkPlanner::adaptive())
                } else {
                    Box::new(ChunkPlanner::fixed_range())
                };

                let (events_tx, mut events_rx) = mpsc::channel::<SenderEvent>(64);

                // 세션 이벤트 로깅 태스크
                tokio::spawn(async move {
                    while let Some(event) = events_rx.recv().await {
                        match event {
                            SenderEvent::Progress {
                                percent,
                                bandwidth_kbps,
                                ..
                            } => {
                                info!("[{}] progress {:.1}% @ {:.1} KB/s", addr, percent, bandwidth_kbps);
                            }
                            SenderEvent::Completed(stats) => {
                                info!("[{}] completed | {}", addr, stats.summary());
                            }
                            SenderEvent::Failed(message) => {
                                warn!("[{}] failed: {}", addr, message);
                            }
                            SenderEvent::Cancelled => {
                                info!("[{}] cancelled", addr);
                            }
                        }
                    }
                });

                let cancel = registry.new_cancel_flag();
                let sender = StreamSender::new(
                    config.clone(),
                    socket.clone(),
                    addr,
                    planner,
                    cancel.clone(),
                    events_tx,
                );

                let registry_task = registry.clone();
                let cancel_task = cancel.clone();
                let task = tokio::spawn(async move {
                    if let Err(e) = sender.serve(&media, chunk_range).await {
                        warn!("세션 종료 (에러): {} - {}", addr, e);
                    }
                    // 취소된 세션의 레지스트리 항목은 이미 교체/제거되었을 수 있음
                    if !cancel_task.load(Ordering::SeqCst) {
                        registry_task.remove(&addr);
                    }
                });

                registry.begin(addr, cancel, task);
            }
        }
    }
}
