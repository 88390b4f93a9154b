//! UVS 클라이언트 (수신자) - UDP Video Stream
//!
//! 적응형 청크 미디어 스트리밍 클라이언트
//! - out-of-order 패킷을 연속 파일로 재조립
//! - 재생 임계값 도달 시 버퍼 파일 경로를 알림 (플레이어 실행은 외부 몫)
//!
//! 사용법:
//!   cargo run --release --bin uvs-client -- [OPTIONS]
//!
//! 예시:
//!   # 파일 목록 조회
//!   cargo run --release --bin uvs-client -- --server 127.0.0.1:9999 --list
//!
//!   # 고품질 스트리밍
//!   cargo run --release --bin uvs-client -- -s 127.0.0.1:9999 -f clip.mp4 -q high

use std::io::BufWriter;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use uvs::control::{ControlRequest, ErrorResponse, FileListResponse, QualityPreset};
use uvs::packet::{Packet, PacketType};
use uvs::receiver::{ReceiveBuffer, ReceiverEvent};
use uvs::{Config, Error};

/// 클라이언트 설정
struct ClientConfig {
    bind_addr: SocketAddr,
    server_addr: SocketAddr,
    output_dir: PathBuf,
    file: Option<String>,
    quality: QualityPreset,
    list: bool,
    config: Config,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:0".parse().unwrap(),
            server_addr: "127.0.0.1:9999".parse().unwrap(),
            output_dir: PathBuf::from("client_buffer"),
            file: None,
            quality: QualityPreset::Auto,
            list: false,
            config: Config::default(),
        }
    }
}

fn parse_args() -> ClientConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ClientConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    config.bind_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--server" | "-s" => {
                if i + 1 < args.len() {
                    config.server_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--output-dir" | "-o" => {
                if i + 1 < args.len() {
                    config.output_dir = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--file" | "-f" => {
                if i + 1 < args.len() {
                    config.file = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--quality" | "-q" => {
                if i + 1 < args.len() {
                    config.quality = match args[i + 1].as_str() {
                        "low" => QualityPreset::Low,
                        "medium" => QualityPreset::Medium,
                        "high" => QualityPreset::High,
                        "auto" => QualityPreset::Auto,
                        other => {
                            eprintln!("유효하지 않은 품질 '{other}', auto 사용");
                            QualityPreset::Auto
                        }
                    };
                    i += 1;
                }
            }
            "--timeout" => {
                if i + 1 < args.len() {
                    config.config.recv_timeout_ms = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--list" | "-l" => {
                config.list = true;
            }
            "--help" | "-h" => {
                println!(
                    r#"UVS Client - UDP Video Stream 클라이언트

적응형 청크 미디어 스트리밍 클라이언트
- 시퀀스 재정렬 후 연속 구간만 버퍼 파일에 기록
- 재생 임계값 도달 시 알림 (다운로드는 계속)

사용법:
  cargo run --release --bin uvs-client -- [OPTIONS]

옵션:
  -b, --bind <ADDR>        로컬 바인드 주소 (기본: 0.0.0.0:0 = 자동 할당)
  -s, --server <ADDR>      서버 주소 (기본: 127.0.0.1:9999)
  -o, --output-dir <DIR>   버퍼 파일 디렉토리 (기본: client_buffer)
  -f, --file <NAME>        스트리밍할 파일 이름
  -q, --quality <PRESET>   품질 프리셋: low|medium|high|auto (기본: auto)
  --timeout <MS>           수신 유휴 타임아웃 밀리초 (기본: 30000)
  -l, --list               파일 목록만 조회
  -h, --help               이 도움말 출력

예시:
  # 목록 조회 후 스트리밍
  cargo run --release --bin uvs-client -- -s 127.0.0.1:9999 --list
  cargo run --release --bin uvs-client -- -s 127.0.0.1:9999 -f clip.mp4 -q medium
"#
                );
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

/// 파일 목록 요청 및 출력
async fn list_files(socket: &UdpSocket, client_config: &ClientConfig) -> uvs::Result<()> {
    let request = ControlRequest::ListFiles.to_bytes()?;
    socket.send_to(&request, client_config.server_addr).await?;

    let mut buf = vec![0u8; 65535];
    let timeout = Duration::from_millis(client_config.config.recv_timeout_ms);
    let (len, _) = tokio::time::timeout(timeout, socket.recv_from(&mut buf))
        .await
        .map_err(|_| Error::SessionTimeout {
            idle_ms: client_config.config.recv_timeout_ms,
        })??;

    let packet = Packet::decode(&buf[..len])?;
    match packet.packet_type {
        PacketType::Info => {
            let response = FileListResponse::from_bytes(&packet.payload)?;
            info!("Available media files: {}", response.total_files);
            for (idx, entry) in response.files.iter().enumerate() {
                info!(
                    "  {:2}. {} - {} ({:.2} MB), chunk range [{}, {}]",
                    idx + 1,
                    entry.filename,
                    entry.quality,
                    entry.size_mb,
                    entry.chunk_range.0,
                    entry.chunk_range.1
                );
            }
            info!("Quality presets: {}", response.quality_presets.join(", "));
            Ok(())
        }
        PacketType::Error => {
            let response = ErrorResponse::from_bytes(&packet.payload)?;
            Err(Error::StreamError(response.message))
        }
        other => {
            warn!("예상치 못한 응답 타입: {:?}", other);
            Err(Error::ConnectionClosed)
        }
    }
}

/// 스트림 수신 루프
async fn stream_file(
    socket: &UdpSocket,
    client_config: &ClientConfig,
    filename: &str,
) -> uvs::Result<()> {
    std::fs::create_dir_all(&client_config.output_dir)?;
    let output_path = client_config.output_dir.join(filename);
    let sink = BufWriter::new(std::fs::File::create(&output_path)?);

    let mut buffer = ReceiveBuffer::new(sink, &client_config.config);

    let request = ControlRequest::StreamFile {
        filename: filename.to_string(),
        quality: client_config.quality,
    }
    .to_bytes()?;
    socket.send_to(&request, client_config.server_addr).await?;
    info!(
        "Requested stream: {} (quality: {:?})",
        filename, client_config.quality
    );

    let idle_timeout = Duration::from_millis(client_config.config.recv_timeout_ms);
    let mut datagram = vec![0u8; 65535];
    let mut last_progress = Instant::now();
    let mut stream_error: Option<Error> = None;

    loop {
        let received = tokio::time::timeout(idle_timeout, socket.recv_from(&mut datagram)).await;

        let (len, _) = match received {
            Ok(result) => result?,
            Err(_) => {
                // END 없는 유휴 타임아웃은 해당 세션에 치명적 (재시도 없음)
                warn!("수신 타임아웃: {}ms 동안 데이터 없음", idle_timeout.as_millis());
                stream_error = Some(Error::SessionTimeout {
                    idle_ms: client_config.config.recv_timeout_ms,
                });
                break;
            }
        };

        match buffer.on_datagram(&datagram[..len]) {
            ReceiverEvent::PlaybackThresholdCrossed => {
                // 플레이어 실행은 외부 협력자의 몫, 경로만 알린다
                info!(
                    "Playback ready: {} bytes buffered -> {:?}",
                    buffer.bytes_received(),
                    output_path
                );
            }
            ReceiverEvent::StreamComplete => {
                info!("Stream complete");
                break;
            }
            ReceiverEvent::ProtocolError(Error::StreamError(message)) => {
                // 서버가 보낸 ERROR 패킷: 세션 종료
                stream_error = Some(Error::StreamError(message));
                break;
            }
            ReceiverEvent::ProtocolError(e) => {
                // 패킷 단위 에러는 해당 데이터그램만 폐기
                warn!("패킷 폐기: {}", e);
            }
            ReceiverEvent::BufferedInOrder | ReceiverEvent::BufferedOutOfOrder => {}
        }

        if last_progress.elapsed() >= Duration::from_secs(2) {
            let stats = buffer.stats();
            info!(
                "Progress: {:.1}% | {} KB received | {:.1} KB/s",
                stats.progress_percent(),
                stats.bytes / 1024,
                stats.throughput_kbps()
            );
            last_progress = Instant::now();
        }
    }

    // 종료 경로와 무관하게 항상 최종 요약 출력
    let summary = buffer.finish()?;
    info!("Final summary: {}", summary.summary());
    if summary.is_clean() {
        info!("Clean completion: {:?}", output_path);
    } else {
        warn!("Partial transfer: {:?}", output_path);
    }

    match stream_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let client_config = parse_args();

    info!("UVS Client starting...");
    info!("Server address: {}", client_config.server_addr);

    let socket = UdpSocket::bind(client_config.bind_addr).await?;
    info!("Bound to local address: {}", socket.local_addr()?);

    if client_config.list {
        list_files(&socket, &client_config).await?;
        return Ok(());
    }

    let filename = match &client_config.file {
        Some(name) => name.clone(),
        None => {
            eprintln!("--file 또는 --list 옵션이 필요합니다 (--help 참고)");
            std::process::exit(1);
        }
    };

    stream_file(&socket, &client_config, &filename).await?;
    Ok(())
}
