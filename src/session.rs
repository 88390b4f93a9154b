//! 세션 레지스트리 (서버측)
//!
//! 클라이언트 주소 -> 활성 송신 세션 매핑. 여러 송신 태스크가 동시에
//! 접근하는 유일한 공유 구조이며, DashMap 샤드 락으로 직렬화된다.
//!
//! 중복 요청 정책: **cancel-and-restart**. 같은 주소에서 세션이 살아있는
//! 상태로 새 스트림 요청이 오면 이전 세션을 취소한 뒤 새 세션을 등록한다.
//! 두 송신자가 한 클라이언트에 섞여 쓰는 일은 없다.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// 활성 세션 핸들
#[derive(Debug)]
pub struct SessionHandle {
    /// 취소 플래그 (송신 루프가 매 반복 확인)
    cancel: Arc<AtomicBool>,

    /// 송신 태스크
    task: JoinHandle<()>,

    /// 세션 시작 시간
    pub started_at: Instant,
}

impl SessionHandle {
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// 세션 레지스트리
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SocketAddr, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// 새 세션용 취소 플래그 발급
    pub fn new_cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    /// 세션 등록
    ///
    /// 같은 주소의 기존 세션이 있으면 취소 후 교체한다 (cancel-and-restart).
    pub fn begin(&self, addr: SocketAddr, cancel: Arc<AtomicBool>, task: JoinHandle<()>) {
        let handle = SessionHandle {
            cancel,
            task,
            started_at: Instant::now(),
        };

        if let Some(previous) = self.sessions.insert(addr, handle) {
            info!("기존 세션 취소 후 재시작: {}", addr);
            previous.cancel();
        } else {
            debug!("세션 등록: {}", addr);
        }
    }

    /// 활성 세션 조회
    pub fn lookup(&self, addr: &SocketAddr) -> bool {
        self.sessions
            .get(addr)
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// 세션 제거 (취소하지 않음, 완료된 세션 정리용)
    pub fn remove(&self, addr: &SocketAddr) {
        if self.sessions.remove(addr).is_some() {
            debug!("세션 제거: {}", addr);
        }
    }

    /// 특정 세션 취소
    pub fn cancel(&self, addr: &SocketAddr) {
        if let Some((_, handle)) = self.sessions.remove(addr) {
            info!("세션 취소: {}", addr);
            handle.cancel();
        }
    }

    /// 전체 종료 (서버 셧다운)
    pub fn shutdown(&self) {
        for entry in self.sessions.iter() {
            entry.value().cancel();
        }
        self.sessions.clear();
    }

    /// 활성 세션 수 (완료된 태스크 제외)
    pub fn active_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|e| !e.value().is_finished())
            .count()
    }
}
