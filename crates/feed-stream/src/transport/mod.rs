//! 스트리밍 전송 어댑터.
//!
//! 연결 하나의 네 가지 수명주기 이벤트(open, message, error, close)를
//! [`TransportEvent`]로 변환해 호출자가 넘긴 채널로 전달합니다.
//! 재시도 로직은 없으며 그것은 [`crate::lifecycle`]의 역할입니다.
//!
//! # 이벤트 순서
//!
//! ```text
//! Opened → (Message)* → (Error)? → Closed
//! ```
//!
//! `Error`는 실패한 연결 시도당 정확히 한 번 보고되며 항상 `Closed`가 뒤따릅니다.

mod websocket;

pub use websocket::WebSocketTransport;

use feed_core::FeedResult;
use tokio::sync::mpsc;

/// 연결 핸들의 준비 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    /// 연결 시도 중
    Connecting = 0,
    /// 완전히 열림 (송신 가능)
    Open = 1,
    /// 정상 종료 요청됨
    Closing = 2,
    /// 닫힘
    Closed = 3,
}

impl ReadyState {
    /// `repr(u8)` 값에서 변환합니다. 알 수 없는 값은 `Closed`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// 전송 계층 이벤트.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    /// 이벤트를 발생시킨 연결의 세대 번호
    pub generation: u64,
    pub kind: TransportEventKind,
}

/// 전송 계층 이벤트 종류.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    /// 연결 열림
    Opened,
    /// 텍스트 프레임 수신
    Message(String),
    /// 전송 에러 (항상 `Closed`가 뒤따름)
    Error(String),
    /// 연결 닫힘
    Closed {
        /// close 프레임 코드 (있을 때만)
        code: Option<u16>,
        reason: String,
    },
}

/// 스트리밍 연결을 여는 팩토리.
pub trait Transport: Send + Sync + 'static {
    /// 즉시 연결을 시작하고 `Connecting` 상태의 핸들을 반환합니다 (연결 요청을 대기열에 넣지 않음).
    ///
    /// 이후 수명주기 이벤트는 `generation`을 달고 `events`로 전달됩니다.
    /// 핸들 자체를 만들 수 없으면(잘못된 URL 등) `FeedError::ConnectFailed`를 반환하며,
    /// 이 경우 이벤트는 전달되지 않습니다. tokio 런타임 안에서 호출해야 합니다.
    fn open(
        &self,
        url: &str,
        generation: u64,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> FeedResult<Box<dyn Connection>>;
}

/// 열린(또는 여는 중인) 연결 하나에 대한 핸들.
pub trait Connection: Send {
    /// 현재 준비 상태.
    fn ready_state(&self) -> ReadyState;

    /// 완전히 열린 상태인지 확인합니다.
    fn is_ready(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }

    /// 열린 상태일 때만 전송합니다.
    ///
    /// 그렇지 않으면 경고 로그만 남기고 아무것도 하지 않습니다 (대기열에 넣지 않음).
    fn send(&self, payload: &str);

    /// 정상 종료 코드로 종료를 요청합니다. 이미 닫혔거나 닫히는 중이면 무시합니다.
    fn close(&self);
}
