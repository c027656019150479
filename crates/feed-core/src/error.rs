//! 피드 에러 타입.
//!
//! 모든 에러는 소비자에게 `error` 필드 또는 `on_error` 콜백으로 전달되며,
//! 공개 작업(`start`, `stop`, `send`, `reconnect`)에서 동기적으로 던져지지 않습니다.

use thiserror::Error;

/// 피드 에러.
///
/// watch 채널과 콜백으로 전달되어야 하므로 `Clone`을 구현합니다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// 전송 계층 에러 (연결 시도 1회당 한 번 보고되며, 항상 close가 뒤따름)
    #[error("WebSocket error occurred: {0}")]
    Transport(String),

    /// 전송 핸들 생성 자체가 실패함
    #[error("Failed to create WebSocket connection: {0}")]
    ConnectFailed(String),

    /// 재연결 한도 소진 (명시적 reconnect 전까지 종료 상태)
    #[error("Max reconnection attempts reached ({0})")]
    MaxReconnectAttempts(u32),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),

    /// 수신 프레임 파싱 에러 (로컬에서 복구되며 소비자에게 노출되지 않음)
    #[error("Parse error: {0}")]
    Parse(String),

    /// 피드 태스크가 이미 종료됨
    #[error("Feed task is no longer running")]
    ChannelClosed,
}

/// 피드 작업을 위한 Result 타입.
pub type FeedResult<T> = Result<T, FeedError>;

impl FeedError {
    /// 재연결 정책이 계속 재시도하는 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FeedError::Transport(_))
    }

    /// 명시적인 reconnect 호출이 있어야 복구되는 종료 에러인지 확인합니다.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FeedError::MaxReconnectAttempts(_))
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Parse(err.to_string())
    }
}

impl From<config::ConfigError> for FeedError {
    fn from(err: config::ConfigError) -> Self {
        FeedError::Config(err.to_string())
    }
}
