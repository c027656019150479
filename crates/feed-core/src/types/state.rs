//! 스트리밍 연결 상태.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 관리되는 연결 하나의 현재 상태.
///
/// 상태 전이는 연결 수명주기 상태 머신만 수행하며, 다른 컴포넌트는 읽기만 합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// 연결 없음 (초기 상태 또는 의도적 중지 후)
    #[default]
    Disconnected,
    /// 연결 시도 중
    Connecting,
    /// 연결됨
    Connected,
    /// 에러 발생 (재연결 한도 소진 시 종료 상태)
    Error,
}

impl ConnectionState {
    /// 연결이 진행 중이거나 열려 있는지 확인합니다.
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        };
        write!(f, "{}", s)
    }
}
