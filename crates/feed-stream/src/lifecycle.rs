//! 연결 수명주기 상태 머신.
//!
//! IO가 없는 동기 상태 머신으로, [`Event`]를 받아 수행할 [`Action`] 목록을 돌려줍니다.
//! 소켓, 타이머, 채널은 [`crate::feed`] 런타임이 소유하고 액션을 실행합니다.
//!
//! # 상태 전이
//!
//! ```text
//! Disconnected ──[start]──> Connecting ──[open]──> Connected
//!      ↑                        │                      │
//!      │                     [error]                [error]
//!      │                        ↓                      ↓
//!      └─────────[close]──── Error(중간) <─────────────┘
//!      │
//!      ├──[시도 < 한도]──> 고정 간격 후 재연결 (Connecting)
//!      └──[시도 = 한도]──> Error (종료, reconnect 전까지)
//! ```
//!
//! # 재연결 카운터
//!
//! - 비자발적 close마다 1 증가
//! - 연결 열림, 성공적으로 파싱된 메시지, 수동 reconnect 시 0으로 초기화
//!
//! # 세대 번호
//!
//! 연결을 열 때마다 세대 번호가 증가합니다. 현재 세대가 아닌 이벤트는 무시되므로
//! 교체된 핸들의 close 이벤트가 재연결을 예약하거나 상태를 바꾸지 않습니다.

use feed_core::{ConnectionState, FeedError, StreamConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 기본 재연결 간격.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(5000);

/// 기본 최대 재연결 시도 횟수.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// 고정 간격 재연결 정책 (지수 백오프 아님).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// 재연결 간격
    pub interval: Duration,
    /// 최대 재연결 시도 횟수
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RECONNECT_INTERVAL,
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

impl From<&StreamConfig> for ReconnectPolicy {
    fn from(config: &StreamConfig) -> Self {
        Self {
            interval: config.reconnect_interval(),
            max_attempts: config.max_reconnect_attempts,
        }
    }
}

/// 상태 머신 입력 이벤트.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// 피드 활성화 여부 변경 (true: start, false: stop)
    SetEnabled(bool),
    /// 소비자의 수동 재연결 요청
    Reconnect,
    /// 예약된 재연결 타이머 만료
    RetryElapsed,
    /// 연결 핸들 생성 자체가 실패함 (재시도하지 않음)
    OpenFailed { generation: u64, reason: String },
    /// 전송 계층 open
    Opened { generation: u64 },
    /// 메시지가 성공적으로 파싱됨
    MessageAccepted { generation: u64 },
    /// 전송 계층 error
    TransportError { generation: u64, reason: String },
    /// 전송 계층 close
    Closed { generation: u64 },
}

/// 런타임이 수행할 액션.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// 새 연결 열기
    Open { generation: u64 },
    /// 연결 닫기
    Close { generation: u64 },
    /// 고정 간격 후 재연결 예약
    ScheduleRetry { delay: Duration, attempt: u32 },
    /// 대기 중인 재연결 타이머 취소
    CancelRetry,
    /// 현재 구독 집합 전송 (시세 피드만 해당)
    SendSubscription,
    /// 소비자에게 에러 전달
    ReportError(FeedError),
    /// 소비자에게 노출된 에러 초기화
    ClearError,
}

/// 연결 수명주기 상태 머신.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    policy: ReconnectPolicy,
    state: ConnectionState,
    enabled: bool,
    manual_close: bool,
    attempts: u32,
    generation: u64,
    active: Option<u64>,
    retry_pending: bool,
}

impl Lifecycle {
    /// 비활성 상태(`Disconnected`)의 상태 머신을 생성합니다.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            enabled: false,
            manual_close: false,
            attempts: 0,
            generation: 0,
            active: None,
            retry_pending: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// 현재 재연결 카운터.
    pub fn reconnect_attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 재연결 타이머가 대기 중인지 확인합니다.
    pub fn retry_pending(&self) -> bool {
        self.retry_pending
    }

    /// 현재 소유한 연결의 세대 번호.
    pub fn active_generation(&self) -> Option<u64> {
        self.active
    }

    /// 이벤트의 세대가 현재 연결인지 확인합니다.
    pub fn is_current(&self, generation: u64) -> bool {
        self.active == Some(generation)
    }

    /// 이벤트를 처리하고 수행할 액션을 반환합니다.
    pub fn handle(&mut self, event: Event) -> Vec<Action> {
        let mut actions = Vec::new();

        match event {
            Event::SetEnabled(true) => {
                self.enabled = true;
                self.start(&mut actions);
            }
            Event::SetEnabled(false) => {
                self.enabled = false;
                self.stop(&mut actions);
            }
            Event::Reconnect => self.reconnect(&mut actions),
            Event::RetryElapsed => self.retry_elapsed(&mut actions),
            Event::OpenFailed { generation, reason } => {
                self.on_open_failed(generation, reason, &mut actions)
            }
            Event::Opened { generation } => self.on_open(generation, &mut actions),
            Event::MessageAccepted { generation } => self.on_message(generation),
            Event::TransportError { generation, reason } => {
                self.on_error(generation, reason, &mut actions)
            }
            Event::Closed { generation } => self.on_close(generation, &mut actions),
        }

        actions
    }

    /// 이미 연결 중/연결됨이거나 비활성화 상태면 아무것도 하지 않습니다.
    fn start(&mut self, actions: &mut Vec<Action>) {
        if !self.enabled {
            return;
        }
        if self.active.is_some() && self.state.is_active() {
            return;
        }
        self.manual_close = false;
        self.open(actions);
    }

    /// 수동 종료 플래그를 세우고 타이머와 연결을 정리합니다. 재연결을 일으키지 않습니다.
    fn stop(&mut self, actions: &mut Vec<Action>) {
        self.manual_close = true;
        self.cancel_retry(actions);
        if let Some(generation) = self.active.take() {
            actions.push(Action::Close { generation });
        }
        if self.state != ConnectionState::Disconnected {
            info!(state = %self.state, "Feed stopped");
        }
        self.state = ConnectionState::Disconnected;
    }

    fn reconnect(&mut self, actions: &mut Vec<Action>) {
        self.manual_close = false;
        self.attempts = 0;
        if !self.enabled {
            // 비활성 상태에서는 카운터만 초기화하고 연결하지 않음
            self.cancel_retry(actions);
            return;
        }
        info!("Manual reconnect requested");
        self.open(actions);
    }

    fn retry_elapsed(&mut self, actions: &mut Vec<Action>) {
        if !self.retry_pending {
            return;
        }
        self.retry_pending = false;
        if self.manual_close || !self.enabled {
            return;
        }
        debug!(attempt = self.attempts, "Reconnect timer elapsed");
        self.open(actions);
    }

    /// 대기 중인 타이머를 취소하고 기존 핸들을 정리한 뒤 새 연결을 엽니다.
    fn open(&mut self, actions: &mut Vec<Action>) {
        self.cancel_retry(actions);
        if let Some(generation) = self.active.take() {
            actions.push(Action::Close { generation });
        }

        self.generation += 1;
        self.active = Some(self.generation);
        self.state = ConnectionState::Connecting;

        actions.push(Action::ClearError);
        actions.push(Action::Open {
            generation: self.generation,
        });
    }

    fn on_open_failed(&mut self, generation: u64, reason: String, actions: &mut Vec<Action>) {
        if !self.accept(generation, "open failure") {
            return;
        }
        error!(generation, reason = %reason, "Failed to create WebSocket connection");
        self.active = None;
        self.state = ConnectionState::Error;
        actions.push(Action::ReportError(FeedError::ConnectFailed(reason)));
    }

    fn on_open(&mut self, generation: u64, actions: &mut Vec<Action>) {
        if !self.accept(generation, "open") {
            return;
        }
        self.state = ConnectionState::Connected;
        self.attempts = 0;
        actions.push(Action::SendSubscription);
    }

    fn on_message(&mut self, generation: u64) {
        if !self.accept(generation, "message") {
            return;
        }
        self.state = ConnectionState::Connected;
        self.attempts = 0;
    }

    fn on_error(&mut self, generation: u64, reason: String, actions: &mut Vec<Action>) {
        if !self.accept(generation, "error") {
            return;
        }
        self.state = ConnectionState::Error;
        actions.push(Action::ReportError(FeedError::Transport(reason)));
    }

    fn on_close(&mut self, generation: u64, actions: &mut Vec<Action>) {
        if !self.accept(generation, "close") {
            return;
        }
        self.active = None;
        self.state = ConnectionState::Disconnected;

        if self.manual_close {
            return;
        }

        if self.attempts < self.policy.max_attempts {
            self.attempts += 1;
            self.retry_pending = true;
            warn!(
                attempt = self.attempts,
                max_attempts = self.policy.max_attempts,
                delay_ms = self.policy.interval.as_millis() as u64,
                "Connection closed, scheduling reconnect"
            );
            actions.push(Action::ScheduleRetry {
                delay: self.policy.interval,
                attempt: self.attempts,
            });
        } else {
            error!(
                max_attempts = self.policy.max_attempts,
                "Max reconnection attempts reached"
            );
            self.state = ConnectionState::Error;
            actions.push(Action::ReportError(FeedError::MaxReconnectAttempts(
                self.policy.max_attempts,
            )));
        }
    }

    fn cancel_retry(&mut self, actions: &mut Vec<Action>) {
        if self.retry_pending {
            self.retry_pending = false;
            actions.push(Action::CancelRetry);
        }
    }

    fn accept(&self, generation: u64, kind: &str) -> bool {
        if self.is_current(generation) {
            true
        } else {
            debug!(
                generation,
                active = ?self.active,
                kind,
                "Ignoring event from superseded connection"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy::new(Duration::from_millis(5000), max_attempts)
    }

    fn opened(lifecycle: &mut Lifecycle) -> u64 {
        let actions = lifecycle.handle(Event::SetEnabled(true));
        match actions.last() {
            Some(Action::Open { generation }) => *generation,
            other => panic!("expected open, got {:?}", other),
        }
    }

    /// 현재 연결을 비자발적으로 닫고, 재연결이 예약되면 타이머를 만료시켜 새 세대를 반환.
    fn fail_once(lifecycle: &mut Lifecycle, generation: u64) -> (Vec<Action>, Option<u64>) {
        let actions = lifecycle.handle(Event::Closed { generation });
        if actions
            .iter()
            .any(|a| matches!(a, Action::ScheduleRetry { .. }))
        {
            let retry = lifecycle.handle(Event::RetryElapsed);
            let next = retry.iter().find_map(|a| match a {
                Action::Open { generation } => Some(*generation),
                _ => None,
            });
            (actions, next)
        } else {
            (actions, None)
        }
    }

    #[test]
    fn test_start_opens_connection() {
        let mut lifecycle = Lifecycle::new(ReconnectPolicy::default());
        let actions = lifecycle.handle(Event::SetEnabled(true));

        assert_eq!(
            actions,
            vec![Action::ClearError, Action::Open { generation: 1 }]
        );
        assert_eq!(lifecycle.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_start_is_noop_when_active() {
        let mut lifecycle = Lifecycle::new(ReconnectPolicy::default());
        let generation = opened(&mut lifecycle);

        assert!(lifecycle.handle(Event::SetEnabled(true)).is_empty());

        lifecycle.handle(Event::Opened { generation });
        assert!(lifecycle.handle(Event::SetEnabled(true)).is_empty());
        assert_eq!(lifecycle.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_open_sends_subscription_and_resets_counter() {
        let mut lifecycle = Lifecycle::new(policy(10));
        let first = opened(&mut lifecycle);
        let (_, second) = fail_once(&mut lifecycle, first);
        assert_eq!(lifecycle.reconnect_attempts(), 1);

        let actions = lifecycle.handle(Event::Opened {
            generation: second.unwrap(),
        });
        assert_eq!(actions, vec![Action::SendSubscription]);
        assert_eq!(lifecycle.state(), ConnectionState::Connected);
        assert_eq!(lifecycle.reconnect_attempts(), 0);
    }

    #[test]
    fn test_remote_close_schedules_fixed_interval_retry() {
        let mut lifecycle = Lifecycle::new(policy(10));
        let generation = opened(&mut lifecycle);
        lifecycle.handle(Event::Opened { generation });

        let actions = lifecycle.handle(Event::Closed { generation });
        assert_eq!(
            actions,
            vec![Action::ScheduleRetry {
                delay: Duration::from_millis(5000),
                attempt: 1
            }]
        );
        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);
        assert!(lifecycle.retry_pending());
    }

    #[test]
    fn test_error_then_close() {
        let mut lifecycle = Lifecycle::new(policy(10));
        let generation = opened(&mut lifecycle);

        let actions = lifecycle.handle(Event::TransportError {
            generation,
            reason: "connection refused".to_string(),
        });
        assert_eq!(
            actions,
            vec![Action::ReportError(FeedError::Transport(
                "connection refused".to_string()
            ))]
        );
        assert_eq!(lifecycle.state(), ConnectionState::Error);

        let actions = lifecycle.handle(Event::Closed { generation });
        assert!(matches!(actions[0], Action::ScheduleRetry { attempt: 1, .. }));
        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_n_closes_below_ceiling() {
        let mut lifecycle = Lifecycle::new(policy(10));
        let mut generation = opened(&mut lifecycle);
        let mut reconnects = 0;

        for n in 1..=7 {
            let (actions, next) = fail_once(&mut lifecycle, generation);
            assert_eq!(
                actions,
                vec![Action::ScheduleRetry {
                    delay: Duration::from_millis(5000),
                    attempt: n
                }]
            );
            generation = next.unwrap();
            reconnects += 1;
        }

        assert_eq!(reconnects, 7);
        assert_eq!(lifecycle.reconnect_attempts(), 7);
    }

    #[test]
    fn test_ceiling_reached_is_terminal() {
        let mut lifecycle = Lifecycle::new(policy(3));
        let mut generation = opened(&mut lifecycle);

        for _ in 0..3 {
            let (_, next) = fail_once(&mut lifecycle, generation);
            generation = next.unwrap();
        }
        assert_eq!(lifecycle.reconnect_attempts(), 3);

        let (actions, next) = fail_once(&mut lifecycle, generation);
        assert_eq!(
            actions,
            vec![Action::ReportError(FeedError::MaxReconnectAttempts(3))]
        );
        assert!(next.is_none());
        assert_eq!(lifecycle.state(), ConnectionState::Error);
        assert!(!lifecycle.retry_pending());

        // 종료 상태에서는 타이머 만료나 start가 와도 연결하지 않음
        assert!(lifecycle.handle(Event::RetryElapsed).is_empty());
    }

    #[test]
    fn test_manual_reconnect_recovers_from_terminal() {
        let mut lifecycle = Lifecycle::new(policy(1));
        let generation = opened(&mut lifecycle);
        let (_, next) = fail_once(&mut lifecycle, generation);
        fail_once(&mut lifecycle, next.unwrap());
        assert_eq!(lifecycle.state(), ConnectionState::Error);

        let actions = lifecycle.handle(Event::Reconnect);
        assert_eq!(
            actions,
            vec![Action::ClearError, Action::Open { generation: 3 }]
        );
        assert_eq!(lifecycle.reconnect_attempts(), 0);
        assert_eq!(lifecycle.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_message_resets_counter() {
        let mut lifecycle = Lifecycle::new(policy(10));
        let mut generation = opened(&mut lifecycle);
        for _ in 0..3 {
            let (_, next) = fail_once(&mut lifecycle, generation);
            generation = next.unwrap();
        }
        assert_eq!(lifecycle.reconnect_attempts(), 3);

        let actions = lifecycle.handle(Event::MessageAccepted { generation });
        assert!(actions.is_empty());
        assert_eq!(lifecycle.reconnect_attempts(), 0);
        assert_eq!(lifecycle.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_stop_cancels_pending_retry() {
        let mut lifecycle = Lifecycle::new(policy(10));
        let generation = opened(&mut lifecycle);
        lifecycle.handle(Event::Closed { generation });
        assert!(lifecycle.retry_pending());

        let actions = lifecycle.handle(Event::SetEnabled(false));
        assert_eq!(actions, vec![Action::CancelRetry]);
        assert!(!lifecycle.retry_pending());

        // 이미 만료된 타이머가 늦게 도착해도 연결하지 않음
        assert!(lifecycle.handle(Event::RetryElapsed).is_empty());
        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_stop_closes_active_without_reconnect() {
        let mut lifecycle = Lifecycle::new(policy(10));
        let generation = opened(&mut lifecycle);
        lifecycle.handle(Event::Opened { generation });

        let actions = lifecycle.handle(Event::SetEnabled(false));
        assert_eq!(actions, vec![Action::Close { generation }]);

        // 닫힌 핸들의 close 이벤트는 무시됨
        assert!(lifecycle.handle(Event::Closed { generation }).is_empty());
        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut lifecycle = Lifecycle::new(policy(10));
        opened(&mut lifecycle);

        assert_eq!(lifecycle.handle(Event::SetEnabled(false)).len(), 1);
        assert!(lifecycle.handle(Event::SetEnabled(false)).is_empty());
    }

    #[test]
    fn test_reconnect_bypasses_pending_timer() {
        let mut lifecycle = Lifecycle::new(policy(10));
        let generation = opened(&mut lifecycle);
        lifecycle.handle(Event::Closed { generation });

        let actions = lifecycle.handle(Event::Reconnect);
        assert_eq!(
            actions,
            vec![
                Action::CancelRetry,
                Action::ClearError,
                Action::Open { generation: 2 }
            ]
        );
        assert!(lifecycle.handle(Event::RetryElapsed).is_empty());
    }

    #[test]
    fn test_reconnect_replaces_open_connection() {
        let mut lifecycle = Lifecycle::new(policy(10));
        let generation = opened(&mut lifecycle);
        lifecycle.handle(Event::Opened { generation });

        let actions = lifecycle.handle(Event::Reconnect);
        assert_eq!(
            actions,
            vec![
                Action::Close { generation },
                Action::ClearError,
                Action::Open { generation: 2 }
            ]
        );

        // 교체된 연결의 close가 재연결을 예약하지 않음
        assert!(lifecycle.handle(Event::Closed { generation }).is_empty());
        assert_eq!(lifecycle.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_rapid_toggle_does_not_overlap() {
        let mut lifecycle = Lifecycle::new(policy(10));
        let first = opened(&mut lifecycle);

        let off = lifecycle.handle(Event::SetEnabled(false));
        assert_eq!(off, vec![Action::Close { generation: first }]);

        let on = lifecycle.handle(Event::SetEnabled(true));
        assert_eq!(on, vec![Action::ClearError, Action::Open { generation: 2 }]);
        assert_eq!(lifecycle.active_generation(), Some(2));

        // 첫 연결의 늦은 이벤트는 모두 무시됨
        assert!(lifecycle.handle(Event::Opened { generation: first }).is_empty());
        assert!(lifecycle
            .handle(Event::TransportError {
                generation: first,
                reason: "late".to_string()
            })
            .is_empty());
        assert!(lifecycle.handle(Event::Closed { generation: first }).is_empty());
        assert_eq!(lifecycle.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_open_failure_is_not_retried() {
        let mut lifecycle = Lifecycle::new(policy(10));
        let generation = opened(&mut lifecycle);

        let actions = lifecycle.handle(Event::OpenFailed {
            generation,
            reason: "unsupported URL scheme".to_string(),
        });
        assert_eq!(
            actions,
            vec![Action::ReportError(FeedError::ConnectFailed(
                "unsupported URL scheme".to_string()
            ))]
        );
        assert_eq!(lifecycle.state(), ConnectionState::Error);
        assert!(!lifecycle.retry_pending());
        assert_eq!(lifecycle.active_generation(), None);

        // 수동 reconnect로만 다시 시도함
        let actions = lifecycle.handle(Event::Reconnect);
        assert_eq!(actions.last(), Some(&Action::Open { generation: 2 }));
    }

    #[test]
    fn test_disabled_reconnect_only_resets() {
        let mut lifecycle = Lifecycle::new(policy(10));
        let actions = lifecycle.handle(Event::Reconnect);
        assert!(actions.is_empty());
        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_policy_from_stream_config() {
        let config = StreamConfig {
            reconnect_interval_ms: 250,
            max_reconnect_attempts: 4,
        };
        let policy = ReconnectPolicy::from(&config);
        assert_eq!(policy.interval, Duration::from_millis(250));
        assert_eq!(policy.max_attempts, 4);
    }
}
