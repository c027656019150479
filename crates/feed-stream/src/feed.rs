//! 피드 런타임과 소비자 핸들.
//!
//! 피드 하나당 tokio 태스크 하나가 [`Lifecycle`], 현재 연결, 재연결 타이머,
//! 구독 동기화기를 소유합니다. 소비자는 [`FeedHandle`]로 명령을 보내고
//! watch 채널로 상태, 최신 데이터, 에러를 관찰합니다.
//!
//! # 사용 예
//!
//! ```ignore
//! let endpoints = StreamEndpoints::from_api(&config.api);
//! let quotes = QuotesFeed::spawn(
//!     endpoints.quotes,
//!     ["AAPL", "MSFT"],
//!     FeedOptions::default(),
//!     Arc::new(WebSocketTransport::new()),
//! );
//!
//! let mut data = quotes.subscribe_data();
//! while data.changed().await.is_ok() {
//!     if let Some(quotes) = data.borrow().as_ref() {
//!         println!("{} quotes", quotes.len());
//!     }
//! }
//! ```

use std::fmt;
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;

use feed_core::{ConnectionState, FeedError, FeedResult, MoversData, QuotesData};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, info, warn, Instrument};

use crate::codec::{parse_movers, parse_quotes};
use crate::lifecycle::{Action, Event, Lifecycle, ReconnectPolicy};
use crate::subscription::{SubscriptionSet, SubscriptionSync};
use crate::transport::{Connection, Transport, TransportEvent, TransportEventKind};

/// 에러 콜백. 에러가 보고될 때마다 피드 태스크에서 호출됩니다.
pub type ErrorCallback = Arc<dyn Fn(&FeedError) + Send + Sync>;

/// 피드 종류.
///
/// 수신 프레임을 어떤 레코드로 디코딩할지 정합니다.
pub trait FeedKind: Send + Sync + 'static {
    /// 디코딩된 레코드 타입
    type Data: Clone + fmt::Debug + Send + Sync + 'static;

    /// 로그에 쓰이는 피드 이름
    const NAME: &'static str;

    /// 텍스트 프레임을 디코딩합니다. 잘못된 프레임이면 `None`.
    fn decode(raw: &str) -> Option<Self::Data>;
}

/// 종목별 실시간 시세 피드.
#[derive(Debug, Clone, Copy)]
pub struct QuotesFeed;

impl FeedKind for QuotesFeed {
    type Data = QuotesData;
    const NAME: &'static str = "quotes";

    fn decode(raw: &str) -> Option<Self::Data> {
        parse_quotes(raw)
    }
}

/// 상승/하락/거래량 상위 종목 피드.
#[derive(Debug, Clone, Copy)]
pub struct MoversFeed;

impl FeedKind for MoversFeed {
    type Data = MoversData;
    const NAME: &'static str = "movers";

    fn decode(raw: &str) -> Option<Self::Data> {
        parse_movers(raw)
    }
}

/// 피드 생성 옵션.
#[derive(Clone)]
pub struct FeedOptions {
    /// 생성 직후 연결할지 여부
    pub enabled: bool,
    /// 재연결 정책
    pub policy: ReconnectPolicy,
    /// 에러 콜백
    pub on_error: Option<ErrorCallback>,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            policy: ReconnectPolicy::default(),
            on_error: None,
        }
    }
}

impl fmt::Debug for FeedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedOptions")
            .field("enabled", &self.enabled)
            .field("policy", &self.policy)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl FeedOptions {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 에러 콜백을 설정합니다.
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&FeedError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

/// 핸들에서 피드 태스크로 보내는 명령.
#[derive(Debug)]
enum Command {
    SetEnabled(bool),
    SetSymbols(Vec<String>),
    SendSymbols(Vec<String>),
    Reconnect,
    Shutdown,
}

/// 실행 중인 피드에 대한 소비자 핸들.
///
/// 핸들이 버려지면 피드 태스크가 연결을 닫고 종료합니다.
pub struct FeedHandle<K: FeedKind> {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    data: watch::Receiver<Option<K::Data>>,
    error: watch::Receiver<Option<FeedError>>,
    task: JoinHandle<()>,
}

/// 시세 피드 핸들.
pub type QuotesHandle = FeedHandle<QuotesFeed>;

/// 상위 종목 피드 핸들.
pub type MoversHandle = FeedHandle<MoversFeed>;

impl<K: FeedKind> fmt::Debug for FeedHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedHandle")
            .field("feed", &K::NAME)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl<K: FeedKind> FeedHandle<K> {
    /// 현재 연결 상태.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// 마지막으로 성공적으로 디코딩된 레코드. 아직 없으면 `None`.
    pub fn data(&self) -> Option<K::Data> {
        self.data.borrow().clone()
    }

    /// 마지막으로 보고된 에러.
    pub fn error(&self) -> Option<FeedError> {
        self.error.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn subscribe_data(&self) -> watch::Receiver<Option<K::Data>> {
        self.data.clone()
    }

    pub fn subscribe_error(&self) -> watch::Receiver<Option<FeedError>> {
        self.error.clone()
    }

    /// 피드를 활성화/비활성화합니다.
    ///
    /// 비활성화하면 대기 중인 재연결을 취소하고 연결을 닫으며 재연결하지 않습니다.
    pub fn set_enabled(&self, enabled: bool) -> FeedResult<()> {
        self.send(Command::SetEnabled(enabled))
    }

    /// 피드를 활성화합니다. 이미 연결 중이거나 연결돼 있으면 아무것도 하지 않습니다.
    pub fn start(&self) -> FeedResult<()> {
        self.set_enabled(true)
    }

    /// 피드를 비활성화합니다. 여러 번 호출해도 안전합니다.
    pub fn stop(&self) -> FeedResult<()> {
        self.set_enabled(false)
    }

    /// 재연결 카운터를 초기화하고 즉시 새 연결을 엽니다.
    ///
    /// 종료 에러 상태에서 복구하는 유일한 방법입니다. 비활성 상태면 카운터만 초기화합니다.
    pub fn reconnect(&self) -> FeedResult<()> {
        self.send(Command::Reconnect)
    }

    /// 연결을 닫고 피드 태스크가 끝날 때까지 기다립니다.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Err(e) = self.task.await {
            warn!(feed = K::NAME, error = %e, "Feed task ended abnormally");
        }
    }

    fn send(&self, command: Command) -> FeedResult<()> {
        self.commands
            .send(command)
            .map_err(|_| FeedError::ChannelClosed)
    }
}

impl QuotesFeed {
    /// 시세 피드를 시작합니다.
    ///
    /// 정규화된 심볼 집합이 비어 있으면 `enabled`와 관계없이 연결하지 않습니다.
    pub fn spawn<I, S>(
        url: impl Into<String>,
        symbols: I,
        options: FeedOptions,
        transport: Arc<dyn Transport>,
    ) -> QuotesHandle
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        spawn_feed(url.into(), Some(SubscriptionSync::new(symbols)), options, transport)
    }
}

impl MoversFeed {
    /// 상위 종목 피드를 시작합니다. 구독 메시지 없이 서버가 주기적으로 보내는 스냅샷을 받습니다.
    pub fn spawn(
        url: impl Into<String>,
        options: FeedOptions,
        transport: Arc<dyn Transport>,
    ) -> MoversHandle {
        spawn_feed(url.into(), None, options, transport)
    }
}

impl FeedHandle<QuotesFeed> {
    /// 구독 심볼 목록을 바꿉니다.
    ///
    /// 정규화된 집합이 바뀌었고 연결된 상태면 새 집합을 즉시 전송합니다.
    /// 집합이 비면 연결을 닫습니다.
    pub fn set_symbols<I, S>(&self, symbols: I) -> FeedResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let symbols = symbols
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        self.send(Command::SetSymbols(symbols))
    }

    /// 연결이 열려 있으면 주어진 심볼을 즉시 전송합니다.
    ///
    /// 추적 중인 구독 집합은 바뀌지 않으며, 열려 있지 않으면 경고 로그만 남깁니다.
    pub fn send_symbols<I, S>(&self, symbols: I) -> FeedResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let symbols = symbols
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        self.send(Command::SendSymbols(symbols))
    }
}

impl FeedHandle<MoversFeed> {
    /// 첫 스냅샷을 기다리며 연결 중인지 확인합니다.
    pub fn is_initial_loading(&self) -> bool {
        self.state() == ConnectionState::Connecting && self.data.borrow().is_none()
    }
}

fn spawn_feed<K: FeedKind>(
    url: String,
    subscription: Option<SubscriptionSync>,
    options: FeedOptions,
    transport: Arc<dyn Transport>,
) -> FeedHandle<K> {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
    let (data_tx, data_rx) = watch::channel(None);
    let (error_tx, error_rx) = watch::channel(None);

    let span = feed_core::feed_span!(K::NAME, url);
    let runner = FeedRunner::<K> {
        url,
        lifecycle: Lifecycle::new(options.policy),
        transport,
        connection: None,
        retry: None,
        subscription,
        user_enabled: options.enabled,
        on_error: options.on_error,
        commands: commands_rx,
        events_tx,
        events_rx,
        state_tx,
        data_tx,
        error_tx,
    };
    let task = tokio::spawn(runner.run().instrument(span));

    FeedHandle {
        commands: commands_tx,
        state: state_rx,
        data: data_rx,
        error: error_rx,
        task,
    }
}

/// 피드 태스크 상태.
struct FeedRunner<K: FeedKind> {
    url: String,
    lifecycle: Lifecycle,
    transport: Arc<dyn Transport>,
    connection: Option<Box<dyn Connection>>,
    retry: Option<Pin<Box<Sleep>>>,
    subscription: Option<SubscriptionSync>,
    user_enabled: bool,
    on_error: Option<ErrorCallback>,
    commands: mpsc::UnboundedReceiver<Command>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    state_tx: watch::Sender<ConnectionState>,
    data_tx: watch::Sender<Option<K::Data>>,
    error_tx: watch::Sender<Option<FeedError>>,
}

impl<K: FeedKind> FeedRunner<K> {
    async fn run(mut self) {
        info!(policy = ?self.lifecycle.policy(), "Feed task started");
        self.sync_enabled();

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
                Some(event) = self.events_rx.recv() => self.on_transport_event(event),
                _ = wait_retry(&mut self.retry) => {
                    self.retry = None;
                    self.dispatch(Event::RetryElapsed);
                }
            }
        }

        self.dispatch(Event::SetEnabled(false));
        info!("Feed task finished");
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::SetEnabled(enabled) => {
                self.user_enabled = enabled;
                self.sync_enabled();
            }
            Command::SetSymbols(symbols) => self.update_symbols(symbols),
            Command::SendSymbols(symbols) => self.push_symbols(symbols),
            Command::Reconnect => self.dispatch(Event::Reconnect),
            Command::Shutdown => {}
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        let TransportEvent { generation, kind } = event;
        if !self.lifecycle.is_current(generation) {
            debug!(generation, "Dropping event from superseded connection");
            return;
        }

        let event = match kind {
            TransportEventKind::Opened => Event::Opened { generation },
            TransportEventKind::Message(raw) => match K::decode(&raw) {
                Some(data) => {
                    self.data_tx.send_replace(Some(data));
                    Event::MessageAccepted { generation }
                }
                None => {
                    debug!(generation, len = raw.len(), "Dropping malformed frame");
                    return;
                }
            },
            TransportEventKind::Error(reason) => Event::TransportError { generation, reason },
            TransportEventKind::Closed { code, reason } => {
                debug!(generation, ?code, reason = %reason, "Connection closed");
                self.connection = None;
                Event::Closed { generation }
            }
        };
        self.dispatch(event);
    }

    /// 구독 집합이 비어 있는 시세 피드는 비활성 피드처럼 동작합니다.
    fn wants_connection(&self) -> bool {
        self.user_enabled
            && self
                .subscription
                .as_ref()
                .map_or(true, |sync| sync.message().is_some())
    }

    fn sync_enabled(&mut self) {
        let wanted = self.wants_connection();
        if wanted != self.lifecycle.is_enabled() {
            self.dispatch(Event::SetEnabled(wanted));
        }
    }

    fn update_symbols(&mut self, symbols: Vec<String>) {
        let Some(sync) = self.subscription.as_mut() else {
            warn!("Symbol updates are not supported by this feed");
            return;
        };
        if !sync.update(&symbols) {
            return;
        }
        info!(
            symbols = sync.message().unwrap_or_default(),
            "Subscription changed"
        );

        if self.lifecycle.state() == ConnectionState::Connected {
            self.send_subscription();
        }
        self.sync_enabled();
    }

    fn push_symbols(&self, symbols: Vec<String>) {
        let set = SubscriptionSet::normalize(&symbols);
        match &self.connection {
            Some(connection) if connection.is_ready() => {
                debug!(symbols = %set.to_wire(), "Sending symbols");
                connection.send(&set.to_wire());
            }
            _ => warn!("WebSocket is not connected. Cannot send symbols."),
        }
    }

    fn send_subscription(&self) {
        let Some(message) = self.subscription.as_ref().and_then(|sync| sync.message()) else {
            return;
        };
        match &self.connection {
            Some(connection) if connection.is_ready() => {
                debug!(symbols = message, "Sending subscription");
                connection.send(message);
            }
            _ => warn!("WebSocket is not connected. Cannot send subscription."),
        }
    }

    fn dispatch(&mut self, event: Event) {
        let actions = self.lifecycle.handle(event);
        self.apply(actions);
    }

    fn apply(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Open { generation } => self.open(generation),
                Action::Close { generation } => {
                    if let Some(connection) = self.connection.take() {
                        debug!(generation, "Closing connection");
                        connection.close();
                    }
                }
                Action::ScheduleRetry { delay, attempt } => {
                    debug!(attempt, delay_ms = delay.as_millis() as u64, "Retry scheduled");
                    self.retry = Some(Box::pin(tokio::time::sleep(delay)));
                }
                Action::CancelRetry => self.retry = None,
                Action::SendSubscription => self.send_subscription(),
                Action::ReportError(error) => self.report_error(error),
                Action::ClearError => {
                    self.error_tx.send_replace(None);
                }
            }
        }

        let state = self.lifecycle.state();
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    fn open(&mut self, generation: u64) {
        info!(
            generation,
            attempt = self.lifecycle.reconnect_attempts(),
            "Connecting"
        );
        match self
            .transport
            .open(&self.url, generation, self.events_tx.clone())
        {
            Ok(connection) => self.connection = Some(connection),
            Err(e) => {
                let reason = match e {
                    FeedError::ConnectFailed(reason) => reason,
                    other => other.to_string(),
                };
                self.dispatch(Event::OpenFailed { generation, reason });
            }
        }
    }

    fn report_error(&self, error: FeedError) {
        warn!(
            error = %error,
            terminal = error.is_terminal(),
            retryable = error.is_retryable(),
            "Feed error"
        );
        if let Some(callback) = &self.on_error {
            callback(&error);
        }
        self.error_tx.send_replace(Some(error));
    }
}

/// 재연결 타이머가 만료될 때까지 기다립니다. 타이머가 없으면 영원히 대기합니다.
async fn wait_retry(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}
