//! tokio-tungstenite 기반 WebSocket 전송.
//!
//! 연결마다 태스크 하나를 띄워 소켓을 소유하고, 핸들은 송신 채널과 준비 상태만 가집니다.

use feed_core::{FeedError, FeedResult};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{Connection, ReadyState, Transport, TransportEvent, TransportEventKind};

/// 정상 종료 시 보내는 close 사유.
const CLOSE_REASON: &str = "Client closing connection";

/// close 핸드셰이크 응답 대기 시간.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// WebSocket 전송 팩토리.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WebSocketTransport {
    fn open(
        &self,
        url: &str,
        generation: u64,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> FeedResult<Box<dyn Connection>> {
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(FeedError::ConnectFailed(format!(
                "unsupported URL scheme: {}",
                url
            )));
        }
        let request = url
            .into_client_request()
            .map_err(|e| FeedError::ConnectFailed(e.to_string()))?;

        let state = Arc::new(AtomicU8::new(ReadyState::Connecting as u8));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        debug!(url, generation, "Opening WebSocket");
        tokio::spawn(run_socket(
            request,
            url.to_string(),
            generation,
            state.clone(),
            outbound_rx,
            events,
        ));

        Ok(Box::new(WebSocketConnection {
            generation,
            state,
            outbound: outbound_tx,
        }))
    }
}

/// 소켓 태스크로 보내는 명령.
enum Outbound {
    Text(String),
    Close,
}

struct WebSocketConnection {
    generation: u64,
    state: Arc<AtomicU8>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl Connection for WebSocketConnection {
    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn send(&self, payload: &str) {
        let state = self.ready_state();
        if state != ReadyState::Open {
            warn!(
                generation = self.generation,
                ?state,
                "WebSocket is not open. Cannot send message."
            );
            return;
        }

        if self.outbound.send(Outbound::Text(payload.to_string())).is_err() {
            warn!(generation = self.generation, "WebSocket task already finished");
        }
    }

    fn close(&self) {
        let requested = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                match ReadyState::from_u8(s) {
                    ReadyState::Connecting | ReadyState::Open => Some(ReadyState::Closing as u8),
                    _ => None,
                }
            })
            .is_ok();

        if requested {
            let _ = self.outbound.send(Outbound::Close);
        }
    }
}

impl Drop for WebSocketConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// 수신 루프 종료 사유.
enum Exit {
    /// 로컬에서 종료 요청
    Local,
    /// 원격에서 close 프레임 수신 또는 스트림 종료
    Remote { code: Option<u16>, reason: String },
    /// 전송 에러
    Failed(String),
}

async fn run_socket(
    request: Request,
    url: String,
    generation: u64,
    state: Arc<AtomicU8>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let emit = |kind: TransportEventKind| {
        let _ = events.send(TransportEvent { generation, kind });
    };
    let finish = |code: Option<u16>, reason: String| {
        state.store(ReadyState::Closed as u8, Ordering::Release);
        let _ = events.send(TransportEvent {
            generation,
            kind: TransportEventKind::Closed { code, reason },
        });
    };

    let connected = tokio::select! {
        result = connect_async(request) => Some(result),
        _ = wait_for_close(&mut outbound) => None,
    };

    let ws = match connected {
        Some(Ok((ws, _response))) => ws,
        Some(Err(e)) => {
            warn!(url = %url, generation, error = %e, "WebSocket connection failed");
            emit(TransportEventKind::Error(e.to_string()));
            finish(None, e.to_string());
            return;
        }
        None => {
            debug!(generation, "WebSocket closed before connecting");
            finish(None, CLOSE_REASON.to_string());
            return;
        }
    };

    // close()가 먼저 호출됐다면 Open으로 바꾸지 않고 대기 중인 Close 명령을 처리함
    if state
        .compare_exchange(
            ReadyState::Connecting as u8,
            ReadyState::Open as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        )
        .is_ok()
    {
        info!(url = %url, generation, "WebSocket connected");
        emit(TransportEventKind::Opened);
    }

    let (mut write, mut read) = ws.split();

    let exit = loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        warn!(generation, error = %e, "Failed to send WebSocket message");
                    }
                }
                Some(Outbound::Close) | None => break Exit::Local,
            },
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    emit(TransportEventKind::Message(text.to_string()));
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => emit(TransportEventKind::Message(text)),
                    Err(_) => debug!(generation, "Dropping non UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (Some(u16::from(f.code)), f.reason.to_string()))
                        .unwrap_or((None, String::new()));
                    break Exit::Remote { code, reason };
                }
                // Ping/Pong은 tungstenite에서 자동으로 처리됨
                Some(Ok(_)) => {}
                Some(Err(e)) => break Exit::Failed(e.to_string()),
                None => break Exit::Remote { code: None, reason: String::new() },
            },
        }
    };

    match exit {
        Exit::Local => {
            state.store(ReadyState::Closing as u8, Ordering::Release);
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: CLOSE_REASON.into(),
            };
            if let Err(e) = write.send(Message::Close(Some(frame))).await {
                debug!(generation, error = %e, "Failed to send close frame");
            } else {
                // 서버의 close 응답을 기다림
                let drained = tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, async {
                    while let Some(Ok(message)) = read.next().await {
                        if message.is_close() {
                            break;
                        }
                    }
                })
                .await;
                if drained.is_err() {
                    debug!(generation, "Close handshake timed out");
                }
            }
            finish(Some(1000), CLOSE_REASON.to_string());
        }
        Exit::Remote { code, reason } => {
            info!(generation, ?code, reason = %reason, "WebSocket closed by server");
            finish(code, reason);
        }
        Exit::Failed(error) => {
            warn!(generation, error = %error, "WebSocket error");
            emit(TransportEventKind::Error(error.clone()));
            finish(None, error);
        }
    }
}

/// 연결 중에 close 요청이 오거나 핸들이 버려질 때까지 기다립니다.
async fn wait_for_close(outbound: &mut mpsc::UnboundedReceiver<Outbound>) {
    while let Some(command) = outbound.recv().await {
        if matches!(command, Outbound::Close) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_before_open_is_noop() {
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        let connection = WebSocketConnection {
            generation: 1,
            state: Arc::new(AtomicU8::new(ReadyState::Connecting as u8)),
            outbound: outbound_tx,
        };

        assert!(!connection.is_ready());
        connection.send("AAPL");
        assert!(outbound_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        let connection = WebSocketConnection {
            generation: 1,
            state: Arc::new(AtomicU8::new(ReadyState::Open as u8)),
            outbound: outbound_tx,
        };

        connection.close();
        connection.close();
        assert_eq!(connection.ready_state(), ReadyState::Closing);
        assert!(matches!(outbound_rx.try_recv(), Ok(Outbound::Close)));
        assert!(outbound_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_connect_failure_reports_error_then_close() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        // 사용하지 않는 포트
        let _connection = WebSocketTransport::new()
            .open("ws://127.0.0.1:1/ws", 7, events_tx)
            .unwrap();

        let first = events_rx.recv().await.unwrap();
        assert_eq!(first.generation, 7);
        assert!(matches!(first.kind, TransportEventKind::Error(_)));

        let second = events_rx.recv().await.unwrap();
        assert!(matches!(second.kind, TransportEventKind::Closed { .. }));
    }

    #[tokio::test]
    async fn test_open_rejects_non_websocket_url() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let result =
            WebSocketTransport::new().open("http://127.0.0.1:8000/api/ws/quotes", 1, events_tx);

        assert!(matches!(result, Err(FeedError::ConnectFailed(_))));
        assert!(events_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_loopback_open_send_close() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // 받은 텍스트 프레임과 close 코드를 기록하는 에코 없는 서버
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let mut texts = Vec::new();
            let mut close_codes = Vec::new();
            while let Some(Ok(message)) = ws.next().await {
                match message {
                    Message::Text(text) => texts.push(text.to_string()),
                    Message::Close(frame) => close_codes.push(frame.map(|f| u16::from(f.code))),
                    _ => {}
                }
            }
            (texts, close_codes)
        });

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let connection = WebSocketTransport::new()
            .open(&format!("ws://{}/ws/quotes", addr), 3, events_tx)
            .unwrap();

        let opened = events_rx.recv().await.unwrap();
        assert_eq!(opened.generation, 3);
        assert_eq!(opened.kind, TransportEventKind::Opened);
        assert!(connection.is_ready());

        connection.send("AAPL,MSFT");
        connection.close();
        connection.close();

        let closed = events_rx.recv().await.unwrap();
        assert_eq!(closed.generation, 3);
        assert!(matches!(
            closed.kind,
            TransportEventKind::Closed { code: Some(1000), .. }
        ));
        assert_eq!(connection.ready_state(), ReadyState::Closed);

        let (texts, close_codes) = server.await.unwrap();
        assert_eq!(texts, vec!["AAPL,MSFT".to_string()]);
        assert_eq!(close_codes, vec![Some(1000)]);
    }
}
