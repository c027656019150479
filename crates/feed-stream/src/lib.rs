//! 실시간 스트리밍 피드 연결 관리.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Transport: 스트리밍 연결 하나를 감싸는 어댑터 (tokio-tungstenite 구현 포함)
//! - Codec: 수신 텍스트 프레임을 타입이 있는 레코드로 변환
//! - Lifecycle: 고정 간격 재연결 정책을 가진 연결 상태 머신
//! - Subscription: 시세 피드의 구독 심볼 집합 동기화
//! - Feed: 위 컴포넌트를 tokio 태스크 하나에서 구동하는 런타임과 소비자 핸들

pub mod codec;
pub mod endpoint;
pub mod feed;
pub mod lifecycle;
pub mod subscription;
pub mod transport;

pub use codec::{parse_movers, parse_quotes};
pub use endpoint::{websocket_base_url, StreamEndpoints};
pub use feed::{
    ErrorCallback, FeedHandle, FeedKind, FeedOptions, MoversFeed, MoversHandle, QuotesFeed,
    QuotesHandle,
};
pub use lifecycle::{Action, Event, Lifecycle, ReconnectPolicy};
pub use subscription::{SubscriptionSet, SubscriptionSync};
pub use transport::{
    Connection, ReadyState, Transport, TransportEvent, TransportEventKind, WebSocketTransport,
};
