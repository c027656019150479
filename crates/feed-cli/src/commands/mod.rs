//! CLI 명령어 구현 모듈.

pub mod endpoints;
pub mod movers;
pub mod quotes;

use feed_core::{AppConfig, FeedError};
use feed_stream::{FeedOptions, ReconnectPolicy};
use tracing::{error, info, warn};

/// 설정의 재연결 정책과 에러 로그 콜백을 가진 피드 옵션을 생성합니다.
pub fn feed_options(config: &AppConfig) -> FeedOptions {
    FeedOptions::default()
        .with_policy(ReconnectPolicy::from(&config.stream))
        .on_error(|e: &FeedError| {
            if e.is_terminal() {
                error!(error = %e, "Feed gave up reconnecting");
            }
        })
}

/// Ctrl+C 또는 SIGTERM 시그널을 기다립니다.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, closing feed...");
        }
        _ = terminate => {
            info!("Received SIGTERM, closing feed...");
        }
    }
}
