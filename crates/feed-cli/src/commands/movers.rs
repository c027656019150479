//! 상위 종목 스트림 구독.

use std::sync::Arc;

use anyhow::Result;
use feed_core::{AppConfig, MoverCategory, MoversData};
use feed_stream::{MoversFeed, StreamEndpoints, WebSocketTransport};
use tracing::info;

pub async fn run(
    config: &AppConfig,
    category: Option<MoverCategory>,
    limit: usize,
    json: bool,
) -> Result<()> {
    let endpoints = StreamEndpoints::from_api(&config.api);
    info!(url = %endpoints.movers, "Starting movers feed");

    let feed = MoversFeed::spawn(
        endpoints.movers,
        super::feed_options(config),
        Arc::new(WebSocketTransport::new()),
    );

    let mut state = feed.subscribe_state();
    let mut data = feed.subscribe_data();
    let shutdown = super::shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                info!(state = %current, "Connection state changed");
                if feed.is_initial_loading() {
                    info!("Waiting for the first movers snapshot");
                }
            }
            changed = data.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = data.borrow_and_update().clone();
                if let Some(movers) = snapshot {
                    print_movers(&movers, category, limit, json)?;
                }
            }
        }
    }

    feed.shutdown().await;
    Ok(())
}

fn print_movers(
    movers: &MoversData,
    category: Option<MoverCategory>,
    limit: usize,
    json: bool,
) -> Result<()> {
    if json {
        match category {
            Some(category) => {
                let items = movers.category(category);
                println!("{}", serde_json::to_string(&items[..limit.min(items.len())])?);
            }
            None => println!("{}", serde_json::to_string(movers)?),
        }
        return Ok(());
    }

    let categories = match category {
        Some(category) => vec![category],
        None => MoverCategory::all().to_vec(),
    };

    println!("== movers @ {} ==", movers.timestamp);
    for category in categories {
        println!("[{}]", category);
        for item in movers.category(category).iter().take(limit) {
            println!(
                "  {:<8} {:>12.2} {:>+10.2} {:>+8.2}% {:>14}  {}",
                item.symbol,
                item.price,
                item.change,
                item.change_percent,
                item.volume,
                item.name.as_deref().unwrap_or("")
            );
        }
    }
    println!();
    Ok(())
}
