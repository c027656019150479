//! 시세 스트림 구독.

use std::sync::Arc;

use anyhow::Result;
use feed_core::{AppConfig, QuotesData};
use feed_stream::{QuotesFeed, StreamEndpoints, WebSocketTransport};
use tracing::info;

pub async fn run(config: &AppConfig, symbols: Vec<String>, json: bool) -> Result<()> {
    let endpoints = StreamEndpoints::from_api(&config.api);
    info!(url = %endpoints.quotes, symbols = %symbols.join(","), "Starting quotes feed");

    let feed = QuotesFeed::spawn(
        endpoints.quotes,
        &symbols,
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
            }
            changed = data.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = data.borrow_and_update().clone();
                if let Some(quotes) = snapshot {
                    print_quotes(&quotes, json)?;
                }
            }
        }
    }

    feed.shutdown().await;
    Ok(())
}

fn print_quotes(quotes: &QuotesData, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(quotes)?);
        return Ok(());
    }

    let mut symbols: Vec<&String> = quotes.keys().collect();
    symbols.sort();

    println!(
        "{:<8} {:>12} {:>10} {:>9} {:>14}  {}",
        "SYMBOL", "PRICE", "CHANGE", "CHANGE%", "VOLUME", "TIME"
    );
    for symbol in symbols {
        let quote = &quotes[symbol];
        println!(
            "{:<8} {:>12.2} {:>+10.2} {:>+8.2}% {:>14}  {}",
            symbol, quote.price, quote.change, quote.change_percent, quote.volume, quote.timestamp
        );
    }
    println!();
    Ok(())
}
