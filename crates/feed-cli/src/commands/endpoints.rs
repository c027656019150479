//! 스트리밍 URL 출력.

use feed_core::AppConfig;
use feed_stream::StreamEndpoints;

pub fn run(config: &AppConfig) {
    let endpoints = StreamEndpoints::from_api(&config.api);

    println!("quotes  {}", endpoints.quotes);
    println!("movers  {}", endpoints.movers);
}
