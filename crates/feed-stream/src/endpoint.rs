//! 스트리밍 엔드포인트 URL 생성.
//!
//! 설정된 기본 URL의 `http`/`https` 스킴을 `ws`로 바꾸고, API 접두사와 피드별 경로를 붙입니다.
//! 구독은 URL이 아니라 첫 송신 메시지로 하므로 쿼리 파라미터는 없습니다.

use feed_core::ApiConfig;

/// 기본 URL의 `http(s)` 스킴을 `ws`로 바꿉니다.
///
/// 스킴이 `http`/`https`가 아니면 그대로 반환합니다.
pub fn websocket_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if let Some(rest) = trimmed.strip_prefix("https") {
        format!("ws{}", rest)
    } else if let Some(rest) = trimmed.strip_prefix("http") {
        format!("ws{}", rest)
    } else {
        trimmed.to_string()
    }
}

/// 피드별 스트리밍 URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEndpoints {
    /// 시세 스트림 URL
    pub quotes: String,
    /// 상위 종목 스트림 URL
    pub movers: String,
}

impl StreamEndpoints {
    /// API 설정에서 스트리밍 URL을 생성합니다.
    pub fn from_api(api: &ApiConfig) -> Self {
        let base = websocket_base_url(&api.base_url);
        Self {
            quotes: format!("{}{}{}", base, api.api_prefix, api.quotes_path),
            movers: format!("{}{}{}", base, api.api_prefix, api.movers_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_replacement() {
        assert_eq!(websocket_base_url("http://localhost:8000"), "ws://localhost:8000");
        assert_eq!(websocket_base_url("https://markets.example.com"), "ws://markets.example.com");
        assert_eq!(websocket_base_url("https://markets.example.com/"), "ws://markets.example.com");
        assert_eq!(websocket_base_url("wss://already.example.com"), "wss://already.example.com");
    }

    #[test]
    fn test_endpoints_from_api() {
        let api = ApiConfig {
            base_url: "https://markets.example.com".to_string(),
            ..Default::default()
        };

        let endpoints = StreamEndpoints::from_api(&api);
        assert_eq!(endpoints.quotes, "ws://markets.example.com/api/ws/quotes");
        assert_eq!(endpoints.movers, "ws://markets.example.com/api/ws/movers");
        assert!(!endpoints.quotes.contains('?'));
    }
}
