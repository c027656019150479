//! 종목별 실시간 시세.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::number::{lenient_f64, lenient_opt_f64, lenient_string, lenient_volume};

/// 종목 하나의 실시간 시세 스냅샷.
///
/// 수신 프레임마다 통째로 교체되며 병합/패치는 없습니다. 종목별로 마지막 스냅샷이 유효합니다.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// 종목 심볼 (대문자)
    #[serde(default, deserialize_with = "lenient_string")]
    pub symbol: String,
    /// 현재가
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price: f64,
    /// 전일 대비
    #[serde(default, deserialize_with = "lenient_f64")]
    pub change: f64,
    /// 등락률 (%)
    #[serde(default, deserialize_with = "lenient_f64")]
    pub change_percent: f64,
    /// 거래량
    #[serde(default, deserialize_with = "lenient_volume")]
    pub volume: u64,
    /// 타임스탬프 (ISO 8601 또는 서버가 보낸 숫자의 문자열 표현)
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: String,
    /// 시가
    #[serde(default, deserialize_with = "lenient_opt_f64", skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    /// 고가
    #[serde(default, deserialize_with = "lenient_opt_f64", skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    /// 저가
    #[serde(default, deserialize_with = "lenient_opt_f64", skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    /// 전일 종가
    #[serde(default, deserialize_with = "lenient_opt_f64", skip_serializing_if = "Option::is_none")]
    pub previous_close: Option<f64>,
    /// 시가총액
    #[serde(default, deserialize_with = "lenient_opt_f64", skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    /// 매수호가
    #[serde(default, deserialize_with = "lenient_opt_f64", skip_serializing_if = "Option::is_none")]
    pub bid: Option<f64>,
    /// 매도호가
    #[serde(default, deserialize_with = "lenient_opt_f64", skip_serializing_if = "Option::is_none")]
    pub ask: Option<f64>,
    /// 매수호가 잔량
    #[serde(default, deserialize_with = "lenient_opt_f64", skip_serializing_if = "Option::is_none")]
    pub bid_size: Option<f64>,
    /// 매도호가 잔량
    #[serde(default, deserialize_with = "lenient_opt_f64", skip_serializing_if = "Option::is_none")]
    pub ask_size: Option<f64>,
}

/// 심볼 → 최신 시세 매핑.
///
/// 성공적으로 파싱된 프레임마다 새로 생성되며, 이전 버전은 버려집니다.
pub type QuotesData = HashMap<String, Quote>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{
            "symbol": "AAPL",
            "price": 189.5,
            "change": 1.25,
            "changePercent": 0.66,
            "volume": 51234000,
            "timestamp": "2024-05-01T14:30:00Z",
            "previousClose": 188.25,
            "bidSize": 300
        }"#;

        let quote: Quote = serde_json::from_str(json).unwrap();
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.change_percent, 0.66);
        assert_eq!(quote.volume, 51_234_000);
        assert_eq!(quote.previous_close, Some(188.25));
        assert_eq!(quote.bid_size, Some(300.0));
        assert_eq!(quote.open, None);
    }

    #[test]
    fn test_deserialize_string_numbers() {
        let json = r#"{"symbol": "MSFT", "price": "415.10", "volume": "1200", "bid": "415.05"}"#;

        let quote: Quote = serde_json::from_str(json).unwrap();
        assert_eq!(quote.price, 415.10);
        assert_eq!(quote.volume, 1200);
        assert_eq!(quote.bid, Some(415.05));
        assert_eq!(quote.change, 0.0);
    }

    #[test]
    fn test_deserialize_null_and_numeric_text() {
        let json = r#"{"symbol": null, "price": 1.5, "timestamp": 1714573800000}"#;

        let quote: Quote = serde_json::from_str(json).unwrap();
        assert_eq!(quote.symbol, "");
        assert_eq!(quote.timestamp, "1714573800000");

        let quote: Quote = serde_json::from_str(r#"{"symbol": "AAPL", "timestamp": null}"#).unwrap();
        assert_eq!(quote.timestamp, "");
    }
}
