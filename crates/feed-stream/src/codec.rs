//! 수신 프레임 디코더.
//!
//! 텍스트 프레임을 `QuotesData`/`MoversData`로 변환합니다. 잘못된 입력에도 패닉하지 않으며,
//! JSON 파싱 자체가 실패한 경우에만 `None`을 반환합니다.

use chrono::{SecondsFormat, Utc};
use feed_core::types::number::{coerce_f64, coerce_percent, coerce_text, coerce_volume};
use feed_core::{FeedError, MoverItem, MoversData, Quote, QuotesData};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// 텍스트 프레임을 JSON으로 파싱합니다. 실패 시 `FeedError::Parse`로 변환해 경고 로그를 남깁니다.
fn parse_frame(raw: &str, feed: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(raw).map_err(FeedError::from) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(feed, error = %e, "Error parsing frame");
            None
        }
    }
}

/// 시세 프레임을 파싱합니다.
///
/// 프레임은 심볼 → 시세 객체 매핑입니다. 각 항목은 관대하게 변환되므로 필드 하나가 이상해도
/// 프레임 전체를 버리지 않습니다. JSON 파싱이 실패한 경우에만 `None`.
pub fn parse_quotes(raw: &str) -> Option<QuotesData> {
    let entries = match parse_frame(raw, "quotes")? {
        Value::Object(entries) => entries,
        other => {
            warn!(kind = json_kind(&other), "Quotes frame is not an object");
            Map::new()
        }
    };

    let quotes = entries
        .into_iter()
        .filter_map(|(symbol, value)| match serde_json::from_value::<Quote>(value) {
            Ok(quote) => Some((symbol, quote)),
            Err(e) => {
                debug!(symbol = %symbol, error = %e, "Skipping non-object quote entry");
                None
            }
        })
        .collect();

    Some(quotes)
}

/// 상위 종목 프레임을 파싱합니다.
///
/// - 배열이 아닌 `gainers`/`losers`/`actives`는 빈 목록으로 처리합니다.
/// - 각 항목의 숫자 필드는 문자열이어도 변환하며 실패 시 `0`.
/// - `timestamp`가 없으면 현재 시각을 사용합니다.
pub fn parse_movers(raw: &str) -> Option<MoversData> {
    let parsed = parse_frame(raw, "movers")?;

    // 숫자 타임스탬프는 문자열로 보존하고 값이 없을 때만 현재 시각을 사용함
    let timestamp = parsed
        .get("timestamp")
        .and_then(coerce_text)
        .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));

    Some(MoversData {
        gainers: parse_mover_list(parsed.get("gainers")),
        losers: parse_mover_list(parsed.get("losers")),
        actives: parse_mover_list(parsed.get("actives")),
        timestamp,
    })
}

fn parse_mover_list(value: Option<&Value>) -> Vec<MoverItem> {
    match value {
        Some(Value::Array(items)) => items.iter().map(parse_mover_item).collect(),
        _ => Vec::new(),
    }
}

fn parse_mover_item(value: &Value) -> MoverItem {
    let empty = Map::new();
    let item = value.as_object().unwrap_or(&empty);
    let field = |name: &str| item.get(name).unwrap_or(&Value::Null);

    // 페이로드에 따라 "percentChange"(문자열, "%" 포함) 또는 "changePercent"(숫자)로 옴
    let change_percent = match item.get("percentChange") {
        Some(v) if !v.is_null() => coerce_percent(v),
        _ => coerce_percent(field("changePercent")),
    };

    MoverItem {
        symbol: coerce_text(field("symbol")).unwrap_or_default(),
        name: coerce_text(field("name")),
        price: coerce_f64(field("price")),
        change: coerce_f64(field("change")),
        change_percent,
        volume: coerce_volume(field("volume")),
        market_cap: match field("marketCap") {
            Value::Null => None,
            v => Some(coerce_f64(v)),
        },
        timestamp: coerce_text(field("timestamp")),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
