//! 와이어 숫자 필드 변환.
//!
//! 업스트림 페이로드는 숫자와 문자열로 인코딩된 숫자(예: `"+3.50%"`)를
//! 일관성 없이 섞어 보내므로, 경계에서 `f64`/`u64`로 정규화합니다.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// JSON 값을 실수로 변환합니다. 변환할 수 없으면 `0.0`.
///
/// 빈 문자열, `null`, `false` 등 값이 없는 경우도 `0.0`으로 처리합니다.
pub fn coerce_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Value::String(s) => parse_f64(s),
        _ => 0.0,
    }
}

/// 등락률 값을 변환합니다. 문자열이면 뒤쪽 `%`를 제거한 뒤 파싱합니다.
pub fn coerce_percent(value: &Value) -> f64 {
    match value {
        Value::String(s) => parse_f64(s.trim().trim_end_matches('%')),
        other => coerce_f64(other),
    }
}

/// 문자열/숫자 값을 비어 있지 않은 문자열로 변환합니다.
///
/// 숫자(예: epoch 밀리초 타임스탬프)는 문자열 표현을 사용하고, `null`이나 빈 문자열은 `None`.
pub fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 거래량을 정수로 변환합니다. 소수부는 버리고 음수/비정상 값은 `0`.
pub fn coerce_volume(value: &Value) -> u64 {
    to_volume(coerce_f64(value))
}

/// 실수를 거래량 정수로 변환합니다.
pub fn to_volume(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.trunc() as u64
    } else {
        0
    }
}

fn parse_f64(s: &str) -> f64 {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// 숫자 또는 숫자 문자열을 허용하는 serde 역직렬화 함수.
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_f64(&value))
}

/// 문자열, 숫자, `null`을 허용하는 텍스트 필드 역직렬화 함수. 값이 없으면 빈 문자열.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_text(&value).unwrap_or_default())
}

/// 숫자 또는 숫자 문자열을 허용하는 선택적 필드 역직렬화 함수.
pub fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        other => Some(coerce_f64(&other)),
    })
}

/// 숫자 또는 숫자 문자열을 허용하는 거래량 역직렬화 함수.
pub fn lenient_volume<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_volume(&value))
}
