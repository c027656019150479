//! 상승/하락/거래량 상위 종목.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 순위 목록에 포함된 종목 하나.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoverItem {
    /// 종목 심볼
    pub symbol: String,
    /// 종목명 (있을 때만)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// 현재가
    pub price: f64,
    /// 전일 대비
    pub change: f64,
    /// 등락률 (%)
    pub change_percent: f64,
    /// 거래량
    pub volume: u64,
    /// 시가총액
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    /// 타임스탬프
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// 순위 카테고리.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoverCategory {
    /// 상승률 상위
    Gainers,
    /// 하락률 상위
    Losers,
    /// 거래량 상위
    Actives,
}

impl MoverCategory {
    /// 모든 카테고리 반환.
    pub fn all() -> [MoverCategory; 3] {
        [
            MoverCategory::Gainers,
            MoverCategory::Losers,
            MoverCategory::Actives,
        ]
    }
}

impl fmt::Display for MoverCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoverCategory::Gainers => write!(f, "gainers"),
            MoverCategory::Losers => write!(f, "losers"),
            MoverCategory::Actives => write!(f, "actives"),
        }
    }
}

impl FromStr for MoverCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gainers" | "gainer" => Ok(Self::Gainers),
            "losers" | "loser" => Ok(Self::Losers),
            "actives" | "active" | "most-active" => Ok(Self::Actives),
            _ => Err(format!("Unknown mover category: {}", s)),
        }
    }
}

/// 상위 종목 스냅샷.
///
/// 수신 프레임마다 통째로 교체됩니다.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MoversData {
    pub gainers: Vec<MoverItem>,
    pub losers: Vec<MoverItem>,
    pub actives: Vec<MoverItem>,
    /// ISO 8601 타임스탬프
    pub timestamp: String,
}

impl MoversData {
    /// 카테고리에 해당하는 목록을 반환합니다.
    pub fn category(&self, category: MoverCategory) -> &[MoverItem] {
        match category {
            MoverCategory::Gainers => &self.gainers,
            MoverCategory::Losers => &self.losers,
            MoverCategory::Actives => &self.actives,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(symbol: &str) -> MoverItem {
        MoverItem {
            symbol: symbol.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_category_selection() {
        let data = MoversData {
            gainers: vec![item("NVDA")],
            losers: vec![item("TSLA"), item("F")],
            actives: vec![],
            timestamp: "2024-05-01T14:30:00Z".to_string(),
        };

        assert_eq!(data.category(MoverCategory::Gainers)[0].symbol, "NVDA");
        assert_eq!(data.category(MoverCategory::Losers).len(), 2);
        assert!(data.category(MoverCategory::Actives).is_empty());
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("GAINERS".parse::<MoverCategory>().unwrap(), MoverCategory::Gainers);
        assert_eq!("loser".parse::<MoverCategory>().unwrap(), MoverCategory::Losers);
        assert_eq!("most-active".parse::<MoverCategory>().unwrap(), MoverCategory::Actives);
        assert!("volume".parse::<MoverCategory>().is_err());
    }
}
