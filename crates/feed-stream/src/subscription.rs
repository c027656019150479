//! 시세 피드 구독 심볼 집합.
//!
//! 서버로 보내는 와이어 표현은 정규화된 집합을 쉼표로 연결한 문자열이며,
//! 소비자가 무엇을 넘기든 중복이나 빈 항목이 포함되지 않습니다.

use std::collections::HashSet;

/// 정규화된 구독 심볼 집합.
///
/// 공백 제거, 대문자 변환, 빈 문자열 제외, 중복 제거(첫 등장 순서 유지)를 적용합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    symbols: Vec<String>,
}

impl SubscriptionSet {
    /// 입력 심볼 목록을 정규화합니다.
    pub fn normalize<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let symbols = symbols
            .into_iter()
            .map(|s| s.as_ref().trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .filter(|s| seen.insert(s.clone()))
            .collect();

        Self { symbols }
    }

    /// 정규화된 심볼 목록.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// 서버로 전송할 와이어 표현 (예: `"AAPL,MSFT"`).
    pub fn to_wire(&self) -> String {
        self.symbols.join(",")
    }
}

/// 소비자가 요청한 심볼 집합과 서버 측 구독을 맞추는 동기화기.
///
/// 정규화 결과의 직렬화 형태가 바뀔 때만 변경으로 취급해 중복 전송을 피합니다.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionSync {
    current: SubscriptionSet,
    key: String,
}

impl SubscriptionSync {
    /// 초기 심볼 목록으로 생성합니다.
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let current = SubscriptionSet::normalize(symbols);
        let key = current.to_wire();
        Self { current, key }
    }

    /// 요청 심볼 목록을 갱신합니다. 정규화된 집합이 바뀌었으면 `true`.
    pub fn update<I, S>(&mut self, symbols: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let next = SubscriptionSet::normalize(symbols);
        let key = next.to_wire();
        if key == self.key {
            return false;
        }
        self.current = next;
        self.key = key;
        true
    }

    /// 현재 구독 집합.
    pub fn current(&self) -> &SubscriptionSet {
        &self.current
    }

    /// 연결이 열렸을 때 전송할 메시지. 집합이 비어 있으면 `None`.
    pub fn message(&self) -> Option<&str> {
        if self.key.is_empty() {
            None
        } else {
            Some(&self.key)
        }
    }
}
