//! 설정 관리.
//!
//! 기본값 → TOML 파일 → `FEED__` 접두사 환경 변수 순서로 덮어씁니다.
//! 예: `FEED__API__BASE_URL=https://api.example.com`

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::FeedResult;

/// 기본 설정 파일 경로.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 백엔드 API 설정
    #[serde(default)]
    pub api: ApiConfig,
    /// 스트리밍 연결 설정
    #[serde(default)]
    pub stream: StreamConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 백엔드 API 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// 백엔드 기본 URL (http/https)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// API 경로 접두사
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// 시세 스트림 경로
    #[serde(default = "default_quotes_path")]
    pub quotes_path: String,
    /// 상위 종목 스트림 경로
    #[serde(default = "default_movers_path")]
    pub movers_path: String,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_api_prefix() -> String {
    "/api".to_string()
}
fn default_quotes_path() -> String {
    "/ws/quotes".to_string()
}
fn default_movers_path() -> String {
    "/ws/movers".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_prefix: default_api_prefix(),
            quotes_path: default_quotes_path(),
            movers_path: default_movers_path(),
        }
    }
}

/// 스트리밍 연결 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// 재연결 간격 (밀리초, 고정 간격)
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u64,
    /// 최대 재연결 시도 횟수
    #[serde(default = "default_max_reconnect")]
    pub max_reconnect_attempts: u32,
}

fn default_reconnect_interval() -> u64 {
    5000
}
fn default_max_reconnect() -> u32 {
    10
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reconnect_interval_ms: default_reconnect_interval(),
            max_reconnect_attempts: default_max_reconnect(),
        }
    }
}

impl StreamConfig {
    /// 재연결 간격을 Duration으로 반환합니다.
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다. 파일이 없으면 기본값을 사용합니다.
    ///
    /// 파일 형식이나 값이 잘못되면 `FeedError::Config`.
    pub fn load<P: AsRef<Path>>(path: P) -> FeedResult<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("FEED")
                    .separator("__")
                    .try_parsing(true),
            );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// TOML 문자열에서 설정을 로드합니다 (환경 변수 미적용).
    pub fn from_toml_str(toml: &str) -> FeedResult<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}
