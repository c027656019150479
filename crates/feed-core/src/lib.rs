//! # Feed Core
//!
//! 실시간 시세 피드의 핵심 도메인 모델 및 공통 인프라를 제공합니다.
//!
//! 이 크레이트는 피드 전반에서 사용되는 기본 타입을 제공합니다:
//! - 종목별 실시간 시세 (`Quote`, `QuotesData`)
//! - 상승/하락/거래량 상위 종목 (`MoverItem`, `MoversData`)
//! - 연결 상태 (`ConnectionState`)
//! - 설정 관리
//! - 로깅 인프라
//! - 피드 에러 타입

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;
