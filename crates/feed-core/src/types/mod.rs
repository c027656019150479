//! 피드 기본 타입 정의.

pub mod mover;
pub mod number;
pub mod quote;
pub mod state;

pub use mover::*;
pub use quote::*;
pub use state::*;
