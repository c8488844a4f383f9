//! RU 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuError {
    #[error("无效的计费规则模式 '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("计费成本不能为负: '{pattern}' -> {cost}")]
    NegativeCost { pattern: String, cost: i64 },
}

pub type Result<T> = std::result::Result<T, RuError>;
