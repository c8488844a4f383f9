//! 统一错误处理模块
//!
//! 定义系统中所有共享的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 系统错误类型
#[derive(Debug, Error)]
pub enum MeteringError {
    // ==================== 配置错误 ====================
    #[error("配置错误: {0}")]
    Config(String),

    // ==================== Kafka 错误 ====================
    #[error("Kafka 错误: {0}")]
    Kafka(String),

    // ==================== 解码错误 ====================
    #[error("访问日志解码失败: {0}")]
    Decode(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, MeteringError>;

impl MeteringError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Kafka(_) => "KAFKA_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
        }
    }

    /// 是否为可重试错误
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Kafka(_))
    }
}
