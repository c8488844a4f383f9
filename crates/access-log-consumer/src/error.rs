//! 访问日志消费服务专用错误类型
//!
//! 在共享库 MeteringError 基础上定义本服务特有的错误变体，
//! 区分启动前的配置校验失败与停止时的任务等待失败。

use metering_shared::error::MeteringError;

/// 访问日志消费错误
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    /// 启动前的配置校验失败（topic 为空等），不触发任何连接
    #[error("消费者配置错误: {0}")]
    Config(String),

    /// 停止时等待消费任务退出失败
    #[error("等待消费任务退出失败: {0}")]
    Stopped(String),

    /// 透传共享库错误，避免在每个 match 分支手动转换
    #[error(transparent)]
    Shared(#[from] MeteringError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConsumerError::Config("kafka.topic 不能为空".to_string());
        assert_eq!(err.to_string(), "消费者配置错误: kafka.topic 不能为空");

        let err = ConsumerError::Stopped("任务被取消".to_string());
        assert_eq!(err.to_string(), "等待消费任务退出失败: 任务被取消");

        let shared_err = MeteringError::Kafka("broker 不可达".to_string());
        let err = ConsumerError::Shared(shared_err);
        assert_eq!(err.to_string(), "Kafka 错误: broker 不可达");
    }
}
