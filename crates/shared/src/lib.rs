//! 共享库
//!
//! 包含计量服务共用的配置、错误处理、Kafka 消费、访问日志解码等基础设施代码。

pub mod access_log;
pub mod config;
pub mod error;
pub mod kafka;
pub mod observability;
