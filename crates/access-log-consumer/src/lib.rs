//! 访问日志 RU 计量消费服务
//!
//! 消费网关写入 Kafka 的访问日志批次，逐条解码后按 URI 计算 RU 成本，
//! 并按调用方累计到内存用量账本。

pub mod consumer;
pub mod error;
pub mod processor;
