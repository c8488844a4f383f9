//! Kafka 基础设施封装
//!
//! 将 rdkafka 的底层 API 封装为业务友好的消费者抽象，统一错误映射、
//! 不可恢复错误处理和优雅关闭语义，避免上层重复编写样板代码。

use std::ops::ControlFlow;
use std::sync::Arc;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::{BorrowedMessage, Message};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::KafkaConfig;
use crate::error::MeteringError;

// ---------------------------------------------------------------------------
// ConsumerMessage
// ---------------------------------------------------------------------------

/// 消费到的 Kafka 消息的统一表示
///
/// 将 rdkafka 的 `BorrowedMessage`（带生命周期约束）转换为拥有所有权的结构体，
/// 使消息可以安全地跨 await 点传递给异步处理函数。
#[derive(Debug, Clone)]
pub struct ConsumerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub timestamp: Option<i64>,
}

impl ConsumerMessage {
    /// 从 rdkafka 的借用消息构造，提取并拥有所有字段
    fn from_borrowed(msg: &BorrowedMessage<'_>) -> Self {
        let key = msg
            .key()
            .and_then(|k| std::str::from_utf8(k).ok())
            .map(String::from);

        let payload = msg.payload().map(|p| p.to_vec()).unwrap_or_default();

        Self {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key,
            payload,
            timestamp: msg.timestamp().to_millis(),
        }
    }
}

// ---------------------------------------------------------------------------
// 不可恢复错误分类与处理钩子
// ---------------------------------------------------------------------------

/// 判断消费流中的错误是否不可恢复
///
/// librdkafka 对网络抖动、broker 切换等瞬态故障会在内部自动重试，
/// 这类错误只需记录后继续轮询。以下错误重试不会有结果，必须交由
/// [`FatalHook`] 处理：
/// - 客户端进入 fatal 状态
/// - topic / 消费组鉴权失败
/// - topic 不存在且 broker 禁止自动创建
/// - 订阅本身非法
pub fn is_unrecoverable(err: &KafkaError) -> bool {
    match err {
        KafkaError::Subscription(_) => true,
        KafkaError::MessageConsumptionFatal(_) => true,
        KafkaError::MessageConsumption(code) => matches!(
            code,
            RDKafkaErrorCode::Fatal
                | RDKafkaErrorCode::TopicAuthorizationFailed
                | RDKafkaErrorCode::GroupAuthorizationFailed
                | RDKafkaErrorCode::UnknownTopicOrPartition
        ),
        _ => false,
    }
}

/// 不可恢复错误的处理钩子
///
/// 消费循环遇到不可恢复错误时调用一次，随后退出循环。
/// 默认实现 [`ProcessExitHook`] 直接终止进程，由外部监督者重启；
/// 测试中可注入记录型实现来观察触发情况。
pub trait FatalHook: Send + Sync {
    fn trigger(&self, err: &MeteringError);
}

/// 默认钩子：记录错误日志后以非零退出码终止进程
pub struct ProcessExitHook;

impl FatalHook for ProcessExitHook {
    fn trigger(&self, err: &MeteringError) {
        error!(error = %err, "Kafka 消费遇到不可恢复错误，进程退出");
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// KafkaConsumer
// ---------------------------------------------------------------------------

/// 面向业务的 Kafka 消费者
///
/// 封装 `StreamConsumer` 并提供基于 `watch` channel 的优雅关闭语义，
/// 确保进程退出时不会丢失正在处理的消息。
pub struct KafkaConsumer {
    consumer: StreamConsumer,
    fatal_hook: Arc<dyn FatalHook>,
}

impl std::fmt::Debug for KafkaConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaConsumer").finish_non_exhaustive()
    }
}

impl KafkaConsumer {
    /// 创建消费者
    ///
    /// broker 列表在构建客户端之前校验，空列表或空白地址直接返回
    /// 配置错误，不触发任何连接动作。客户端本身是惰性连接的，
    /// 创建成功不代表 broker 可达。
    pub fn new(config: &KafkaConfig) -> Result<Self, MeteringError> {
        if config.brokers.is_empty() || config.brokers.iter().any(|b| b.trim().is_empty()) {
            return Err(MeteringError::Config(
                "Kafka broker 列表不能为空".to_string(),
            ));
        }

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", config.bootstrap_servers())
            .set("group.id", &config.consumer_group)
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.auto.commit", "true")
            .create()
            .map_err(|e| MeteringError::Kafka(format!("创建消费者失败: {e}")))?;

        info!(
            brokers = %config.bootstrap_servers(),
            group_id = %config.consumer_group,
            "Kafka 消费者已初始化"
        );
        Ok(Self {
            consumer,
            fatal_hook: Arc::new(ProcessExitHook),
        })
    }

    /// 替换不可恢复错误钩子
    pub fn with_fatal_hook(mut self, hook: Arc<dyn FatalHook>) -> Self {
        self.fatal_hook = hook;
        self
    }

    /// 订阅指定的 topic 列表
    pub fn subscribe(&self, topics: &[&str]) -> Result<(), MeteringError> {
        self.consumer
            .subscribe(topics)
            .map_err(|e| MeteringError::Kafka(format!("订阅 topic 失败: {e}")))?;

        info!(?topics, "已订阅 Kafka topics");
        Ok(())
    }

    /// 处理消费流报错并给出循环走向
    ///
    /// 瞬态错误记录后继续轮询；不可恢复错误触发 [`FatalHook`] 并终止循环。
    fn handle_fetch_error(&self, err: &KafkaError) -> ControlFlow<()> {
        if is_unrecoverable(err) {
            let wrapped = MeteringError::Kafka(format!("拉取消息失败: {err}"));
            error!(error = %wrapped, "Kafka 消费遇到不可恢复错误");
            self.fatal_hook.trigger(&wrapped);
            ControlFlow::Break(())
        } else {
            warn!(error = %err, "接收 Kafka 消息出错，等待内部重试");
            ControlFlow::Continue(())
        }
    }

    /// 启动消费循环
    ///
    /// 使用 `tokio::select!` 同时监听消息流和关闭信号：
    /// - 收到消息时调用 handler 处理；handler 返回错误只记录日志而不中断循环，
    ///   避免单条坏消息导致整个消费者停止。
    /// - 消费流报错时按 [`is_unrecoverable`] 分类：瞬态错误记录后继续轮询，
    ///   不可恢复错误触发 [`FatalHook`] 并退出循环。
    /// - 关闭信号变为 `true` 或信号通道关闭时退出循环，确保正在执行的
    ///   handler 能自然完成。
    pub async fn start<F, Fut>(self, mut shutdown: watch::Receiver<bool>, handler: F)
    where
        F: Fn(ConsumerMessage) -> Fut,
        Fut: std::future::Future<Output = Result<(), MeteringError>>,
    {
        use futures::StreamExt;

        let stream = self.consumer.stream();
        futures::pin_mut!(stream);

        info!("Kafka 消费循环已启动");

        loop {
            tokio::select! {
                // 偏向关闭信号，保证收到关闭时能尽快退出
                biased;

                changed = shutdown.changed() => {
                    // 发送端被丢弃视同收到关闭信号
                    if changed.is_err() || *shutdown.borrow() {
                        info!("收到关闭信号，Kafka 消费循环退出");
                        break;
                    }
                }

                msg_result = stream.next() => {
                    let Some(msg_result) = msg_result else {
                        warn!("Kafka 消息流意外结束");
                        break;
                    };

                    match msg_result {
                        Ok(borrowed_msg) => {
                            let msg = ConsumerMessage::from_borrowed(&borrowed_msg);
                            debug!(
                                topic = %msg.topic,
                                partition = msg.partition,
                                offset = msg.offset,
                                "收到 Kafka 消息"
                            );

                            if let Err(e) = handler(msg).await {
                                warn!(error = %e, "处理 Kafka 消息失败，跳过该条消息");
                            }
                        }
                        Err(e) => {
                            if self.handle_fetch_error(&e).is_break() {
                                break;
                            }
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------
