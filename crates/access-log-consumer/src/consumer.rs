//! 访问日志消费管道
//!
//! 组合共享 KafkaConsumer 与 LogProcessor，形成完整的消费链路：
//! 拉取消息 -> 解码批次 -> 按数组顺序逐条交给处理器。
//! 生命周期由所有权约束：start 消费掉消费者本体，stop 消费掉控制句柄，
//! 同一实例无法二次启动，停止后的循环永久结束。

use std::sync::Arc;

use metering_shared::access_log::decode_batch;
use metering_shared::config::AppConfig;
use metering_shared::error::MeteringError;
use metering_shared::kafka::{ConsumerMessage, FatalHook, KafkaConsumer};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ConsumerError;
use crate::processor::LogProcessor;

/// 访问日志消费者
pub struct AccessLogConsumer {
    consumer: KafkaConsumer,
    topic: String,
}

impl std::fmt::Debug for AccessLogConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessLogConsumer")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl AccessLogConsumer {
    /// 校验配置并构建消费者
    ///
    /// topic 为空在这里直接拒绝；broker 列表校验在共享 KafkaConsumer
    /// 中完成。两者都是同步校验，不触发任何网络连接。
    pub fn new(config: &AppConfig) -> Result<Self, ConsumerError> {
        let topic = config.kafka.topic.trim();
        if topic.is_empty() {
            return Err(ConsumerError::Config("kafka.topic 不能为空".to_string()));
        }

        let consumer = KafkaConsumer::new(&config.kafka)?;
        Ok(Self {
            consumer,
            topic: topic.to_string(),
        })
    }

    /// 替换不可恢复错误钩子（测试中注入记录型实现）
    pub fn with_fatal_hook(mut self, hook: Arc<dyn FatalHook>) -> Self {
        self.consumer = self.consumer.with_fatal_hook(hook);
        self
    }

    /// 订阅 topic 并在后台任务中启动消费循环
    ///
    /// 订阅成功后立即返回控制句柄，消费者所有权移入后台任务。
    /// 解码失败的消息记录后跳过，不中断消费。
    pub fn start(self, processor: Arc<dyn LogProcessor>) -> Result<ConsumerHandle, ConsumerError> {
        self.consumer.subscribe(&[&self.topic])?;

        info!(topic = %self.topic, "访问日志消费者已启动");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let consumer = self.consumer;
        let task = tokio::spawn(async move {
            consumer
                .start(shutdown_rx, |msg| {
                    let processor = Arc::clone(&processor);
                    async move {
                        if let Err(e) = handle_record(processor.as_ref(), &msg) {
                            warn!(
                                error = %e,
                                topic = %msg.topic,
                                partition = msg.partition,
                                offset = msg.offset,
                                "解码访问日志批次失败，跳过该条消息"
                            );
                        }
                        Ok(())
                    }
                })
                .await;
        });

        Ok(ConsumerHandle {
            shutdown: shutdown_tx,
            task,
        })
    }
}

/// 处理单条 Kafka 消息的完整流程
///
/// 拆分为独立函数而非方法，便于在测试中直接调用而无需构造完整的消费者。
/// 流程：解码批次 -> 按数组顺序逐条交给处理器，返回处理的日志条数。
/// 解码失败原样上抛，由调用方记录并跳过该条消息。
pub fn handle_record(
    processor: &dyn LogProcessor,
    msg: &ConsumerMessage,
) -> Result<usize, MeteringError> {
    let entries = decode_batch(&msg.payload)?;
    let count = entries.len();

    for entry in entries {
        processor.process(entry);
    }

    debug!(
        topic = %msg.topic,
        partition = msg.partition,
        offset = msg.offset,
        entries = count,
        "访问日志批次处理完成"
    );

    Ok(count)
}

/// 消费者控制句柄
///
/// stop 消费 self：句柄只能停止一次，停止后的消费循环永久结束，
/// 重新消费需要构建新的 [`AccessLogConsumer`]。
pub struct ConsumerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ConsumerHandle {
    /// 发出关闭信号并等待消费任务退出
    pub async fn stop(self) -> Result<(), ConsumerError> {
        // 接收端已随任务退出而关闭时 send 才会失败，此时等待即可
        let _ = self.shutdown.send(true);

        self.task
            .await
            .map_err(|e| ConsumerError::Stopped(e.to_string()))?;

        info!("访问日志消费者已停止");
        Ok(())
    }

    /// 消费任务是否仍在运行
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::MockLogProcessor;
    use metering_shared::config::KafkaConfig;

    /// 构造测试用的 ConsumerMessage
    fn make_test_message(payload: serde_json::Value) -> ConsumerMessage {
        ConsumerMessage {
            topic: "gateway.access.log".to_string(),
            partition: 0,
            offset: 1,
            key: None,
            payload: serde_json::to_vec(&payload).expect("序列化测试负载失败"),
            timestamp: Some(1_700_000_000_000),
        }
    }

    fn make_config(brokers: Vec<String>, topic: &str) -> AppConfig {
        AppConfig {
            kafka: KafkaConfig {
                brokers,
                topic: topic.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// 批次内日志按数组顺序逐条分发
    #[test]
    fn test_handle_record_dispatches_in_order() {
        let msg = make_test_message(serde_json::json!([
            {"uri": "/data/activities/1", "consumer": "acme"},
            {"uri": "/data/activities/2", "consumer": "acme"},
            {"uri": "/search/dapps", "consumer": null},
        ]));

        let mut seq = mockall::Sequence::new();
        let mut mock = MockLogProcessor::new();
        for expected in ["/data/activities/1", "/data/activities/2", "/search/dapps"] {
            mock.expect_process()
                .withf(move |entry| entry.uri == expected)
                .times(1)
                .in_sequence(&mut seq)
                .return_const(());
        }

        let count = handle_record(&mock, &msg).expect("处理批次失败");
        assert_eq!(count, 3);
    }

    /// 空批次正常返回 0，不触碰处理器
    #[test]
    fn test_handle_record_empty_batch() {
        let msg = make_test_message(serde_json::json!([]));

        let mut mock = MockLogProcessor::new();
        mock.expect_process().times(0);

        let count = handle_record(&mock, &msg).expect("处理空批次失败");
        assert_eq!(count, 0);
    }

    /// 解码失败时上抛 Decode 错误，处理器一次都不调用
    #[test]
    fn test_handle_record_decode_error_skips_batch() {
        let msg = ConsumerMessage {
            topic: "gateway.access.log".to_string(),
            partition: 0,
            offset: 7,
            key: None,
            payload: b"{not valid json".to_vec(),
            timestamp: None,
        };

        let mut mock = MockLogProcessor::new();
        mock.expect_process().times(0);

        let err = handle_record(&mock, &msg).unwrap_err();
        assert!(matches!(err, MeteringError::Decode(_)));
    }

    /// topic 为空时构建直接失败，不触发任何连接
    #[test]
    fn test_new_rejects_empty_topic() {
        let config = make_config(vec!["localhost:9092".to_string()], "");
        let err = AccessLogConsumer::new(&config).unwrap_err();
        assert!(matches!(err, ConsumerError::Config(_)));

        let config = make_config(vec!["localhost:9092".to_string()], "   ");
        let err = AccessLogConsumer::new(&config).unwrap_err();
        assert!(matches!(err, ConsumerError::Config(_)));
    }

    /// broker 列表为空时由共享层拒绝并透传为配置错误
    #[test]
    fn test_new_rejects_empty_brokers() {
        let config = make_config(vec![], "gateway.access.log");
        let err = AccessLogConsumer::new(&config).unwrap_err();
        assert!(matches!(
            err,
            ConsumerError::Shared(MeteringError::Config(_))
        ));
    }

    /// 完整生命周期：启动 -> 运行 -> 停止
    ///
    /// broker 不可达只是瞬态错误，librdkafka 内部持续重试，
    /// 循环应保持运行直到显式停止，且不触发不可恢复错误钩子。
    #[tokio::test]
    async fn test_start_then_stop_cleanly() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct RecordingHook {
            triggered: AtomicUsize,
        }

        impl FatalHook for RecordingHook {
            fn trigger(&self, _err: &MeteringError) {
                self.triggered.fetch_add(1, Ordering::SeqCst);
            }
        }

        let hook = Arc::new(RecordingHook {
            triggered: AtomicUsize::new(0),
        });

        let hook_ref: Arc<dyn FatalHook> = hook.clone();
        let config = make_config(vec!["localhost:19092".to_string()], "gateway.access.log");
        let consumer = AccessLogConsumer::new(&config)
            .expect("构建消费者失败")
            .with_fatal_hook(hook_ref);

        let processor: Arc<dyn LogProcessor> =
            Arc::new(|_entry: metering_shared::access_log::AccessLogEntry| {});
        let handle = consumer.start(processor).expect("启动消费者失败");
        assert!(handle.is_running());

        // 留出一次轮询的时间再停止
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        handle.stop().await.expect("停止消费者失败");
        assert_eq!(hook.triggered.load(Ordering::SeqCst), 0);
    }
}
