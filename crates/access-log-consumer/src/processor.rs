//! 访问日志处理器
//!
//! 定义消费循环与业务处理之间的接缝 `LogProcessor`，并提供默认的
//! RU 计量实现：按 URI 族路由到计算器，计费结果累加到用量账本。

use dashmap::DashMap;
use metering_shared::access_log::AccessLogEntry;
use ru_engine::{CalculatorRegistry, split_family};
use tracing::debug;

/// 未认证请求在账本中的聚合键
pub const ANONYMOUS_CONSUMER: &str = "anonymous";

/// 单条访问日志的处理接缝
///
/// 消费循环对每条解码出的日志同步调用一次 `process`，按批次内
/// 数组顺序逐条进行。实现方保证不做无限阻塞操作；处理内部的失败
/// 由实现方自行消化，消费循环不感知也不回滚。
#[cfg_attr(test, mockall::automock)]
pub trait LogProcessor: Send + Sync {
    fn process(&self, entry: AccessLogEntry);
}

/// 闭包可直接用作处理器，便于测试与轻量场景
impl<F> LogProcessor for F
where
    F: Fn(AccessLogEntry) + Send + Sync,
{
    fn process(&self, entry: AccessLogEntry) {
        self(entry)
    }
}

// ---------------------------------------------------------------------------
// UsageLedger
// ---------------------------------------------------------------------------

/// 按调用方聚合的 RU 用量账本
///
/// 使用 DashMap 而非 HashMap + RwLock，消费线程的累加与
/// 外部的快照读取可以并发进行。当前为内存实现，进程退出即清零。
pub struct UsageLedger {
    totals: DashMap<String, i64>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self {
            totals: DashMap::new(),
        }
    }

    /// 为调用方累加 RU 用量，未认证流量聚合到 [`ANONYMOUS_CONSUMER`]
    pub fn record(&self, consumer: Option<&str>, ru: i64) {
        let key = consumer.unwrap_or(ANONYMOUS_CONSUMER);
        *self.totals.entry(key.to_string()).or_insert(0) += ru;
    }

    /// 查询单个调用方的累计用量，未出现过的调用方计 0
    pub fn total_for(&self, consumer: &str) -> i64 {
        self.totals.get(consumer).map(|v| *v).unwrap_or(0)
    }

    /// 导出全部调用方的用量快照
    pub fn snapshot(&self) -> Vec<(String, i64)> {
        self.totals
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect()
    }
}

impl Default for UsageLedger {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// RuMeteringProcessor
// ---------------------------------------------------------------------------

/// 默认处理器：按 URI 计算 RU 成本并记入用量账本
pub struct RuMeteringProcessor {
    registry: CalculatorRegistry,
    ledger: UsageLedger,
}

impl RuMeteringProcessor {
    pub fn new(registry: CalculatorRegistry) -> Self {
        Self {
            registry,
            ledger: UsageLedger::new(),
        }
    }

    /// 处理器持有的用量账本，供停机时导出汇总
    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    /// 计算单条日志的 RU 成本
    ///
    /// URI 首段决定 API 族。未注册的族与缺少族前缀的 URI 计 0，
    /// 记一条 debug 日志而不视为处理失败。
    fn cost_of(&self, uri: &str) -> i64 {
        match split_family(uri) {
            Some((family, rest)) => match self.registry.resolve(family) {
                Some(calc) => calc.cost(rest),
                None => {
                    debug!(family, uri, "未注册的 API 族，计 0 RU");
                    0
                }
            },
            None => {
                debug!(uri, "URI 缺少族前缀，计 0 RU");
                0
            }
        }
    }
}

impl LogProcessor for RuMeteringProcessor {
    fn process(&self, entry: AccessLogEntry) {
        let ru = self.cost_of(&entry.uri);
        self.ledger.record(entry.consumer.as_deref(), ru);

        debug!(
            uri = %entry.uri,
            consumer = entry.consumer.as_deref().unwrap_or(ANONYMOUS_CONSUMER),
            status = entry.status,
            ru,
            "访问日志已计量"
        );
    }
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------
