//! 网关访问日志模型与批量解码
//!
//! 网关将一段时间窗口内的访问日志打包为 JSON 数组写入 Kafka，
//! 本模块定义单条日志的数据结构并提供整批解码能力。

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::MeteringError;

/// 缺失 `@timestamp` 字段时的回退时间（Unix 纪元）
fn unix_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// 单条网关访问日志
///
/// 字段与网关落盘的 JSON 格式一一对应。计费只关心 `uri` 和 `consumer`，
/// 其余字段用于日志排查。单个字段缺失时取零值默认而非让整批解码失败，
/// 日志中出现的未知字段直接忽略，保证网关侧新增字段不影响消费端。
#[derive(Debug, Clone, Deserialize)]
pub struct AccessLogEntry {
    /// 客户端 IP
    #[serde(default)]
    pub client_ip: String,
    /// 请求的 Host
    #[serde(default)]
    pub host: String,
    /// 请求 URI（含查询串），RU 计费匹配的输入
    #[serde(default)]
    pub uri: String,
    /// 网关认证出的调用方标识，未认证请求为 null
    #[serde(default)]
    pub consumer: Option<String>,
    /// HTTP 响应状态码
    #[serde(default)]
    pub status: u16,
    /// 日志时间戳（RFC3339，含亚秒精度）
    #[serde(rename = "@timestamp", default = "unix_epoch")]
    pub timestamp: DateTime<Utc>,
    /// 网关路由 ID
    #[serde(default)]
    pub route_id: String,
}

/// 解码一条 Kafka 消息承载的访问日志批次
///
/// 消息体为 UTF-8 编码的 JSON 数组，返回的 Vec 保持数组内顺序。
/// 解码失败返回 [`MeteringError::Decode`]，由调用方决定跳过策略。
pub fn decode_batch(payload: &[u8]) -> Result<Vec<AccessLogEntry>, MeteringError> {
    serde_json::from_slice(payload).map_err(|e| MeteringError::Decode(e.to_string()))
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------
