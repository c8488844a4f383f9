//! RU 计算器
//!
//! 将规则表包装为面向单个 API 族的成本计算入口。

use crate::rules::RuleTable;

/// 单个 API 族的 RU 成本计算器
///
/// 匹配是只读操作，`&self` 即可并发调用。未命中任何规则时计 0 RU，
/// 调用方无需处理失败分支。
#[derive(Debug)]
pub struct RuCalculator {
    table: RuleTable,
}

impl RuCalculator {
    pub fn new(table: RuleTable) -> Self {
        Self { table }
    }

    /// 计算 URI 的 RU 成本
    pub fn cost(&self, uri: &str) -> i64 {
        self.table.match_cost(uri).unwrap_or(0)
    }
}
