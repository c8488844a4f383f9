//! 计算器注册表与 URI 族路由
//!
//! 网关按 API 族组织后端路由，URI 首段即族前缀（如 `/data/activities/1`
//! 属于 data 族）。注册表在启动时构建全部内置计算器，运行期只读。

use std::collections::HashMap;

use crate::calculator::RuCalculator;
use crate::error::Result;
use crate::rules::RuleTable;

/// 集中管理所有 API 族前缀，防止字符串散落导致拼写不一致
pub mod families {
    pub const DATA: &str = "data";
    pub const SEARCH: &str = "search";
}

/// data 族内置计费规则
///
/// 声明顺序即匹配优先级：单条资源模式排在宽泛前缀模式之前，
/// 两者同时命中时按单条资源计费。
const DATA_RULES: &[(&str, i64)] = &[
    (r"^/accounts/activities.*$", 10),
    (r"^/accounts/.*/activities.*$", 5),
    (r"^/accounts/.*/profiles.*$", 2),
    (r"^/mastodon/.*/activities.*$", 2),
    (r"^/networks/.*/activities.*$", 2),
    (r"^/platforms/.*/activities.*$", 2),
    (r"^/activities/.*$", 1),
];

/// search 族内置计费规则
const SEARCH_RULES: &[(&str, i64)] = &[
    (r"^/v2/recent-activities.*$", 10),
    (r"^/suggestions/.*$", 2),
    (r"^/dapps.*$", 2),
    (r"^/activities/.*$", 1),
    (r"^/v2/activities/.*$", 1),
    (r"^/activities.*$", 10),
    (r"^/v2/activities.*$", 10),
];

/// 将 URI 拆分为族前缀与族内剩余路径
///
/// `/data/activities/1?limit=10` 拆为 `("data", "/activities/1?limit=10")`，
/// 剩余路径保留前导斜杠与查询串。不以 `/` 开头或首段为空的 URI 返回 None。
pub fn split_family(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix('/')?;
    let cut = rest.find(['/', '?']).unwrap_or(rest.len());
    let family = &rest[..cut];

    if family.is_empty() {
        return None;
    }
    Some((family, &rest[cut..]))
}

/// API 族前缀到 RU 计算器的映射
///
/// 查不到的族返回 None，计 0 还是告警由调用方决策，注册表本身不设默认策略。
pub struct CalculatorRegistry {
    calculators: HashMap<String, RuCalculator>,
}

impl CalculatorRegistry {
    /// 构建空注册表
    pub fn new() -> Self {
        Self {
            calculators: HashMap::new(),
        }
    }

    /// 构建带全部内置 API 族的注册表
    pub fn with_defaults() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(
            families::DATA,
            RuCalculator::new(RuleTable::new(DATA_RULES)?),
        );
        registry.register(
            families::SEARCH,
            RuCalculator::new(RuleTable::new(SEARCH_RULES)?),
        );
        Ok(registry)
    }

    /// 注册或替换某一 API 族的计算器
    pub fn register(&mut self, family: &str, calculator: RuCalculator) {
        self.calculators.insert(family.to_string(), calculator);
    }

    /// 按族前缀查找计算器
    pub fn resolve(&self, family: &str) -> Option<&RuCalculator> {
        self.calculators.get(family)
    }

    /// 已注册的 API 族名称
    pub fn family_names(&self) -> Vec<&str> {
        self.calculators.keys().map(String::as_str).collect()
    }
}

impl Default for CalculatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
