//! 计费规则与规则表
//!
//! 规则表是某个 API 族全部计费规则按声明顺序的集合。匹配严格自上而下，
//! 首条命中即决出，模式重叠时结果由声明顺序唯一确定。

use regex::Regex;

use crate::error::{Result, RuError};

/// 单条计费规则：URI 模式与对应的 RU 成本
#[derive(Debug)]
pub struct RuRule {
    pattern: Regex,
    cost: i64,
}

impl RuRule {
    /// 编译模式并构建规则
    ///
    /// 模式非法或成本为负时返回错误，保证进入规则表的规则全部可用。
    pub fn new(pattern: &str, cost: i64) -> Result<Self> {
        if cost < 0 {
            return Err(RuError::NegativeCost {
                pattern: pattern.to_string(),
                cost,
            });
        }

        let regex = Regex::new(pattern).map_err(|e| RuError::InvalidPattern {
            pattern: pattern.to_string(),
            source: e,
        })?;

        Ok(Self {
            pattern: regex,
            cost,
        })
    }

    /// 规则的原始模式串
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// 规则命中时计入的 RU 成本
    pub fn cost(&self) -> i64 {
        self.cost
    }

    /// 判断 URI 是否命中该规则
    pub fn matches(&self, uri: &str) -> bool {
        self.pattern.is_match(uri)
    }
}

/// 按声明顺序排列的计费规则表
///
/// 构建完成后只读，可在线程间共享。
#[derive(Debug, Default)]
pub struct RuleTable {
    rules: Vec<RuRule>,
}

impl RuleTable {
    /// 从 (模式, 成本) 序列构建规则表，保持声明顺序
    pub fn new(entries: &[(&str, i64)]) -> Result<Self> {
        let mut rules = Vec::with_capacity(entries.len());
        for (pattern, cost) in entries {
            rules.push(RuRule::new(pattern, *cost)?);
        }
        Ok(Self { rules })
    }

    /// 自上而下匹配 URI，返回首条命中规则的成本
    pub fn match_cost(&self, uri: &str) -> Option<i64> {
        self.rules.iter().find(|r| r.matches(uri)).map(RuRule::cost)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
