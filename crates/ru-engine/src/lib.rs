//! RU 计费规则引擎
//!
//! 提供按 API 族划分的 URI 计费规则匹配能力：
//! - 规则表按声明顺序匹配，首条命中即决出
//! - 计算器对未命中的请求计 0 RU，永不失败
//! - 注册表按 URI 首段路由到对应 API 族的计算器

pub mod calculator;
pub mod error;
pub mod registry;
pub mod rules;

pub use calculator::RuCalculator;
pub use error::{Result, RuError};
pub use registry::{CalculatorRegistry, families, split_family};
pub use rules::{RuRule, RuleTable};
