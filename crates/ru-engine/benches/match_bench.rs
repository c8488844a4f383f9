//! 规则表匹配性能基准测试
//!
//! 针对规则表的首条命中、末条命中、未命中以及完整注册表路由场景做细粒度测试。

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ru_engine::{CalculatorRegistry, RuleTable, split_family};
use std::hint::black_box;

/// 内置 data 族同构的测试规则表
fn create_test_table() -> RuleTable {
    RuleTable::new(&[
        (r"^/accounts/activities.*$", 10),
        (r"^/accounts/.*/activities.*$", 5),
        (r"^/accounts/.*/profiles.*$", 2),
        (r"^/mastodon/.*/activities.*$", 2),
        (r"^/networks/.*/activities.*$", 2),
        (r"^/platforms/.*/activities.*$", 2),
        (r"^/activities/.*$", 1),
    ])
    .unwrap()
}

/// 规则表命中位置基准
fn bench_table_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_match");

    let table = create_test_table();

    group.bench_function("first_rule_hit", |b| {
        b.iter(|| table.match_cost(black_box("/accounts/activities?cursor=abc")))
    });

    group.bench_function("mid_rule_hit", |b| {
        b.iter(|| table.match_cost(black_box("/networks/eth/activities")))
    });

    group.bench_function("last_rule_hit", |b| {
        b.iter(|| table.match_cost(black_box("/activities/42")))
    });

    group.bench_function("miss", |b| {
        b.iter(|| table.match_cost(black_box("/profiles/123/preferences")))
    });

    group.finish();
}

/// 不同规则表规模下末条命中的性能
fn bench_table_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_scaling");

    for size in [5, 10, 50, 100].iter() {
        let patterns: Vec<String> = (0..*size)
            .map(|i| format!(r"^/resource-{i}/.*$"))
            .collect();
        let entries: Vec<(&str, i64)> = patterns.iter().map(|p| (p.as_str(), 1)).collect();
        let table = RuleTable::new(&entries).unwrap();
        let uri = format!("/resource-{}/item", size - 1);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| table.match_cost(black_box(uri.as_str())))
        });
    }

    group.finish();
}

/// 完整路由链路基准：拆分族前缀 -> 查找计算器 -> 计算成本
fn bench_registry_route(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_route");

    let registry = CalculatorRegistry::with_defaults().unwrap();

    let route = |uri: &str| -> i64 {
        match split_family(uri) {
            Some((family, rest)) => registry.resolve(family).map_or(0, |calc| calc.cost(rest)),
            None => 0,
        }
    };

    group.bench_function("data_uri", |b| {
        b.iter(|| route(black_box("/data/accounts/123/activities/feed")))
    });

    group.bench_function("search_uri", |b| {
        b.iter(|| route(black_box("/search/v2/activities/42")))
    });

    group.bench_function("unknown_family", |b| {
        b.iter(|| route(black_box("/payments/orders/42")))
    });

    group.finish();
}

/// 混合流量基准：模拟一批典型网关访问日志的计费吞吐
fn bench_mixed_workload(c: &mut Criterion) {
    let registry = CalculatorRegistry::with_defaults().unwrap();

    let uris = [
        "/data/accounts/activities",
        "/data/accounts/123/activities/feed",
        "/data/activities/42",
        "/data/accounts/123/profiles",
        "/search/v2/recent-activities?days=7",
        "/search/activities?limit=100",
        "/search/v2/activities/42",
        "/search/suggestions/defi",
        "/payments/orders/42",
        "/data/unknown/path",
    ];

    c.bench_function("mixed_workload_10_uris", |b| {
        b.iter(|| {
            let mut total = 0i64;
            for uri in uris.iter() {
                if let Some((family, rest)) = split_family(black_box(uri)) {
                    if let Some(calc) = registry.resolve(family) {
                        total += calc.cost(rest);
                    }
                }
            }
            total
        })
    });
}

criterion_group!(
    benches,
    bench_table_match,
    bench_table_scaling,
    bench_registry_route,
    bench_mixed_workload,
);

criterion_main!(benches);
