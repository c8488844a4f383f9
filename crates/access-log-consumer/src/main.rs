//! 网关访问日志 RU 计量服务
//!
//! 消费 Kafka 中的访问日志批次，按 URI 计算 RU 成本并累计到用量账本。

use std::sync::Arc;

use access_log_consumer::consumer::AccessLogConsumer;
use access_log_consumer::processor::RuMeteringProcessor;
use anyhow::Result;
use metering_shared::config::AppConfig;
use metering_shared::observability;
use ru_engine::CalculatorRegistry;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // 统一加载配置：config/ 目录 + METERING_ 环境变量覆盖
    let config = AppConfig::load("access-log-consumer").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    observability::init_tracing(&config.observability)?;

    info!(
        environment = %config.environment,
        "Starting access-log-consumer service..."
    );

    // 构建内置 API 族的计算器注册表与计量处理器
    let registry = CalculatorRegistry::with_defaults()?;
    info!(families = ?registry.family_names(), "RU 计算器注册表已构建");

    let processor = Arc::new(RuMeteringProcessor::new(registry));

    let consumer = AccessLogConsumer::new(&config)?;
    let handle =
        consumer.start(Arc::clone(&processor) as Arc<dyn access_log_consumer::processor::LogProcessor>)?;

    shutdown_signal().await;

    handle.stop().await?;

    // 退出前输出累计用量，便于与计费侧核对
    let mut snapshot = processor.ledger().snapshot();
    snapshot.sort_by(|a, b| b.1.cmp(&a.1));
    for (consumer_id, total_ru) in &snapshot {
        info!(consumer = %consumer_id, total_ru, "累计 RU 用量");
    }

    info!("Service shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
