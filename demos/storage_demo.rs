//! storage_demo — ChatStorage 基本用法演示
//!
//! ## 演示内容
//!
//! 1. 从环境变量（或 `.env`）加载配置，未设置时使用内存后端
//! 2. 会话 / 摘要 / 主题的读写与前缀隔离
//! 3. 过期会话清理与占用统计
//!
//! 运行：
//!   cargo run --example storage_demo
//!   AGUI_STORAGE_PATH=/tmp/agui-demo/storage.json cargo run --example storage_demo

use agui_storage::prelude::*;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = StorageConfig::from_env()?;
    println!("⚙️  配置: prefix={:?} backend={:?}", config.prefix, config.backend);

    let storage = ChatStorage::from_config(&config)?;

    // ── 会话与摘要 ──
    let old_updated = (Utc::now() - ChronoDuration::days(60)).to_rfc3339();
    let new_updated = Utc::now().to_rfc3339();

    storage
        .set_conversation(
            "demo-old",
            &json!({"title": "两个月前的对话", "updatedAt": old_updated}),
        )
        .await?;
    storage
        .set_conversation_summary("demo-old", &json!({"text": "很久以前的摘要"}))
        .await?;
    storage
        .set_conversation(
            "demo-new",
            &json!({"title": "刚刚的对话", "updatedAt": new_updated}),
        )
        .await?;
    storage.set_theme(&json!({"mode": "dark"})).await?;

    println!("\n📋 当前 key:");
    for key in storage.keys().await {
        println!("  • {key}");
    }

    let theme: Option<Value> = storage.get_theme().await;
    println!("\n🎨 主题: {}", theme.unwrap_or(Value::Null));

    // ── 清理 ──
    let report = storage.cleanup_default().await;
    println!(
        "\n🧹 清理: 检查 {} 个会话，删除 {:?}，跳过 {}",
        report.scanned, report.removed, report.skipped
    );

    // ── 统计 ──
    let stats = storage.storage_stats().await;
    println!(
        "\n📊 占用: {} / {} 字节，共 {} 个 key",
        stats.used, stats.total, stats.count
    );

    Ok(())
}
