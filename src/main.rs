//! deep-research：控制台深度研究助手
//!
//! 入口：加载配置、初始化日志、选择 LLM 后端，从 stdin 读取研究需求并运行分发循环；
//! 退出时把会话原始历史导出到工作区。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use deep_research::agent::{create_llm_from_config, create_research_components};
use deep_research::config::{load_config, AppConfig};
use deep_research::integrations::{ConsoleChannel, UserChannel};
use deep_research::observability;
use deep_research::research::DispatchOutcome;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if let Ok(json) = serde_json::to_string(&event) {
                tracing::debug!(event = %json, "research event");
            }
        }
    });

    let llm = create_llm_from_config(&cfg);
    let components = create_research_components(&cfg, llm, Some(event_tx));
    let host = components.host();
    let channel = Arc::new(ConsoleChannel::new());
    let dispatcher = components.dispatcher(channel.clone());

    let cancel = dispatcher.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    channel
        .send_text("请输入你的研究需求：")
        .await
        .map_err(anyhow::Error::msg)?;
    let Some(request) = channel.next_input().await else {
        return Ok(());
    };

    let (id, mut outcome) = host
        .start(&dispatcher, &request)
        .await
        .context("Failed to start research session")?;

    loop {
        match outcome {
            DispatchOutcome::ChannelClosed | DispatchOutcome::Cancelled => break,
            DispatchOutcome::Finished { success, .. } => {
                tracing::info!(session = %id, success, "research run finished, waiting for follow-up");
            }
            _ => {}
        }
        let Some(input) = channel.next_input().await else {
            break;
        };
        outcome = host
            .resume(&id, &dispatcher, &input)
            .await
            .context("Failed to resume research session")?;
    }

    let raw = host.export_raw(&id).await.context("Failed to export history")?;
    let path = components.workspace.join(format!("{}.json", id));
    let body = serde_json::to_string_pretty(&raw).context("Failed to serialize history")?;
    std::fs::write(&path, body).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("\n会话 {} 的原始历史已导出到 {}", id, path.display());

    Ok(())
}
