//! 研究过程事件：用于日志 / 前端展示阶段切换、修复、Todo 更新与协作方调用

use serde::Serialize;

use crate::core::Stage;
use crate::memory::TodoEntry;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResearchEvent {
    /// 正在请求模型
    Thinking { stage: Stage },
    /// 模型回复无法解析，发出修复提示
    Repair { attempt: usize, reason: String },
    /// 得到一个解码后的动作
    ActionDecoded { action: String, think: Option<String> },
    StageChanged { from: Stage, to: Stage },
    TopicSet { topic: String },
    TodoUpdated { entries: Vec<TodoEntry> },
    /// 外部协作方调用（tool_use / search / visit / write_file / coding）
    CollaboratorCall {
        action: String,
        ok: bool,
        duration_ms: u64,
    },
    Finished { success: bool },
    Error { text: String },
}

pub(crate) fn send_event(
    tx: &Option<tokio::sync::mpsc::UnboundedSender<ResearchEvent>>,
    ev: ResearchEvent,
) {
    if let Some(t) = tx {
        let _ = t.send(ev);
    }
}
