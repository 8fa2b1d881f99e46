//! 错误恢复引擎
//!
//! 根据 ResearchError 类型返回 RecoveryAction，供修复协议与分发循环决定是重试、告知模型还是终止。

use crate::core::{RecoveryAction, ResearchError};

/// 语义化错误恢复：将错误映射为可执行动作（修复提示 / 告知模型 / 终止）
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    /// 根据错误类型返回建议的恢复动作
    pub fn handle(&self, err: &ResearchError) -> RecoveryAction {
        match err {
            ResearchError::ProtocolDecode(reason) => RecoveryAction::RetryWithPrompt(format!(
                "你上一轮的回复无法被解析为合法的 JSON（{reason}）。\
                请重新发出上一轮的回复：只输出一个可直接解析的 JSON 对象，\
                必须包含字符串字段 \"action\" 以及该 action 要求的全部字段，\
                不要包含注释、Markdown 代码块或任何其它文字。"
            )),
            ResearchError::TodoNotFound(id) => RecoveryAction::NotifyModel(format!(
                "未找到 ID 为 {id} 的 Todo 项，请检查 ID 后重试。"
            )),
            ResearchError::Collaborator(msg) => {
                RecoveryAction::NotifyModel(format!("执行失败: {msg}"))
            }
            ResearchError::PathEscape(path) => {
                RecoveryAction::NotifyModel(format!("路径不允许: {path}"))
            }
            ResearchError::ProtocolExhausted { .. }
            | ResearchError::UnknownAction(_)
            | ResearchError::UserInputTimeout { .. }
            | ResearchError::Backend(_)
            | ResearchError::SessionNotFound(_)
            | ResearchError::SessionBusy(_)
            | ResearchError::Config(_) => RecoveryAction::Abort,
        }
    }
}
