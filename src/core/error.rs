//! 研究会话错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 ResearchError 决定 RetryWithPrompt / NotifyModel / Abort。

use thiserror::Error;

/// 研究会话运行过程中可能出现的错误（协议解析、未知动作、超时、后端故障等）
#[derive(Error, Debug)]
pub enum ResearchError {
    /// 模型回复在去除代码块标记后仍不是合法的 JSON 动作
    #[error("Protocol decode error: {0}")]
    ProtocolDecode(String),

    /// 修复协议达到最大尝试次数仍未得到合法 JSON
    #[error("Protocol exhausted after {attempts} attempts: {last_error}")]
    ProtocolExhausted { attempts: usize, last_error: String },

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Todo not found: {0}")]
    TodoNotFound(String),

    #[error("No user reply within {secs}s")]
    UserInputTimeout { secs: u64 },

    /// 网络 / 后端层面的故障，本层不重试
    #[error("Backend call failed: {0}")]
    Backend(String),

    /// 外部协作方（工具、搜索、抓取、文件）返回的错误
    #[error("Collaborator failed: {0}")]
    Collaborator(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// 会话已有一次分发运行在进行中
    #[error("Session busy: {0}")]
    SessionBusy(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Path escape attempt: {0}")]
    PathEscape(String),
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone)]
pub enum RecoveryAction {
    /// 以合成提示重新请求模型（如 JSON 格式错误）
    RetryWithPrompt(String),
    /// 以系统消息告知模型，由模型自行纠正（如 Todo ID 不存在）
    NotifyModel(String),
    /// 终止当前分发循环
    Abort,
}
