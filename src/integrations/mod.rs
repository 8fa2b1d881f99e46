//! 外部集成：用户消息通道
//!
//! 分发循环只通过 UserChannel 与用户交互（发送文本、等待下一条输入），
//! 等待超时由调用方用 `tokio::time::timeout` 包裹。

pub mod console;

use async_trait::async_trait;

pub use console::ConsoleChannel;

/// 用户消息通道
#[async_trait]
pub trait UserChannel: Send + Sync {
    /// 向用户发送一段文本
    async fn send_text(&self, text: &str) -> Result<(), String>;

    /// 等待用户的下一条输入；通道关闭时返回 None
    async fn next_input(&self) -> Option<String>;
}
