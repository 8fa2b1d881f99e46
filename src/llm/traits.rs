//! LLM 客户端抽象
//!
//! 后端对每次调用都是无状态的：调用方传入完整的消息序列（system + 蒸馏上下文 + 本轮提示），
//! 后端返回纯文本，文本应当是一个 JSON 对象，但不做保证。

use async_trait::async_trait;

use crate::memory::Message;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成，返回模型输出文本
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
