//! Mock / 脚本回放 LLM 客户端（用于测试与无 API Key 的本地运行）
//!
//! - MockLlmClient：取最后一条 User 消息，回显为合法的 `answer` 动作。
//! - ScriptedLlmClient：按顺序回放预设回复，并记录每次调用收到的完整消息序列。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::memory::{Message, Role};

/// Mock 客户端：以 answer 动作回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        let reply = serde_json::json!({
            "action": "answer",
            "think": "mock backend echoes the latest input",
            "answer": format!("Echo from Mock: {}", last_user),
            "reference": []
        });
        Ok(reply.to_string())
    }
}

/// 脚本回放客户端：每次调用弹出一条预设回复（Ok 为模型文本，Err 为后端故障）
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 追加一条正常回复
    pub fn push_reply(&self, reply: impl Into<String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Ok(reply.into()));
        }
    }

    /// 追加一次后端故障
    pub fn push_failure(&self, error: impl Into<String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Err(error.into()));
        }
    }

    /// 所有调用收到的消息序列（按调用顺序）
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// 第 n 次调用的本轮提示（消息序列中的最后一条）
    pub fn prompt_of_call(&self, n: usize) -> Option<String> {
        self.calls
            .lock()
            .ok()
            .and_then(|c| c.get(n).and_then(|m| m.last()).map(|m| m.content.clone()))
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        self.replies
            .lock()
            .map_err(|e| e.to_string())?
            .pop_front()
            .unwrap_or_else(|| Err("scripted backend has no more replies".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_replies_with_answer_action() {
        let reply = MockLlmClient
            .complete(&[Message::system("sys"), Message::user("hello")])
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(value["action"], "answer");
        assert!(value["answer"].as_str().unwrap().contains("hello"));
    }

    #[tokio::test]
    async fn test_scripted_replays_in_order_and_records_calls() {
        let client = ScriptedLlmClient::new(["first", "second"]);
        client.push_failure("boom");

        assert_eq!(client.complete(&[Message::user("a")]).await.unwrap(), "first");
        assert_eq!(client.complete(&[Message::user("b")]).await.unwrap(), "second");
        assert_eq!(client.complete(&[Message::user("c")]).await.unwrap_err(), "boom");
        assert!(client.complete(&[Message::user("d")]).await.is_err());

        assert_eq!(client.call_count(), 4);
        assert_eq!(client.prompt_of_call(1).as_deref(), Some("b"));
    }
}
