//! 研究会话宿主
//!
//! 持有 SessionStore、共享的 TurnExecutor 与工具目录快照；负责创建会话、按 id 运行 / 继续分发循环、
//! 导出原始历史。同一会话同时只允许一次分发运行，重复进入返回 SessionBusy。

use std::sync::Arc;

use serde_json::Value;

use crate::core::{ResearchError, SessionStore};
use crate::research::{ActionDispatcher, DispatchOutcome, ResearchAgent, TurnExecutor};

pub struct ResearchHost {
    sessions: SessionStore,
    executor: Arc<TurnExecutor>,
    tools: Arc<str>,
}

impl ResearchHost {
    pub fn new(executor: Arc<TurnExecutor>, tools: impl Into<Arc<str>>) -> Self {
        Self {
            sessions: SessionStore::new(),
            executor,
            tools: tools.into(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// 创建新会话并返回其 id（research_<uuid>）
    pub async fn create_session(&self) -> String {
        let id = format!("research_{}", uuid::Uuid::new_v4());
        let agent = ResearchAgent::new(id.clone(), self.executor.clone(), self.tools.clone());
        self.sessions.put(agent).await;
        tracing::info!(session = %id, "research session created");
        id
    }

    /// 新建会话并以用户输入开始运行
    pub async fn start(
        &self,
        dispatcher: &ActionDispatcher,
        input: &str,
    ) -> Result<(String, DispatchOutcome), ResearchError> {
        let id = self.create_session().await;
        let outcome = self.resume(&id, dispatcher, input).await?;
        Ok((id, outcome))
    }

    /// 以一条用户输入继续指定会话
    pub async fn resume(
        &self,
        id: &str,
        dispatcher: &ActionDispatcher,
        input: &str,
    ) -> Result<DispatchOutcome, ResearchError> {
        let handle = self
            .sessions
            .get(id)
            .await
            .ok_or_else(|| ResearchError::SessionNotFound(id.to_string()))?;
        let mut agent = handle
            .try_lock()
            .map_err(|_| ResearchError::SessionBusy(id.to_string()))?;

        let outcome = dispatcher.run(&mut agent, input, false).await;
        tracing::info!(session = %id, stage = %agent.stage(), outcome = ?outcome, "dispatch run ended");
        Ok(outcome)
    }

    /// 导出会话的原始历史；会话正在运行时返回 SessionBusy，不排队等待
    pub async fn export_raw(&self, id: &str) -> Result<Value, ResearchError> {
        let handle = self
            .sessions
            .get(id)
            .await
            .ok_or_else(|| ResearchError::SessionNotFound(id.to_string()))?;
        let agent = handle
            .try_lock()
            .map_err(|_| ResearchError::SessionBusy(id.to_string()))?;
        Ok(agent.history().export_raw())
    }

    pub async fn remove_session(&self, id: &str) -> bool {
        self.sessions.remove(id).await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::UserChannel;
    use crate::llm::ScriptedLlmClient;
    use async_trait::async_trait;

    struct Silent;

    #[async_trait]
    impl UserChannel for Silent {
        async fn send_text(&self, _text: &str) -> Result<(), String> {
            Ok(())
        }

        async fn next_input(&self) -> Option<String> {
            None
        }
    }

    fn host(replies: &[&str]) -> ResearchHost {
        let llm = Arc::new(ScriptedLlmClient::new(replies.iter().copied()));
        ResearchHost::new(Arc::new(TurnExecutor::new(llm, Some(1))), "")
    }

    #[tokio::test]
    async fn test_start_then_resume_by_id() {
        let host = host(&[
            r#"{"action":"ask","think":"","question":"哪个领域？"}"#,
            r#"{"action":"set_research_topic","research_topic":"固态电池"}"#,
            r#"{"action":"ask","think":"","question":"需要多详细？"}"#,
        ]);
        let dispatcher = ActionDispatcher::new(Arc::new(Silent));

        let (id, outcome) = host.start(&dispatcher, "帮我做个调研").await.unwrap();
        assert!(id.starts_with("research_"));
        assert_eq!(outcome, DispatchOutcome::ChannelClosed);

        let outcome = host.resume(&id, &dispatcher, "电池").await.unwrap();
        assert_eq!(outcome, DispatchOutcome::ChannelClosed);

        let handle = host.sessions().get(&id).await.unwrap();
        assert_eq!(handle.lock().await.topic(), Some("固态电池"));

        let raw = host.export_raw(&id).await.unwrap();
        assert_eq!(raw.as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_unknown_and_busy_sessions() {
        let host = host(&[]);
        let dispatcher = ActionDispatcher::new(Arc::new(Silent));
        let err = host.resume("research_missing", &dispatcher, "hi").await.unwrap_err();
        assert!(matches!(err, ResearchError::SessionNotFound(_)));

        let id = host.create_session().await;
        let handle = host.sessions().get(&id).await.unwrap();
        let _guard = handle.lock().await;
        let err = host.resume(&id, &dispatcher, "hi").await.unwrap_err();
        assert!(matches!(err, ResearchError::SessionBusy(_)));
        let err = host.export_raw(&id).await.unwrap_err();
        assert!(matches!(err, ResearchError::SessionBusy(_)));

        drop(_guard);
        assert!(host.export_raw(&id).await.is_ok());
        assert!(host.remove_session(&id).await);
        assert!(host.export_raw(&id).await.is_err());
    }
}
