//! 会话存储
//!
//! 由宿主显式持有（不使用全局单例），按会话 id 存取 SessionHandle。
//! 每个会话包在 `tokio::sync::Mutex` 中：一次分发运行全程持锁，保证同一会话同时只有一个回合在执行；
//! 不同会话互不阻塞。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::research::ResearchAgent;

/// 会话句柄
pub type SessionHandle = Arc<Mutex<ResearchAgent>>;

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    /// 放入会话并返回其句柄；同 id 的旧会话被替换
    pub async fn put(&self, agent: ResearchAgent) -> SessionHandle {
        let id = agent.id().to_string();
        let handle = Arc::new(Mutex::new(agent));
        if self
            .sessions
            .write()
            .await
            .insert(id.clone(), handle.clone())
            .is_some()
        {
            tracing::warn!(session = %id, "session replaced");
        }
        handle
    }

    pub async fn remove(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// 所有会话 id（排序后返回）
    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
