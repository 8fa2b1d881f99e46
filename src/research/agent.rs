//! 研究会话 Agent
//!
//! 一个会话的全部状态：id、阶段状态机、研究主题、Todo 列表、历史存储与工具目录快照。
//! `submit` 对一条输入完成一次逻辑回合：按当前阶段渲染系统提示词，以该阶段的蒸馏历史为上下文
//! 调用 TurnExecutor，成功后把整回合写入原始与蒸馏历史。

use std::sync::Arc;

use crate::core::{ResearchError, Stage, StageMachine};
use crate::memory::{HistoryStore, TodoList};
use crate::research::action::DecodedAction;
use crate::research::executor::{TurnExecutor, TurnRequest};
use crate::research::prompt::{render_system_prompt, PromptContext};

pub struct ResearchAgent {
    id: String,
    stage: StageMachine,
    topic: Option<String>,
    todos: TodoList,
    history: HistoryStore,
    /// 工具目录快照（创建会话时生成，之后只读）
    tools: Arc<str>,
    executor: Arc<TurnExecutor>,
    /// 运行暂停时尚未交给模型的系统消息
    pending: Option<String>,
}

impl ResearchAgent {
    pub fn new(id: impl Into<String>, executor: Arc<TurnExecutor>, tools: Arc<str>) -> Self {
        Self {
            id: id.into(),
            stage: StageMachine::new(),
            topic: None,
            todos: TodoList::new(),
            history: HistoryStore::new(),
            tools,
            executor,
            pending: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn stage(&self) -> Stage {
        self.stage.current()
    }

    /// 切换阶段，返回切换前的阶段
    pub fn set_stage(&mut self, target: Stage) -> Stage {
        self.stage.transition(target)
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn set_topic(&mut self, topic: impl Into<String>) {
        self.topic = Some(topic.into());
    }

    pub fn todos(&self) -> &TodoList {
        &self.todos
    }

    pub fn todos_mut(&mut self) -> &mut TodoList {
        &mut self.todos
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn tools(&self) -> &str {
        &self.tools
    }

    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn set_pending(&mut self, text: impl Into<String>) {
        self.pending = Some(text.into());
    }

    pub fn take_pending(&mut self) -> Option<String> {
        self.pending.take()
    }

    /// 当前阶段下的系统提示词（每轮重新生成）
    pub fn system_prompt(&self) -> String {
        render_system_prompt(&PromptContext::new(self.stage(), &self.tools))
    }

    /// 提交一条输入并得到模型的下一个动作。
    ///
    /// 回合记入发起时的阶段；执行失败时两类历史都不写入。
    pub async fn submit(&mut self, input: &str, is_system: bool) -> Result<DecodedAction, ResearchError> {
        let stage = self.stage();
        let system_prompt = self.system_prompt();
        let outcome = self
            .executor
            .execute(TurnRequest {
                input,
                is_system,
                context: self.history.distilled_for(stage),
                system_prompt: &system_prompt,
            })
            .await?;

        if outcome.attempts > 1 {
            tracing::info!(session = %self.id, attempts = outcome.attempts, "turn repaired");
        }
        self.history
            .record_turn(stage, &outcome.prompt, &outcome.decoded.action, &outcome.decoded.raw);
        Ok(outcome.decoded)
    }
}
