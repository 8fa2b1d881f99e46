//! 动作分发循环
//!
//! 蹦床式外层循环：提交输入 -> 得到动作 -> 执行动作效果 -> 计算下一轮输入。
//! 下一轮输入有三种来源：合成的系统确认消息、外部协作方返回的结果、用户的新回复。
//! 循环在以下情况结束：finished、等待用户超时或通道关闭、不可恢复的错误、显式取消、步数上限。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::core::{RecoveryAction, RecoveryEngine, ResearchError, Stage};
use crate::integrations::UserChannel;
use crate::research::action::{Action, Reference};
use crate::research::catalog;
use crate::research::events::{send_event, ResearchEvent};
use crate::research::executor::compose_prompt;
use crate::research::ResearchAgent;
use crate::tools::{CodeSandbox, FileSink, PageFetcher, ToolExecutor, WebSearch};

/// 默认等待用户回复的时间
pub const DEFAULT_REPLY_TIMEOUT_SECS: u64 = 300;

/// 一次分发运行的结果
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// 模型发出 finished
    Finished { result: String, success: bool },
    /// 等待用户回复超时；会话可按 id 继续
    TimedOut,
    /// 用户通道已关闭
    ChannelClosed,
    Cancelled,
    /// 达到单次运行的最大步数
    StepLimit,
    /// 不可恢复的错误（后端故障、修复耗尽、未知动作）
    Failed(String),
}

impl DispatchOutcome {
    /// 会话能否以新的用户输入继续
    pub fn is_resumable(&self) -> bool {
        !matches!(self, DispatchOutcome::Cancelled)
    }
}

/// 单个动作执行后的去向
enum Next {
    /// 以系统消息作为下一轮输入
    System(String),
    /// 等待用户回复
    AwaitUser,
    Stop(DispatchOutcome),
}

pub struct ActionDispatcher {
    channel: Arc<dyn UserChannel>,
    tools: Option<Arc<ToolExecutor>>,
    search: Option<Arc<dyn WebSearch>>,
    fetcher: Option<Arc<dyn PageFetcher>>,
    file_sink: Option<Arc<dyn FileSink>>,
    sandbox: Option<Arc<dyn CodeSandbox>>,
    recovery: RecoveryEngine,
    reply_timeout: Duration,
    /// 单次运行最多提交的回合数；None 表示不限
    max_steps: Option<usize>,
    cancel: CancellationToken,
    event_tx: Option<UnboundedSender<ResearchEvent>>,
}

impl ActionDispatcher {
    pub fn new(channel: Arc<dyn UserChannel>) -> Self {
        Self {
            channel,
            tools: None,
            search: None,
            fetcher: None,
            file_sink: None,
            sandbox: None,
            recovery: RecoveryEngine::new(),
            reply_timeout: Duration::from_secs(DEFAULT_REPLY_TIMEOUT_SECS),
            max_steps: None,
            cancel: CancellationToken::new(),
            event_tx: None,
        }
    }

    pub fn with_tools(mut self, tools: Arc<ToolExecutor>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_search(mut self, search: Arc<dyn WebSearch>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_file_sink(mut self, sink: Arc<dyn FileSink>) -> Self {
        self.file_sink = Some(sink);
        self
    }

    pub fn with_sandbox(mut self, sandbox: Arc<dyn CodeSandbox>) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    pub fn with_reply_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }

    /// 0 表示不限步数
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = (max_steps > 0).then_some(max_steps);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<ResearchEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 从一条输入开始运行分发循环，直到循环结束。
    ///
    /// 上一次运行因步数上限暂停时留下的系统消息，会以系统标记拼在本次输入之前。
    pub async fn run(&self, agent: &mut ResearchAgent, input: &str, is_system: bool) -> DispatchOutcome {
        if self.cancel.is_cancelled() {
            return DispatchOutcome::Cancelled;
        }
        let mut input = match agent.take_pending() {
            Some(pending) => format!("{}\n\n{}", compose_prompt(&pending, true), input),
            None => input.to_string(),
        };
        let mut is_system = is_system;
        let mut steps = 0usize;

        loop {
            if self.cancel.is_cancelled() {
                return DispatchOutcome::Cancelled;
            }
            steps += 1;

            send_event(&self.event_tx, ResearchEvent::Thinking { stage: agent.stage() });
            let submitted = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return DispatchOutcome::Cancelled,
                r = agent.submit(&input, is_system) => r,
            };
            let action = match submitted {
                Ok(decoded) => decoded.action,
                Err(e) => return self.fail(agent, e).await,
            };

            send_event(
                &self.event_tx,
                ResearchEvent::ActionDecoded {
                    action: action.name().to_string(),
                    think: action.think().map(str::to_string),
                },
            );

            // 步数上限在动作生效后检查：已算出的下一轮输入留给会话，继续时再交给模型
            let limit_reached = self.max_steps.is_some_and(|max| steps >= max);
            match self.apply(agent, action).await {
                Next::System(text) if limit_reached => {
                    agent.set_pending(text);
                    return self.step_limit(agent, steps).await;
                }
                Next::AwaitUser if limit_reached => return self.step_limit(agent, steps).await,
                Next::System(text) => {
                    input = text;
                    is_system = true;
                }
                Next::AwaitUser => match self.await_user(agent).await {
                    Ok(reply) => {
                        input = reply;
                        is_system = false;
                    }
                    Err(outcome) => return outcome,
                },
                Next::Stop(outcome) => return outcome,
            }
        }
    }

    async fn step_limit(&self, agent: &ResearchAgent, steps: usize) -> DispatchOutcome {
        tracing::warn!(session = %agent.id(), steps, "dispatch step limit reached");
        self.notify(&format!(
            "本次运行已达到 {steps} 步上限，已暂停。回复任意内容可继续（会话 {}）。",
            agent.id()
        ))
        .await;
        DispatchOutcome::StepLimit
    }

    /// 执行单个动作的效果并给出下一轮输入
    async fn apply(&self, agent: &mut ResearchAgent, action: Action) -> Next {
        let stage = agent.stage();
        if !matches!(action, Action::Unknown { .. }) && !catalog::is_legal(action.name(), stage) {
            tracing::warn!(action = action.name(), stage = %stage, "action outside its stages");
        }

        match action {
            Action::Ask { question, .. } => {
                self.notify(&question).await;
                Next::AwaitUser
            }
            Action::Answer { answer, reference, .. } => {
                self.notify(&format!("{}{}", answer, format_references(&reference)))
                    .await;
                Next::AwaitUser
            }
            Action::SetStage { stage: target } => {
                let from = agent.set_stage(target);
                send_event(&self.event_tx, ResearchEvent::StageChanged { from, to: target });
                Next::System(stage_ack(target))
            }
            Action::SetResearchTopic { research_topic } => {
                tracing::info!(session = %agent.id(), topic = %research_topic, "research topic set");
                agent.set_topic(research_topic.clone());
                send_event(
                    &self.event_tx,
                    ResearchEvent::TopicSet {
                        topic: research_topic.clone(),
                    },
                );
                Next::System(format!("研究主题已设置为：{}", research_topic))
            }
            Action::SetTodoList { todo_list } => {
                for step in todo_list {
                    agent.todos_mut().add_step(step);
                }
                self.todo_event(agent);
                Next::System(format!("Todo 列表已更新：\n{}", agent.todos().render()))
            }
            Action::SetTodoStatus { id, status, reason } => {
                if agent.todos_mut().set_status(&id, status, reason) {
                    self.todo_event(agent);
                    Next::System(format!("Todo [{}] 状态已更新为 {}", id, status))
                } else {
                    self.correctable(ResearchError::TodoNotFound(id))
                }
            }
            Action::ToolUse { tool_use, .. } => {
                let Some(tools) = &self.tools else {
                    return self.unavailable("tool_use");
                };
                let start = Instant::now();
                let batch = tools.execute_batch(&tool_use).await;
                self.collaborator_event("tool_use", batch.failed == 0, start);
                Next::System(batch.results.to_string())
            }
            Action::Search { search_request, .. } => {
                let Some(search) = &self.search else {
                    return self.unavailable("search");
                };
                let start = Instant::now();
                let result = search.search(&search_request).await;
                self.collaborator_event("search", result.is_ok(), start);
                match result {
                    Ok(hits) => Next::System(
                        serde_json::to_string(&hits).unwrap_or_else(|e| format!("Error: {}", e)),
                    ),
                    Err(e) => self.correctable(ResearchError::Collaborator(format!("search: {e}"))),
                }
            }
            Action::Visit { url, .. } => {
                let Some(fetcher) = &self.fetcher else {
                    return self.unavailable("visit");
                };
                let start = Instant::now();
                let result = fetcher.fetch(&url).await;
                self.collaborator_event("visit", result.is_ok(), start);
                match result {
                    Ok(content) => Next::System(content),
                    Err(e) => self.correctable(ResearchError::Collaborator(format!("visit {url}: {e}"))),
                }
            }
            Action::WriteFile { path, content, .. } => {
                let Some(sink) = &self.file_sink else {
                    return self.unavailable("write_file");
                };
                let start = Instant::now();
                let result = sink.write(&path, &content).await;
                self.collaborator_event("write_file", result.is_ok(), start);
                match result {
                    Ok(ack) => Next::System(ack),
                    Err(e) => self.correctable(ResearchError::Collaborator(format!("write_file {path}: {e}"))),
                }
            }
            Action::Coding { code, .. } => {
                let Some(sandbox) = &self.sandbox else {
                    return self.unavailable("coding");
                };
                let start = Instant::now();
                let result = sandbox.run(&code).await;
                self.collaborator_event("coding", result.is_ok(), start);
                match result {
                    Ok(output) => Next::System(output),
                    Err(e) => self.correctable(ResearchError::Collaborator(format!("coding: {e}"))),
                }
            }
            Action::Finished { result, success, .. } => {
                tracing::info!(session = %agent.id(), success, "research finished");
                self.notify(&result).await;
                send_event(&self.event_tx, ResearchEvent::Finished { success });
                Next::Stop(DispatchOutcome::Finished { result, success })
            }
            Action::Unknown { name } => {
                Next::Stop(self.fail(agent, ResearchError::UnknownAction(name)).await)
            }
        }
    }

    /// 等待用户回复；超时、通道关闭或取消时结束本次运行
    async fn await_user(&self, agent: &ResearchAgent) -> Result<String, DispatchOutcome> {
        let waited = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(DispatchOutcome::Cancelled),
            r = timeout(self.reply_timeout, self.channel.next_input()) => r,
        };
        match waited {
            Ok(Some(reply)) => Ok(reply),
            Ok(None) => {
                tracing::info!(session = %agent.id(), "user channel closed");
                Err(DispatchOutcome::ChannelClosed)
            }
            Err(_) => {
                let err = ResearchError::UserInputTimeout {
                    secs: self.reply_timeout.as_secs(),
                };
                tracing::info!(session = %agent.id(), error = %err, "waiting for user timed out");
                self.notify(&format!(
                    "等待回复超时（{} 秒），研究已暂停。会话 {} 可随时继续。",
                    self.reply_timeout.as_secs(),
                    agent.id()
                ))
                .await;
                Err(DispatchOutcome::TimedOut)
            }
        }
    }

    /// 不可恢复的错误：记录日志、向用户发送通用错误提示并结束循环
    async fn fail(&self, agent: &ResearchAgent, err: ResearchError) -> DispatchOutcome {
        tracing::error!(session = %agent.id(), stage = %agent.stage(), error = %err, "dispatch aborted");
        send_event(&self.event_tx, ResearchEvent::Error { text: err.to_string() });
        self.notify("研究过程中出现错误，本次运行已终止，请稍后重试。").await;
        DispatchOutcome::Failed(err.to_string())
    }

    /// 可纠正的错误：以系统消息告知模型
    fn correctable(&self, err: ResearchError) -> Next {
        tracing::warn!(error = %err, "reporting error back to model");
        match self.recovery.handle(&err) {
            RecoveryAction::NotifyModel(text) | RecoveryAction::RetryWithPrompt(text) => Next::System(text),
            RecoveryAction::Abort => Next::System(format!("Error: {}", err)),
        }
    }

    fn unavailable(&self, action: &str) -> Next {
        Next::System(format!(
            "当前环境没有配置 {action} 的执行方，该动作无法执行，请改用其它动作。"
        ))
    }

    async fn notify(&self, text: &str) {
        if let Err(e) = self.channel.send_text(text).await {
            tracing::warn!(error = %e, "failed to send text to user");
        }
    }

    fn todo_event(&self, agent: &ResearchAgent) {
        send_event(
            &self.event_tx,
            ResearchEvent::TodoUpdated {
                entries: agent.todos().entries().to_vec(),
            },
        );
    }

    fn collaborator_event(&self, action: &str, ok: bool, start: Instant) {
        send_event(
            &self.event_tx,
            ResearchEvent::CollaboratorCall {
                action: action.to_string(),
                ok,
                duration_ms: start.elapsed().as_millis() as u64,
            },
        );
    }
}

fn stage_ack(stage: Stage) -> String {
    format!("已进入 {} ({}) 阶段", stage, stage.label())
}

/// 参考资料渲染为编号列表，追加在回答之后
pub fn format_references(references: &[Reference]) -> String {
    if references.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = references
        .iter()
        .enumerate()
        .map(|(i, r)| match (r.title.trim().is_empty(), r.url.trim().is_empty()) {
            (false, false) => format!("[{}] {} - {}", i + 1, r.title.trim(), r.url.trim()),
            (true, false) => format!("[{}] {}", i + 1, r.url.trim()),
            _ => format!("[{}] {}", i + 1, r.title.trim()),
        })
        .collect();
    format!("\n\n参考资料：\n{}", lines.join("\n"))
}
