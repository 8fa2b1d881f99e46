//! 回合执行器：一次逻辑请求 + 自修复协议
//!
//! 组装提示 -> 调用后端 -> 去除代码块标记 -> 解析 JSON 动作。解析失败时把失败的
//! 提示 / 回复追加到本次请求的局部上下文，再以合成的修复提示重新请求，直到得到合法动作
//! 或达到最大修复次数（ProtocolExhausted）。后端故障不在这里重试。

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::core::{RecoveryAction, RecoveryEngine, ResearchError};
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::research::action::{parse_reply, DecodedAction};
use crate::research::events::{send_event, ResearchEvent};

/// 把系统来源的输入包裹为系统标记消息
pub fn compose_prompt(input: &str, is_system: bool) -> String {
    if is_system {
        format!("<system>{}</system>", input)
    } else {
        input.to_string()
    }
}

/// 一次回合请求
#[derive(Debug, Clone, Copy)]
pub struct TurnRequest<'a> {
    pub input: &'a str,
    /// 输入是否来自执行环境（而非用户）
    pub is_system: bool,
    /// 当前阶段的蒸馏历史快照
    pub context: &'a [Message],
    pub system_prompt: &'a str,
}

/// 回合结果：原始发出的提示（不含修复产物）与解码后的动作
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub prompt: String,
    pub decoded: DecodedAction,
    /// 本次回合共调用后端的次数
    pub attempts: usize,
}

pub struct TurnExecutor {
    llm: Arc<dyn LlmClient>,
    recovery: RecoveryEngine,
    /// 最大修复次数；None 表示不设上限
    max_repair_attempts: Option<usize>,
    event_tx: Option<UnboundedSender<ResearchEvent>>,
}

impl TurnExecutor {
    pub fn new(llm: Arc<dyn LlmClient>, max_repair_attempts: Option<usize>) -> Self {
        Self {
            llm,
            recovery: RecoveryEngine::new(),
            max_repair_attempts,
            event_tx: None,
        }
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<ResearchEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn max_repair_attempts(&self) -> Option<usize> {
        self.max_repair_attempts
    }

    /// 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    pub async fn execute(&self, request: TurnRequest<'_>) -> Result<TurnOutcome, ResearchError> {
        let original_prompt = compose_prompt(request.input, request.is_system);
        let mut context = request.context.to_vec();
        let mut prompt = original_prompt.clone();
        let mut attempts = 0;

        loop {
            attempts += 1;

            let mut messages = Vec::with_capacity(context.len() + 2);
            messages.push(Message::system(request.system_prompt));
            messages.extend(context.iter().cloned());
            messages.push(Message::user(prompt.clone()));

            tracing::debug!(attempt = attempts, prompt = %prompt, "sending turn");
            let reply = self
                .llm
                .complete(&messages)
                .await
                .map_err(ResearchError::Backend)?;
            tracing::debug!(reply = %reply, "model reply");

            let err = match parse_reply(&reply) {
                Ok(decoded) => {
                    return Ok(TurnOutcome {
                        prompt: original_prompt,
                        decoded,
                        attempts,
                    })
                }
                Err(err) => err,
            };

            if self.max_repair_attempts.is_some_and(|max| attempts > max) {
                tracing::error!(attempts, error = %err, "repair attempts exhausted");
                return Err(ResearchError::ProtocolExhausted {
                    attempts,
                    last_error: err.to_string(),
                });
            }

            let repair_prompt = match self.recovery.handle(&err) {
                RecoveryAction::RetryWithPrompt(p) => p,
                _ => return Err(err),
            };
            tracing::warn!(attempt = attempts, error = %err, "unparseable reply, requesting repair");
            send_event(
                &self.event_tx,
                ResearchEvent::Repair {
                    attempt: attempts,
                    reason: err.to_string(),
                },
            );

            // 失败的交换只进入本次请求的局部上下文，不写入会话历史
            context.push(Message::user(prompt));
            context.push(Message::assistant(reply));
            prompt = compose_prompt(&repair_prompt, true);
        }
    }
}
