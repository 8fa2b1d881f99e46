//! 深度研究编排核心
//!
//! - action / catalog: JSON 动作协议与按阶段划分的动作目录
//! - prompt: 每轮渲染的系统提示词
//! - executor: 单次逻辑请求与自修复协议
//! - agent: 单个研究会话（submit）
//! - dispatcher: 动作分发循环
//! - host: 会话存储与按 id 运行 / 继续

pub mod action;
pub mod agent;
pub mod catalog;
pub mod dispatcher;
pub mod events;
pub mod executor;
pub mod host;
pub mod prompt;

pub use action::{parse_reply, Action, DecodedAction, Reference, ToolInvocation};
pub use agent::ResearchAgent;
pub use catalog::{ActionSpec, ACTION_CATALOG, PROTOCOL_VERSION};
pub use dispatcher::{ActionDispatcher, DispatchOutcome, DEFAULT_REPLY_TIMEOUT_SECS};
pub use events::ResearchEvent;
pub use executor::{compose_prompt, TurnExecutor, TurnOutcome, TurnRequest};
pub use host::ResearchHost;
pub use prompt::{render_system_prompt, PromptContext};
