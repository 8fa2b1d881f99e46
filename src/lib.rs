//! deep-research - 多轮深度研究会话编排引擎
//!
//! 模块划分：
//! - **agent**: 运行时组件构建（LLM 选择、工具、协作方）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误与恢复、阶段状态机、会话存储
//! - **integrations**: 用户消息通道（控制台）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock / 脚本回放）
//! - **memory**: 对话消息、原始 / 蒸馏历史、Todo 列表
//! - **observability**: tracing 初始化
//! - **research**: 动作协议、回合执行器、研究会话、分发循环与会话宿主
//! - **tools**: 工具注册与执行、外部协作方接口与默认实现

pub mod agent;
pub mod config;
pub mod core;
pub mod integrations;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod research;
pub mod tools;

pub use research::{ActionDispatcher, DispatchOutcome, ResearchAgent, ResearchHost};
