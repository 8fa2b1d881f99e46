//! 研究运行时组件
//!
//! 供二进制或其它前端调用：create_llm_from_config 选择后端，
//! create_research_components 按配置构建 TurnExecutor、工具执行器与默认协作方，
//! 再由 ResearchComponents 生成 ResearchHost 与绑定用户通道的 ActionDispatcher。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::config::AppConfig;
use crate::integrations::UserChannel;
use crate::llm::{create_deepseek_client, LlmClient, MockLlmClient, OpenAiClient};
use crate::research::{ActionDispatcher, ResearchEvent, ResearchHost, TurnExecutor};
use crate::tools::{
    CatTool, FileSink, HttpFetcher, LsTool, PageFetcher, ToolExecutor, ToolRegistry,
    WorkspaceFileSink,
};

/// 根据配置与环境变量选择 LLM 后端（DeepSeek / OpenAI 兼容 / Mock）
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let timeout = cfg.llm.request_timeout_secs;
    // 有 DeepSeek Key 或（配置为 deepseek 且仅有 OpenAI Key 时也走 DeepSeek 兼容端点）
    let use_deepseek = std::env::var("DEEPSEEK_API_KEY").is_ok()
        || (provider == "deepseek" && std::env::var("OPENAI_API_KEY").is_ok());
    let use_openai = std::env::var("OPENAI_API_KEY").is_ok() && provider != "deepseek";

    if use_deepseek {
        let model = cfg
            .llm
            .deepseek
            .model
            .clone()
            .unwrap_or_else(|| cfg.llm.model.clone());
        tracing::info!("Using DeepSeek LLM ({})", model);
        Arc::new(create_deepseek_client(Some(&model)).with_request_timeout(timeout))
    } else if use_openai {
        let model = cfg
            .llm
            .openai
            .model
            .clone()
            .unwrap_or_else(|| cfg.llm.model.clone());
        tracing::info!("Using OpenAI LLM ({})", model);
        Arc::new(
            OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                &model,
                std::env::var("OPENAI_API_KEY").ok().as_deref(),
            )
            .with_request_timeout(timeout),
        )
    } else {
        tracing::warn!("No API key set or provider unknown, using Mock LLM");
        Arc::new(MockLlmClient)
    }
}

/// 预构建的研究组件，可被多个会话共享
pub struct ResearchComponents {
    pub executor: Arc<TurnExecutor>,
    pub tools: Arc<ToolExecutor>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub file_sink: Arc<dyn FileSink>,
    pub workspace: PathBuf,
    reply_timeout: Duration,
    max_steps: usize,
    event_tx: Option<UnboundedSender<ResearchEvent>>,
}

/// 按配置构建研究组件：工作区工具（cat / ls）、网页抓取、文件写入与回合执行器
pub fn create_research_components(
    cfg: &AppConfig,
    llm: Arc<dyn LlmClient>,
    event_tx: Option<UnboundedSender<ResearchEvent>>,
) -> ResearchComponents {
    let workspace = cfg.app.workspace();
    if let Err(e) = std::fs::create_dir_all(&workspace) {
        tracing::warn!(path = %workspace.display(), error = %e, "failed to create workspace");
    }

    let mut registry = ToolRegistry::new();
    registry.register(CatTool::new(&workspace));
    registry.register(LsTool::new(&workspace));

    let mut executor = TurnExecutor::new(llm, cfg.research.repair_cap());
    if let Some(tx) = &event_tx {
        executor = executor.with_event_tx(tx.clone());
    }

    let fetch = &cfg.tools.fetch;
    ResearchComponents {
        executor: Arc::new(executor),
        tools: Arc::new(ToolExecutor::new(registry, cfg.tools.tool_timeout_secs)),
        fetcher: Arc::new(HttpFetcher::new(
            fetch.allowed_domains.clone(),
            fetch.timeout_secs,
            fetch.max_result_chars,
        )),
        file_sink: Arc::new(WorkspaceFileSink::new(&workspace)),
        workspace,
        reply_timeout: Duration::from_secs(cfg.research.reply_timeout_secs),
        max_steps: cfg.research.max_dispatch_steps,
        event_tx,
    }
}

impl ResearchComponents {
    /// 会话宿主：工具目录在这里生成一次，之后所有会话共享只读快照
    pub fn host(&self) -> ResearchHost {
        ResearchHost::new(self.executor.clone(), self.tools.registry().catalog())
    }

    /// 绑定用户通道的分发器
    pub fn dispatcher(&self, channel: Arc<dyn UserChannel>) -> ActionDispatcher {
        let mut dispatcher = ActionDispatcher::new(channel)
            .with_tools(self.tools.clone())
            .with_fetcher(self.fetcher.clone())
            .with_file_sink(self.file_sink.clone())
            .with_reply_timeout(self.reply_timeout)
            .with_max_steps(self.max_steps);
        if let Some(tx) = &self.event_tx {
            dispatcher = dispatcher.with_event_tx(tx.clone());
        }
        dispatcher
    }
}
