//! 工具与外部协作方
//!
//! - registry / executor: tool_use 动作的工具注册与并发执行
//! - collaborators: search / visit / write_file / coding 的协作方接口
//! - fetch / filesystem: 默认的网页抓取与工作区文件实现

pub mod collaborators;
pub mod executor;
pub mod fetch;
pub mod filesystem;
pub mod registry;

pub use collaborators::{CodeSandbox, FileSink, PageFetcher, SearchHit, WebSearch};
pub use executor::{BatchOutcome, ToolExecutor};
pub use fetch::HttpFetcher;
pub use filesystem::{CatTool, LsTool, SafeFs, WorkspaceFileSink};
pub use registry::{Tool, ToolRegistry};
