//! 外部协作方接口
//!
//! 编排核心不执行搜索、抓取、写文件或代码，只把动作声明转交给这里的实现，
//! 并把返回结果作为下一轮输入交给模型。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 搜索结果条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub content: String,
}

/// search 动作：按关键词搜索互联网
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, keywords: &[String]) -> Result<Vec<SearchHit>, String>;
}

/// visit 动作：获取 URL 内容
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, String>;
}

/// write_file 动作：写入文件，返回确认信息
#[async_trait]
pub trait FileSink: Send + Sync {
    async fn write(&self, path: &str, content: &str) -> Result<String, String>;
}

/// coding 动作：在外部沙箱执行代码，返回输出
#[async_trait]
pub trait CodeSandbox: Send + Sync {
    async fn run(&self, code: &str) -> Result<String, String>;
}
