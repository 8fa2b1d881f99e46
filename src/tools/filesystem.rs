//! 工作区文件系统
//!
//! SafeFs 绑定 root_dir，所有路径必须在 root 下（禁止绝对路径与 ../ 逃逸）。
//! WorkspaceFileSink 基于 SafeFs 实现 write_file 动作；CatTool / LsTool 作为 tool_use 工具读取工作区。

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::core::ResearchError;
use crate::tools::{FileSink, Tool};

/// 沙箱文件系统：绑定根目录，校验路径在根下，防止路径逃逸
#[derive(Debug, Clone)]
pub struct SafeFs {
    root_dir: PathBuf,
}

impl SafeFs {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        let root = root_dir.as_ref().to_path_buf();
        let root_dir = root.canonicalize().unwrap_or(root);
        Self { root_dir }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// 解析相对路径（目标可以不存在）；绝对路径或包含 .. 时拒绝
    pub fn resolve(&self, path: &str) -> Result<PathBuf, ResearchError> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(ResearchError::Collaborator("Empty path".to_string()));
        }
        let relative = Path::new(trimmed);
        let mut resolved = self.root_dir.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(ResearchError::PathEscape(trimmed.to_string()));
                }
            }
        }
        Ok(resolved)
    }

    pub fn read_file(&self, path: &str) -> Result<String, ResearchError> {
        let resolved = self.resolve(path)?;
        std::fs::read_to_string(&resolved)
            .map_err(|e| ResearchError::Collaborator(format!("Read failed: {}", e)))
    }

    pub async fn write_file(&self, path: &str, content: &str) -> Result<PathBuf, ResearchError> {
        let resolved = self.resolve(path)?;
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ResearchError::Collaborator(format!("Create dir failed: {}", e)))?;
        }
        tokio::fs::write(&resolved, content)
            .await
            .map_err(|e| ResearchError::Collaborator(format!("Write failed: {}", e)))?;
        Ok(resolved)
    }

    pub fn list_dir(&self, path: &str) -> Result<Vec<String>, ResearchError> {
        let base = if path.trim().is_empty() || path.trim() == "." {
            self.root_dir.clone()
        } else {
            self.resolve(path)?
        };
        let mut entries = Vec::new();
        let dir = std::fs::read_dir(&base)
            .map_err(|e| ResearchError::Collaborator(format!("List failed: {}", e)))?;
        for e in dir {
            let e = e.map_err(|e| ResearchError::Collaborator(e.to_string()))?;
            let name = e.file_name().to_string_lossy().to_string();
            if !name.starts_with('.') {
                let suffix = if e.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    "/"
                } else {
                    ""
                };
                entries.push(format!("{}{}", name, suffix));
            }
        }
        entries.sort();
        Ok(entries)
    }
}

/// write_file 动作的默认实现：写入工作区
pub struct WorkspaceFileSink {
    fs: SafeFs,
}

impl WorkspaceFileSink {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        Self {
            fs: SafeFs::new(root_dir),
        }
    }
}

#[async_trait]
impl FileSink for WorkspaceFileSink {
    async fn write(&self, path: &str, content: &str) -> Result<String, String> {
        let written = self.fs.write_file(path, content).await.map_err(|e| e.to_string())?;
        tracing::info!(path = %written.display(), bytes = content.len(), "write_file");
        Ok(format!("已写入 {} ({} 字节)", path.trim(), content.len()))
    }
}

/// Cat 工具：读取工作区文件
pub struct CatTool {
    fs: SafeFs,
}

impl CatTool {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        Self {
            fs: SafeFs::new(root_dir),
        }
    }
}

#[async_trait]
impl Tool for CatTool {
    fn name(&self) -> &str {
        "cat"
    }

    fn description(&self) -> &str {
        "Read a file from the research workspace"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "file path relative to workspace"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or("");
        self.fs.read_file(path).map_err(|e| e.to_string())
    }
}

/// Ls 工具：列出工作区目录
pub struct LsTool {
    fs: SafeFs,
}

impl LsTool {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        Self {
            fs: SafeFs::new(root_dir),
        }
    }
}

#[async_trait]
impl Tool for LsTool {
    fn name(&self) -> &str {
        "ls"
    }

    fn description(&self) -> &str {
        "List a directory of the research workspace"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "directory path, default '.'"}
            },
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let entries = self.fs.list_dir(path).map_err(|e| e.to_string())?;
        Ok(entries.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let fs = SafeFs::new(dir.path());
        assert!(matches!(fs.resolve("../etc/passwd"), Err(ResearchError::PathEscape(_))));
        assert!(matches!(fs.resolve("/etc/passwd"), Err(ResearchError::PathEscape(_))));
        assert!(matches!(fs.resolve("a/../../b"), Err(ResearchError::PathEscape(_))));
        assert!(fs.resolve("./notes/report.md").unwrap().starts_with(fs.root()));
    }

    #[tokio::test]
    async fn test_sink_writes_nested_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = WorkspaceFileSink::new(dir.path());
        let ack = sink.write("reports/summary.md", "# Summary").await.unwrap();
        assert!(ack.contains("reports/summary.md"));

        let written = std::fs::read_to_string(dir.path().join("reports/summary.md")).unwrap();
        assert_eq!(written, "# Summary");
    }

    #[tokio::test]
    async fn test_sink_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let sink = WorkspaceFileSink::new(dir.path());
        let err = sink.write("../outside.md", "x").await.unwrap_err();
        assert!(err.contains("Path escape"));
    }

    #[tokio::test]
    async fn test_cat_and_ls_tools() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let cat = CatTool::new(dir.path());
        let out = cat.execute(serde_json::json!({"path": "notes.txt"})).await.unwrap();
        assert_eq!(out, "hello");

        let ls = LsTool::new(dir.path());
        let out = ls.execute(serde_json::json!({})).await.unwrap();
        assert_eq!(out, "notes.txt\nsub/");
    }
}
