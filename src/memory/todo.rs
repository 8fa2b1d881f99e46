//! 研究任务的 Todo 列表
//!
//! 有序保存步骤；ID 为步骤文本 MD5 的前 6 位十六进制，相同文本始终得到相同 ID。
//! 列表本身不去重，调用方可以用 [`TodoList::contains`] 自行判断。

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ID 长度（十六进制字符数）
const TODO_ID_LEN: usize = 6;

/// 步骤状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TodoStatus::Queued => "queued",
            TodoStatus::InProgress => "in_progress",
            TodoStatus::Completed => "completed",
            TodoStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// 单个步骤
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TodoEntry {
    pub id: String,
    pub step: String,
    pub status: TodoStatus,
    pub reason: String,
}

/// 步骤文本的稳定短指纹
pub fn todo_id(step: &str) -> String {
    let digest = format!("{:x}", md5::compute(step.as_bytes()));
    digest[..TODO_ID_LEN].to_string()
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct TodoList {
    entries: Vec<TodoEntry>,
}

impl TodoList {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加步骤，返回其 ID
    pub fn add(&mut self, step: impl Into<String>, status: TodoStatus, reason: impl Into<String>) -> String {
        let step = step.into();
        let id = todo_id(&step);
        self.entries.push(TodoEntry {
            id: id.clone(),
            step,
            status,
            reason: reason.into(),
        });
        id
    }

    /// 以默认状态（queued、无原因）追加步骤
    pub fn add_step(&mut self, step: impl Into<String>) -> String {
        self.add(step, TodoStatus::Queued, "")
    }

    /// 按 ID 精确匹配并更新第一条；不存在时返回 false 且不修改任何条目
    pub fn set_status(&mut self, id: &str, status: TodoStatus, reason: impl Into<String>) -> bool {
        match self.entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.status = status;
                entry.reason = reason.into();
                true
            }
            None => {
                tracing::warn!(id, "todo entry not found");
                false
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&TodoEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn contains(&self, step: &str) -> bool {
        self.get(&todo_id(step)).is_some()
    }

    pub fn entries(&self) -> &[TodoEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 供系统消息使用的清单文本：`[id] (status) step`
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("[{}] ({}) {}", e.id, e.status, e.step))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
