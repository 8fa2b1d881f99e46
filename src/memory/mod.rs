//! 记忆层：对话消息、会话历史（原始 / 蒸馏）、Todo 列表

pub mod conversation;
pub mod history;
pub mod todo;

pub use conversation::{Message, Role};
pub use history::{HistoryStore, RawEntry};
pub use todo::{todo_id, TodoEntry, TodoList, TodoStatus};
