//! 动作协议：模型每一轮输出的 JSON 动作
//!
//! `action` 字段作为判别式，反序列化为带标签的 Action 枚举；未知的判别值解码为 `Action::Unknown`，
//! 交给分发循环终止。蒸馏投影 [`Action::distilled`] 只在这里定义一次。

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::core::{ResearchError, Stage};
use crate::memory::TodoStatus;
use crate::research::catalog;

/// 回答引用的参考内容
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Reference {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// tool_use 中的单个工具调用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ToolInvocation {
    pub tool_name: String,
    #[serde(default)]
    pub args: Value,
}

/// 模型输出的动作（`{"action": "...", ...}`）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// 向用户提问
    Ask {
        #[serde(default)]
        think: String,
        question: String,
    },
    /// 回答用户或告知结论
    Answer {
        #[serde(default)]
        think: String,
        answer: String,
        #[serde(default)]
        reference: Vec<Reference>,
    },
    SetStage {
        #[schemars(with = "String")]
        stage: Stage,
    },
    SetResearchTopic {
        research_topic: String,
    },
    SetTodoList {
        todo_list: Vec<String>,
    },
    SetTodoStatus {
        id: String,
        status: TodoStatus,
        #[serde(default)]
        reason: String,
    },
    ToolUse {
        #[serde(default)]
        think: String,
        tool_use: Vec<ToolInvocation>,
    },
    Search {
        #[serde(default)]
        think: String,
        search_request: Vec<String>,
    },
    Visit {
        #[serde(default)]
        think: String,
        url: String,
    },
    WriteFile {
        #[serde(default)]
        think: String,
        path: String,
        content: String,
    },
    /// 在外部沙箱执行一段代码
    Coding {
        #[serde(default)]
        think: String,
        code: String,
    },
    /// 工作结束
    Finished {
        #[serde(default)]
        think: String,
        result: String,
        #[serde(deserialize_with = "lenient_bool")]
        #[schemars(with = "bool")]
        success: bool,
    },
    /// 合法 JSON，但判别值不在动作目录中
    #[serde(skip)]
    Unknown { name: String },
}

/// 模型偶尔把布尔值写成字符串 "true" / "false"
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Str(String),
    }

    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected boolean, got \"{other}\""
            ))),
        },
    }
}

impl Action {
    /// 动作名（即 JSON 中的 `action` 值）
    pub fn name(&self) -> &str {
        match self {
            Action::Ask { .. } => "ask",
            Action::Answer { .. } => "answer",
            Action::SetStage { .. } => "set_stage",
            Action::SetResearchTopic { .. } => "set_research_topic",
            Action::SetTodoList { .. } => "set_todo_list",
            Action::SetTodoStatus { .. } => "set_todo_status",
            Action::ToolUse { .. } => "tool_use",
            Action::Search { .. } => "search",
            Action::Visit { .. } => "visit",
            Action::WriteFile { .. } => "write_file",
            Action::Coding { .. } => "coding",
            Action::Finished { .. } => "finished",
            Action::Unknown { name } => name,
        }
    }

    /// 模型给出的思考过程（为空或动作没有该字段时为 None）
    pub fn think(&self) -> Option<&str> {
        let think = match self {
            Action::Ask { think, .. }
            | Action::Answer { think, .. }
            | Action::ToolUse { think, .. }
            | Action::Search { think, .. }
            | Action::Visit { think, .. }
            | Action::WriteFile { think, .. }
            | Action::Coding { think, .. }
            | Action::Finished { think, .. } => think.as_str(),
            _ => return None,
        };
        if think.trim().is_empty() {
            None
        } else {
            Some(think)
        }
    }

    /// 蒸馏投影：助手回合在蒸馏历史中的展示文本；None 表示该动作不产生蒸馏条目
    pub fn distilled(&self) -> Option<String> {
        match self {
            Action::Ask { question, .. } => Some(question.clone()),
            Action::SetStage { stage } => Some(stage.to_string()),
            Action::Answer { answer, .. } => Some(answer.clone()),
            Action::SetResearchTopic { research_topic } => Some(research_topic.clone()),
            Action::SetTodoList { todo_list } => Some(todo_list.join("\n")),
            Action::SetTodoStatus { .. }
            | Action::ToolUse { .. }
            | Action::Search { .. }
            | Action::Visit { .. }
            | Action::WriteFile { .. }
            | Action::Coding { .. }
            | Action::Finished { .. }
            | Action::Unknown { .. } => None,
        }
    }
}

/// 解码后的动作：类型化的 Action 与模型给出的原始 JSON 对象（写入原始历史）
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAction {
    pub action: Action,
    pub raw: Value,
}

impl DecodedAction {
    /// 将一个 JSON 值解码为动作。
    ///
    /// 不是对象、缺少 `action` 字符串字段、或已知动作缺少必填字段时返回 ProtocolDecode（可修复）；
    /// 判别值未知时返回 `Action::Unknown`（不修复，由分发循环终止）。
    pub fn decode(value: Value) -> Result<Self, ResearchError> {
        let name = match &value {
            Value::Object(map) => match map.get("action") {
                Some(Value::String(name)) => name.clone(),
                Some(_) => {
                    return Err(ResearchError::ProtocolDecode(
                        "field \"action\" must be a string".to_string(),
                    ))
                }
                None => {
                    return Err(ResearchError::ProtocolDecode(
                        "missing field \"action\"".to_string(),
                    ))
                }
            },
            _ => {
                return Err(ResearchError::ProtocolDecode(
                    "expected a single JSON object".to_string(),
                ))
            }
        };

        if catalog::spec_for(&name).is_none() {
            return Ok(Self {
                action: Action::Unknown { name },
                raw: value,
            });
        }

        let action = serde_json::from_value::<Action>(value.clone()).map_err(|e| {
            ResearchError::ProtocolDecode(format!("invalid \"{name}\" action: {e}"))
        })?;
        Ok(Self { action, raw: value })
    }
}

/// 去除回复首尾的代码块标记（```json ... ``` 或 ``` ... ```）
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // 跳过语言标记（如 json），直到第一个换行；单行时直接去掉字母
    let rest = match rest.find('\n') {
        Some(pos) if rest[..pos].chars().all(|c| c.is_ascii_alphanumeric()) => &rest[pos + 1..],
        _ => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// 解析模型回复：去除代码块标记后按单个 JSON 值解析，再解码为动作
pub fn parse_reply(reply: &str) -> Result<DecodedAction, ResearchError> {
    let body = strip_code_fence(reply);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ResearchError::ProtocolDecode(e.to_string()))?;
    DecodedAction::decode(value)
}

/// 动作回复的 JSON Schema（拼入系统提示词，减少格式错误）
pub fn action_schema_json() -> String {
    let schema = schemars::schema_for!(Action);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
