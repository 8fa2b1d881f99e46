//! 会话历史：原始历史与按阶段分区的蒸馏历史
//!
//! - 原始历史：每次交换的完整记录，助手内容为解码后的动作对象，只用于审计 / 导出，不回放给模型。
//! - 蒸馏历史：每个阶段一份，助手内容为动作投影出的一句展示文本，作为后续请求的上下文。
//!
//! 只有成功解码的回合才会写入；[`HistoryStore::record_turn`] 先校验再一次性写入两份历史，
//! 失败的回合不会留下半条记录。

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::core::Stage;
use crate::memory::{Message, Role};
use crate::research::Action;

/// 原始历史条目
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RawEntry {
    /// 写入时所处阶段
    pub stage: Stage,
    pub role: Role,
    pub content: Value,
}

#[derive(Clone, Debug, Default)]
pub struct HistoryStore {
    raw: Vec<RawEntry>,
    distilled: HashMap<Stage, Vec<Message>>,
    /// 一致性告警（如未知动作没有蒸馏文本）
    warnings: Vec<String>,
}

/// 空字符串、null、空对象 / 数组都视为空内容
fn is_empty_content(content: &Value) -> bool {
    match content {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条原始历史；内容为空时不写入并返回 false
    pub fn append_raw(&mut self, stage: Stage, role: Role, content: Value) -> bool {
        if is_empty_content(&content) {
            return false;
        }
        self.raw.push(RawEntry { stage, role, content });
        true
    }

    pub fn append_distilled(&mut self, stage: Stage, role: Role, content: impl Into<String>) {
        self.distilled.entry(stage).or_default().push(Message {
            role,
            content: content.into(),
        });
    }

    /// 某阶段的蒸馏历史（没有记录时为空）
    pub fn distilled_for(&self, stage: Stage) -> &[Message] {
        self.distilled.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn raw_all(&self) -> &[RawEntry] {
        &self.raw
    }

    /// 某阶段写入的原始历史条目数
    pub fn raw_len_for(&self, stage: Stage) -> usize {
        self.raw.iter().filter(|e| e.stage == stage).count()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// 记录一个完整回合：用户提示 + 解码后的助手动作。
    ///
    /// `prompt` 是发给模型的完整输入，原样写入两份历史：系统来源的输入保留 `<system>...</system>`
    /// 包裹，导出和后续上下文中都能区分用户原话与系统合成的消息。
    ///
    /// 提示或动作对象为空时整回合不写入并返回 false。助手动作没有蒸馏文本时只写入用户条目
    /// 并记录一致性告警。
    pub fn record_turn(&mut self, stage: Stage, prompt: &str, action: &Action, raw_action: &Value) -> bool {
        let prompt_value = Value::String(prompt.to_string());
        if is_empty_content(&prompt_value) || is_empty_content(raw_action) {
            tracing::warn!(stage = %stage, "refusing to record turn with empty content");
            return false;
        }

        self.append_raw(stage, Role::User, prompt_value);
        self.append_raw(stage, Role::Assistant, raw_action.clone());

        self.append_distilled(stage, Role::User, prompt);
        match action.distilled() {
            Some(text) => self.append_distilled(stage, Role::Assistant, text),
            None => {
                let warning = format!(
                    "action \"{}\" has no distilled form; assistant turn omitted from {} context",
                    action.name(),
                    stage
                );
                tracing::warn!("{}", warning);
                self.warnings.push(warning);
            }
        }
        true
    }

    /// 导出原始历史（JSON）
    pub fn export_raw(&self) -> Value {
        serde_json::to_value(&self.raw).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn answer() -> (Action, Value) {
        let raw = json!({"action": "answer", "think": "t", "answer": "a", "reference": []});
        let action = serde_json::from_value(raw.clone()).unwrap();
        (action, raw)
    }

    #[test]
    fn test_append_raw_rejects_empty() {
        let mut store = HistoryStore::new();
        assert!(!store.append_raw(Stage::Ask, Role::User, json!("")));
        assert!(!store.append_raw(Stage::Ask, Role::Assistant, Value::Null));
        assert!(!store.append_raw(Stage::Ask, Role::Assistant, json!({})));
        assert!(store.raw_all().is_empty());
        assert!(store.append_raw(Stage::Ask, Role::User, json!("hi")));
        assert_eq!(store.raw_all().len(), 1);
    }

    #[test]
    fn test_record_turn_distills_answer() {
        let mut store = HistoryStore::new();
        let (action, raw) = answer();
        assert!(store.record_turn(Stage::Ask, "what is it?", &action, &raw));

        let distilled = store.distilled_for(Stage::Ask);
        assert_eq!(distilled.len(), 2);
        assert_eq!(distilled[0], Message::user("what is it?"));
        assert_eq!(distilled[1], Message::assistant("a"));
        assert_eq!(store.raw_all()[1].content, raw);
    }

    #[test]
    fn test_distilled_is_partitioned_by_stage() {
        let mut store = HistoryStore::new();
        let (action, raw) = answer();
        store.record_turn(Stage::Ask, "q1", &action, &raw);
        store.record_turn(Stage::Execute, "q2", &action, &raw);

        assert_eq!(store.distilled_for(Stage::Ask).len(), 2);
        assert_eq!(store.distilled_for(Stage::Execute).len(), 2);
        assert!(store.distilled_for(Stage::Planning).is_empty());
        assert_eq!(store.raw_len_for(Stage::Ask), 2);
        assert_eq!(store.raw_all().len(), 4);
    }

    #[test]
    fn test_undistillable_action_records_warning() {
        let mut store = HistoryStore::new();
        let raw = json!({"action": "visit", "think": "t", "url": "https://example.com"});
        let action: Action = serde_json::from_value(raw.clone()).unwrap();
        assert!(store.record_turn(Stage::Execute, "go", &action, &raw));

        assert_eq!(store.raw_len_for(Stage::Execute), 2);
        assert_eq!(store.distilled_for(Stage::Execute).len(), 1);
        assert_eq!(store.warnings().len(), 1);
        assert!(store.warnings()[0].contains("visit"));
    }

    #[test]
    fn test_system_prompt_keeps_wrapping_in_both_histories() {
        let mut store = HistoryStore::new();
        let (action, raw) = answer();
        assert!(store.record_turn(Stage::Planning, "<system>已进入 PLANNING</system>", &action, &raw));

        assert_eq!(store.raw_all()[0].content, json!("<system>已进入 PLANNING</system>"));
        assert_eq!(
            store.distilled_for(Stage::Planning)[0],
            Message::user("<system>已进入 PLANNING</system>")
        );
    }

    #[test]
    fn test_record_turn_with_empty_prompt_writes_nothing() {
        let mut store = HistoryStore::new();
        let (action, raw) = answer();
        assert!(!store.record_turn(Stage::Ask, "", &action, &raw));
        assert!(store.raw_all().is_empty());
        assert!(store.distilled_for(Stage::Ask).is_empty());
    }
}
