//! 动作目录（ActionSchema）
//!
//! 静态描述每个动作：说明、必填字段、回复格式示例、执行后返回给模型的 next_input 结构，
//! 以及在哪些阶段合法。目录文本带版本号，与每轮动态值（时间、阶段、工具）分开维护。

use crate::core::Stage;

/// 动作目录版本，修改目录文本时递增
pub const PROTOCOL_VERSION: &str = "2";

const ALL_STAGES: &[Stage] = &[Stage::Ask, Stage::Planning, Stage::Execute, Stage::Finished];
const TOPIC_STAGES: &[Stage] = &[Stage::Ask, Stage::Planning];
const PLAN_STAGES: &[Stage] = &[Stage::Planning, Stage::Execute];
const EXECUTE_STAGES: &[Stage] = &[Stage::Execute];
const RESEARCH_STAGES: &[Stage] = &[Stage::Planning, Stage::Execute];
const FINISH_STAGES: &[Stage] = &[Stage::Execute, Stage::Finished];

/// 单个动作的静态描述
#[derive(Debug, Clone, Copy)]
pub struct ActionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub required_fields: &'static [&'static str],
    /// 回复格式示例，本身是可直接解析的 JSON
    pub response_format: &'static str,
    pub next_input: &'static str,
    pub stages: &'static [Stage],
}

impl ActionSpec {
    pub fn is_legal_in(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    fn render(&self) -> String {
        let stages: Vec<&str> = self.stages.iter().map(|s| s.as_str()).collect();
        format!(
            "{{\n    \"action_name\": \"{}\",\n    \"description\": \"{}\",\n    \"stages\": \"{}\",\n    \"response_format\": {},\n    \"next_input\": \"{}\"\n}}",
            self.name,
            self.description,
            stages.join(", "),
            self.response_format,
            self.next_input
        )
    }
}

pub const ACTION_CATALOG: &[ActionSpec] = &[
    ActionSpec {
        name: "set_stage",
        description: "设置当前任务的阶段，可以设置为ASK、PLANNING、EXECUTE、FINISHED",
        required_fields: &["stage"],
        response_format: r#"{"action": "set_stage", "stage": "PLANNING"}"#,
        next_input: "返回成功或错误信息",
        stages: ALL_STAGES,
    },
    ActionSpec {
        name: "ask",
        description: "向用户提问。用户输入的信息有不明确的地方时向用户提问，获取更多信息，但不要过度提问。",
        required_fields: &["think", "question"],
        response_format: r#"{"action": "ask", "think": "简单总结提问的思考过程，控制在50字以内", "question": "提问的具体详细内容"}"#,
        next_input: "用户对你提问的进一步补充",
        stages: ALL_STAGES,
    },
    ActionSpec {
        name: "answer",
        description: "回答用户的问题，或告知用户你想让用户知道的信息，内容必须是一个确定的结论。reference 可选。",
        required_fields: &["think", "answer"],
        response_format: r#"{"action": "answer", "think": "简单总结回答的思考过程，控制在50字以内", "answer": "回答的具体详细内容", "reference": [{"url": "参考链接", "title": "参考链接的标题", "content": "参考链接的内容"}]}"#,
        next_input: "用户的进一步提问或要求",
        stages: ALL_STAGES,
    },
    ActionSpec {
        name: "set_research_topic",
        description: "在目标明确后设置本次研究的主题",
        required_fields: &["research_topic"],
        response_format: r#"{"action": "set_research_topic", "research_topic": "研究主题的简要描述"}"#,
        next_input: "返回成功或错误信息",
        stages: TOPIC_STAGES,
    },
    ActionSpec {
        name: "set_todo_list",
        description: "设置任务的执行步骤，每个步骤会分配一个ID，初始状态为queued",
        required_fields: &["todo_list"],
        response_format: r#"{"action": "set_todo_list", "todo_list": ["步骤1", "步骤2"]}"#,
        next_input: "返回成功信息以及每个步骤的ID",
        stages: PLAN_STAGES,
    },
    ActionSpec {
        name: "set_todo_status",
        description: "更新某个步骤的状态，status为queued、in_progress、completed、failed之一",
        required_fields: &["id", "status", "reason"],
        response_format: r#"{"action": "set_todo_status", "id": "步骤ID", "status": "completed", "reason": "状态变化的原因"}"#,
        next_input: "返回成功信息，或未找到步骤ID时的错误信息",
        stages: EXECUTE_STAGES,
    },
    ActionSpec {
        name: "tool_use",
        description: "使用tools中定义的工具，可以一次进行多个工具的调用，调用结果会一次性返回",
        required_fields: &["think", "tool_use"],
        response_format: r#"{"action": "tool_use", "think": "简单总结使用工具的思考过程，控制在50字以内", "tool_use": [{"tool_name": "工具名称", "args": {"参数名称": "参数值"}}]}"#,
        next_input: "以工具名称为key、调用结果为value的字典",
        stages: EXECUTE_STAGES,
    },
    ActionSpec {
        name: "search",
        description: "从互联网上搜索信息，优先级高于tools中的搜索工具",
        required_fields: &["think", "search_request"],
        response_format: r#"{"action": "search", "think": "简单总结搜索的思考过程，控制在50字以内", "search_request": ["关键词1", "关键词2"]}"#,
        next_input: "搜索结果列表，每项包含url、title、content",
        stages: RESEARCH_STAGES,
    },
    ActionSpec {
        name: "visit",
        description: "获取指定url的内容",
        required_fields: &["think", "url"],
        response_format: r#"{"action": "visit", "think": "为什么要获取这个url的内容，控制在50字以内", "url": "https://example.com"}"#,
        next_input: "获取到的内容，或错误信息",
        stages: RESEARCH_STAGES,
    },
    ActionSpec {
        name: "write_file",
        description: "将内容写入工作区中的文件，用于保存报告或中间结果",
        required_fields: &["path", "content"],
        response_format: r#"{"action": "write_file", "think": "为什么要写入这个文件，控制在50字以内", "path": "report.md", "content": "文件内容"}"#,
        next_input: "返回成功或错误信息",
        stages: EXECUTE_STAGES,
    },
    ActionSpec {
        name: "coding",
        description: "在沙箱中执行一段python代码，优先级高于tools中的执行代码工具",
        required_fields: &["think", "code"],
        response_format: r#"{"action": "coding", "think": "为什么需要执行代码，控制在50字以内", "code": "print(1 + 1)"}"#,
        next_input: "执行代码后的返回结果",
        stages: EXECUTE_STAGES,
    },
    ActionSpec {
        name: "finished",
        description: "工作结束，向用户展示你的工作成果，即使工作失败(success为false)也要说明完成了哪些工作",
        required_fields: &["think", "result", "success"],
        response_format: r#"{"action": "finished", "think": "任务结束的原因，控制在50字以内", "result": "工作成果介绍", "success": true}"#,
        next_input: "用户的进一步提问或要求",
        stages: FINISH_STAGES,
    },
];

/// 按名称查找动作
pub fn spec_for(name: &str) -> Option<&'static ActionSpec> {
    ACTION_CATALOG.iter().find(|spec| spec.name == name)
}

/// 动作在指定阶段是否合法；未知动作始终不合法
pub fn is_legal(name: &str, stage: Stage) -> bool {
    spec_for(name).is_some_and(|spec| spec.is_legal_in(stage))
}

/// 渲染当前阶段可用的动作目录文本
pub fn render_actions(stage: Stage) -> String {
    ACTION_CATALOG
        .iter()
        .filter(|spec| spec.is_legal_in(stage))
        .map(ActionSpec::render)
        .collect::<Vec<_>>()
        .join("\n")
}
