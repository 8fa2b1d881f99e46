//! 系统提示词渲染
//!
//! 静态协议文本（角色说明、工具结构说明、动作目录）与每轮动态值分开：
//! 动态值只通过 [`PromptContext`] 注入，每轮根据当前阶段重新渲染。

use chrono::{DateTime, Local};

use crate::core::Stage;
use crate::research::action::action_schema_json;
use crate::research::catalog::{self, PROTOCOL_VERSION};

const ROLE_TEMPLATE: &str = r#"<system_info>
当前时间日期: {current_datetime}

当前执行阶段: {stage} ({stage_label})

动作协议版本: {protocol_version}
</system_info>

你是一个由语言模型驱动的深度研究 Agent，擅长信息收集、事实核查、数据分析和撰写多章节研究报告。

你在 Agent 循环中运作：
- 明确目标：向用户提问，直到有一个明确的研究目标
- 分析事件：关注最新的用户消息和执行结果
- 选择动作：根据当前阶段、任务计划和已有信息选择下一个动作
- 等待执行：动作由外部环境执行，执行结果会作为下一轮输入返回给你
- 迭代：每次只选择一个动作，耐心重复直到任务完成
- 提交结果：使用 finished 动作向用户展示成果

完成任务一共有四个阶段，不同阶段可用的动作不同：
1. 明确目标: ASK
2. 计划任务: PLANNING
3. 执行任务: EXECUTE
4. 任务完成: FINISHED

阶段只能通过 set_stage 动作切换，请按 ASK → PLANNING → EXECUTE → FINISHED 的顺序推进。

为了压缩上下文长度，历史对话会被精简，可能不是 JSON 格式；但你的最新回复必须严格遵守下面动作的
response_format：只输出一个可直接解析的 JSON 对象，不要包含注释、Markdown 代码块或其它任何内容。
以 <system> 包裹的输入来自执行环境而不是用户。
"#;

const TOOLS_TEMPLATE: &str = r#"
你可以通过 tool_use 动作使用如下工具：
<tools>
{tools}
</tools>

tools 结构说明：每个工具是一个 JSON 对象，包含 name（工具名称）、description（工具描述）、
parameters（参数的 JSON Schema）。

注意：工具具有不确定性，如果工具与动作功能重合，优先使用动作。
"#;

const ACTIONS_TEMPLATE: &str = r#"
当前阶段你可以执行的动作：
<actions>
{actions}
</actions>

动作结构说明：action_name 为动作名称，description 为动作描述，stages 为可用阶段，
response_format 为你必须严格遵守的回答格式，next_input 为执行该动作后你会收到的内容。

所有动作回复的 JSON Schema：
<response_schema>
{response_schema}
</response_schema>
"#;

/// 每轮注入系统提示词的动态值
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    pub now: DateTime<Local>,
    pub stage: Stage,
    /// 工具目录：每行一个工具 JSON 对象
    pub tools: &'a str,
}

impl<'a> PromptContext<'a> {
    pub fn new(stage: Stage, tools: &'a str) -> Self {
        Self {
            now: Local::now(),
            stage,
            tools,
        }
    }
}

/// 渲染完整的系统提示词
pub fn render_system_prompt(ctx: &PromptContext<'_>) -> String {
    let role = ROLE_TEMPLATE
        .replace("{current_datetime}", &ctx.now.format("%Y-%m-%d %H:%M:%S").to_string())
        .replace("{stage_label}", ctx.stage.label())
        .replace("{stage}", ctx.stage.as_str())
        .replace("{protocol_version}", PROTOCOL_VERSION);

    let tools = if ctx.tools.trim().is_empty() {
        String::new()
    } else {
        TOOLS_TEMPLATE.replace("{tools}", ctx.tools)
    };

    let actions = ACTIONS_TEMPLATE
        .replace("{actions}", &catalog::render_actions(ctx.stage))
        .replace("{response_schema}", &action_schema_json());

    format!("{role}{tools}{actions}")
}
