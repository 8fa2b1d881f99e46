//! 研究流程集成测试：脚本回放后端 + 预设用户通道，覆盖完整的阶段推进、修复协议与超时

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use deep_research::core::Stage;
use deep_research::integrations::UserChannel;
use deep_research::llm::{MockLlmClient, ScriptedLlmClient};
use deep_research::memory::{Role, TodoStatus};
use deep_research::research::{ActionDispatcher, DispatchOutcome, ResearchHost, TurnExecutor};
use deep_research::tools::{Tool, ToolExecutor, ToolRegistry, WorkspaceFileSink};

/// 预设回复的用户通道；回复用完后挂起，直到超时
#[derive(Default)]
struct ScriptedChannel {
    replies: Mutex<VecDeque<String>>,
    sent: Mutex<Vec<String>>,
}

impl ScriptedChannel {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl UserChannel for ScriptedChannel {
    async fn send_text(&self, text: &str) -> Result<(), String> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn next_input(&self) -> Option<String> {
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(reply) => Some(reply),
            None => std::future::pending().await,
        }
    }
}

struct WordCount;

#[async_trait]
impl Tool for WordCount {
    fn name(&self) -> &str {
        "word_count"
    }

    fn description(&self) -> &str {
        "Count words. Args: {\"text\": \"...\"}"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let text = args.get("text").and_then(|v| v.as_str()).unwrap_or("");
        Ok(text.split_whitespace().count().to_string())
    }
}

fn host_with(llm: Arc<ScriptedLlmClient>, max_repair: Option<usize>, tools: &ToolRegistry) -> ResearchHost {
    ResearchHost::new(Arc::new(TurnExecutor::new(llm, max_repair)), tools.catalog())
}

#[tokio::test]
async fn test_full_research_session() {
    let workspace = tempfile::tempdir().unwrap();
    let llm = Arc::new(ScriptedLlmClient::new([
        r#"{"action":"ask","think":"需求不明确","question":"想研究哪类电池？"}"#,
        r#"```json
{"action":"set_research_topic","research_topic":"固态电池量产进展"}
```"#,
        r#"{"action":"set_stage","stage":"PLANNING"}"#,
        r#"{"action":"set_todo_list","todo_list":["收集厂商公告","整理时间线"]}"#,
        r#"{"action":"set_stage","stage":"EXECUTE"}"#,
        r#"{"action":"tool_use","think":"","tool_use":[{"tool_name":"word_count","args":{"text":"a b c"}}]}"#,
        r##"{"action":"write_file","think":"","path":"report/summary.md","content":"# 固态电池"}"##,
        r#"{"action":"finished","think":"完成","result":"报告已写入 report/summary.md","success":"true"}"#,
    ]));
    let mut registry = ToolRegistry::new();
    registry.register(WordCount);
    let host = host_with(llm.clone(), Some(3), &registry);

    let channel = ScriptedChannel::new(&["固态电池"]);
    let dispatcher = ActionDispatcher::new(channel.clone())
        .with_tools(Arc::new(ToolExecutor::new(registry, 5)))
        .with_file_sink(Arc::new(WorkspaceFileSink::new(workspace.path())));

    let (id, outcome) = host.start(&dispatcher, "帮我调研一下电池").await.unwrap();
    assert_eq!(
        outcome,
        DispatchOutcome::Finished {
            result: "报告已写入 report/summary.md".to_string(),
            success: true
        }
    );

    // ask 之后的下一轮输入是用户回复，set_research_topic 的确认是再下一轮的提示
    assert_eq!(llm.prompt_of_call(1).as_deref(), Some("固态电池"));
    let ack = llm.prompt_of_call(2).unwrap();
    assert!(ack.starts_with("<system>"));
    assert!(ack.contains("固态电池量产进展"));

    let tool_result = llm.prompt_of_call(6).unwrap();
    assert!(tool_result.contains(r#""word_count":"3""#));

    let written = std::fs::read_to_string(workspace.path().join("report/summary.md")).unwrap();
    assert_eq!(written, "# 固态电池");

    let handle = host.sessions().get(&id).await.unwrap();
    let agent = handle.lock().await;
    assert_eq!(agent.stage(), Stage::Execute);
    assert_eq!(agent.topic(), Some("固态电池量产进展"));
    assert_eq!(agent.todos().len(), 2);
    assert!(agent
        .todos()
        .entries()
        .iter()
        .all(|e| e.status == TodoStatus::Queued));

    // ASK 阶段：两个完整回合（ask + set_research_topic）与 set_stage
    let ask = agent.history().distilled_for(Stage::Ask);
    assert_eq!(ask.len(), 6);
    assert_eq!(ask[1].content, "想研究哪类电池？");
    assert_eq!(ask[5].content, "PLANNING");
    assert_eq!(agent.history().raw_all().len(), 16);
    assert_eq!(channel.sent().first().map(String::as_str), Some("想研究哪类电池？"));
}

#[tokio::test]
async fn test_repaired_turn_leaves_single_raw_pair() {
    let llm = Arc::new(ScriptedLlmClient::new([
        "我觉得应该先问问用户",
        r#"{"action": "ask", "think": "缺少 question"}"#,
        r#"{"action":"ask","think":"","question":"预算多少？"}"#,
    ]));
    let host = host_with(llm.clone(), Some(5), &ToolRegistry::new());
    let channel = ScriptedChannel::new(&[]);
    let dispatcher = ActionDispatcher::new(channel).with_reply_timeout(Duration::from_millis(20));

    let (id, outcome) = host.start(&dispatcher, "买电脑").await.unwrap();
    assert_eq!(outcome, DispatchOutcome::TimedOut);
    assert_eq!(llm.call_count(), 3);

    // 第三次调用的上下文里带着两次失败的交换
    let third = &llm.calls()[2];
    assert_eq!(third.len(), 6);
    assert_eq!(third[2].content, "我觉得应该先问问用户");
    assert!(third[5].content.starts_with("<system>"));

    let raw = host.export_raw(&id).await.unwrap();
    let raw = raw.as_array().unwrap();
    assert_eq!(raw.len(), 2);
    assert_eq!(raw[0]["content"], "买电脑");
    assert_eq!(raw[1]["content"]["question"], "预算多少？");
}

#[tokio::test]
async fn test_timed_out_session_resumes_by_id() {
    let llm = Arc::new(ScriptedLlmClient::new([
        r#"{"action":"ask","think":"","question":"关注哪个市场？"}"#,
    ]));
    let host = host_with(llm.clone(), Some(1), &ToolRegistry::new());
    let channel = ScriptedChannel::new(&[]);
    let dispatcher =
        ActionDispatcher::new(channel.clone()).with_reply_timeout(Duration::from_millis(20));

    let (id, outcome) = host.start(&dispatcher, "新能源车").await.unwrap();
    assert_eq!(outcome, DispatchOutcome::TimedOut);
    let sent = channel.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].contains(&id));

    llm.push_reply(r#"{"action":"set_research_topic","research_topic":"欧洲新能源车市场"}"#);
    llm.push_reply(r#"{"action":"finished","think":"","result":"done","success":false}"#);
    let outcome = host.resume(&id, &dispatcher, "欧洲").await.unwrap();
    assert_eq!(
        outcome,
        DispatchOutcome::Finished {
            result: "done".to_string(),
            success: false
        }
    );

    let handle = host.sessions().get(&id).await.unwrap();
    let agent = handle.lock().await;
    let ask = agent.history().distilled_for(Stage::Ask);
    assert_eq!(ask[2].role, Role::User);
    assert_eq!(ask[2].content, "欧洲");
    assert_eq!(agent.topic(), Some("欧洲新能源车市场"));
}

#[tokio::test]
async fn test_backend_failure_ends_run_without_history() {
    let llm = Arc::new(ScriptedLlmClient::new(Vec::<String>::new()));
    llm.push_failure("503 Service Unavailable");
    let host = host_with(llm.clone(), Some(5), &ToolRegistry::new());
    let channel = ScriptedChannel::new(&[]);
    let dispatcher = ActionDispatcher::new(channel.clone());

    let (id, outcome) = host.start(&dispatcher, "hello").await.unwrap();
    assert!(matches!(outcome, DispatchOutcome::Failed(msg) if msg.contains("503")));
    assert_eq!(llm.call_count(), 1);
    assert!(host.export_raw(&id).await.unwrap().as_array().unwrap().is_empty());
    assert_eq!(channel.sent().len(), 1);
}

#[tokio::test]
async fn test_sessions_run_independently() {
    let host = ResearchHost::new(Arc::new(TurnExecutor::new(Arc::new(MockLlmClient), None)), "");
    let a = host.create_session().await;
    let b = host.create_session().await;

    let channel_a = ScriptedChannel::new(&[]);
    let channel_b = ScriptedChannel::new(&[]);
    let dispatcher_a =
        ActionDispatcher::new(channel_a.clone()).with_reply_timeout(Duration::from_millis(50));
    let dispatcher_b =
        ActionDispatcher::new(channel_b.clone()).with_reply_timeout(Duration::from_millis(50));

    let (ra, rb) = tokio::join!(
        host.resume(&a, &dispatcher_a, "topic A"),
        host.resume(&b, &dispatcher_b, "topic B"),
    );
    assert_eq!(ra.unwrap(), DispatchOutcome::TimedOut);
    assert_eq!(rb.unwrap(), DispatchOutcome::TimedOut);
    assert_eq!(channel_a.sent()[0], "Echo from Mock: topic A");
    assert_eq!(channel_b.sent()[0], "Echo from Mock: topic B");
    assert_eq!(host.sessions().len().await, 2);
}
