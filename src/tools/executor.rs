//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，处理 tool_use 动作：一批调用并发执行，每个调用单独超时，
//! 结果汇总为以工具名为 key 的字典。每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde_json::{Map, Value};
use tokio::time::timeout;

use crate::core::ResearchError;
use crate::research::ToolInvocation;
use crate::tools::ToolRegistry;

/// 一批 tool_use 调用的结果
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// 以工具名为 key 的结果字典，失败项为 "Error: ..."
    pub results: Value,
    /// 失败（出错或超时）的调用数
    pub failed: usize,
}

/// 工具执行器：对每次调用施加超时，并将结果映射为 ResearchError
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// 执行单个工具；超时或工具返回 Err 都转为 Collaborator 错误
    pub async fn execute(&self, tool_name: &str, args: Value) -> Result<String, ResearchError> {
        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = timeout(self.timeout, self.registry.execute(tool_name, args)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(e)) => Err(ResearchError::Collaborator(format!("{tool_name}: {e}"))),
            Err(_) => Err(ResearchError::Collaborator(format!(
                "{tool_name}: timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    /// 并发执行一批调用；同名工具多次调用时后续 key 加序号（name#2、name#3）
    pub async fn execute_batch(&self, calls: &[ToolInvocation]) -> BatchOutcome {
        let results = join_all(
            calls
                .iter()
                .map(|call| self.execute(&call.tool_name, call.args.clone())),
        )
        .await;

        let mut out = Map::new();
        let mut failed = 0;
        for (call, result) in calls.iter().zip(results) {
            let mut key = call.tool_name.clone();
            let mut n = 1;
            while out.contains_key(&key) {
                n += 1;
                key = format!("{}#{}", call.tool_name, n);
            }
            let value = match result {
                Ok(content) => Value::String(content),
                Err(e) => {
                    failed += 1;
                    Value::String(format!("Error: {}", e))
                }
            };
            out.insert(key, value);
        }
        BatchOutcome {
            results: Value::Object(out),
            failed,
        }
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo text"
        }

        async fn execute(&self, args: Value) -> Result<String, String> {
            Ok(args.get("text").and_then(|v| v.as_str()).unwrap_or("").to_string())
        }
    }

    struct Slow;

    #[async_trait]
    impl Tool for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "Never finishes in time"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }
    }

    fn call(name: &str, text: &str) -> ToolInvocation {
        ToolInvocation {
            tool_name: name.to_string(),
            args: serde_json::json!({"text": text}),
        }
    }

    #[tokio::test]
    async fn test_batch_keys_by_tool_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Echo);
        let executor = ToolExecutor::new(registry, 5);

        let batch = executor
            .execute_batch(&[call("echo", "a"), call("echo", "b"), call("missing", "c")])
            .await;
        assert_eq!(batch.failed, 1);
        let out = &batch.results;
        assert_eq!(out["echo"], "a");
        assert_eq!(out["echo#2"], "b");
        assert!(out["missing"].as_str().unwrap().starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_error_entry() {
        let mut registry = ToolRegistry::new();
        registry.register(Slow);
        let executor = ToolExecutor::new(registry, 0);
        let err = executor.execute("slow", Value::Null).await.unwrap_err();
        assert!(matches!(err, ResearchError::Collaborator(msg) if msg.contains("timed out")));

        let batch = executor.execute_batch(&[call("slow", "x")]).await;
        assert_eq!(batch.failed, 1);
        assert!(batch.results["slow"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_clean_batch_has_no_failures() {
        let mut registry = ToolRegistry::new();
        registry.register(Echo);
        let executor = ToolExecutor::new(registry, 5);
        let batch = executor.execute_batch(&[call("echo", "a")]).await;
        assert_eq!(batch.failed, 0);
        assert_eq!(batch.results["echo"], "a");
    }
}
