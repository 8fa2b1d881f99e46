//! 阶段定义：Stage 与 StageMachine
//!
//! 研究任务共四个阶段：ASK（明确目标）→ PLANNING（计划任务）→ EXECUTE（执行任务）→ FINISHED（任务完成）。
//! 状态机是宽松的：只有 set_stage 动作能改变阶段，但不校验先后顺序，任何阶段都可以跳到任何阶段
//! （包括离开 FINISHED）。顺序约束由系统提示词交给模型遵守。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 研究任务阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Stage {
    Ask,
    Planning,
    Execute,
    Finished,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Ask, Stage::Planning, Stage::Execute, Stage::Finished];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ask => "ASK",
            Stage::Planning => "PLANNING",
            Stage::Execute => "EXECUTE",
            Stage::Finished => "FINISHED",
        }
    }

    /// 阶段的中文说明（用于系统提示词）
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Ask => "明确目标",
            Stage::Planning => "计划任务",
            Stage::Execute => "执行任务",
            Stage::Finished => "任务完成",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    /// 大小写不敏感，模型偶尔会输出小写
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASK" => Ok(Stage::Ask),
            "PLANNING" => Ok(Stage::Planning),
            "EXECUTE" => Ok(Stage::Execute),
            "FINISHED" => Ok(Stage::Finished),
            other => Err(format!(
                "unknown stage '{other}', expected one of ASK, PLANNING, EXECUTE, FINISHED"
            )),
        }
    }
}

impl TryFrom<String> for Stage {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Stage> for String {
    fn from(stage: Stage) -> Self {
        stage.as_str().to_string()
    }
}

/// 阶段状态机：初始为 ASK，仅通过 transition 改变
#[derive(Clone, Debug)]
pub struct StageMachine {
    current: Stage,
}

impl StageMachine {
    pub fn new() -> Self {
        Self { current: Stage::Ask }
    }

    pub fn current(&self) -> Stage {
        self.current
    }

    /// 切换到目标阶段，返回切换前的阶段。不校验顺序。
    pub fn transition(&mut self, target: Stage) -> Stage {
        let previous = self.current;
        self.current = target;
        if previous != target {
            tracing::info!(from = %previous, to = %target, "stage transition");
        }
        previous
    }
}

impl Default for StageMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_stage_is_ask() {
        assert_eq!(StageMachine::new().current(), Stage::Ask);
    }

    #[test]
    fn test_current_equals_last_transition() {
        let mut machine = StageMachine::new();
        let targets = [
            Stage::Execute,
            Stage::Ask,
            Stage::Finished,
            Stage::Planning,
            Stage::Planning,
        ];
        for target in targets {
            machine.transition(target);
            assert_eq!(machine.current(), target);
        }
    }

    /// 宽松性：允许跳过阶段、倒退，以及离开 FINISHED
    #[test]
    fn test_transitions_are_permissive() {
        let mut machine = StageMachine::new();
        assert_eq!(machine.transition(Stage::Finished), Stage::Ask);
        assert_eq!(machine.transition(Stage::Ask), Stage::Finished);
        assert_eq!(machine.current(), Stage::Ask);
    }

    #[test]
    fn test_stage_parse_is_case_insensitive() {
        assert_eq!("planning".parse::<Stage>().unwrap(), Stage::Planning);
        assert_eq!(" EXECUTE ".parse::<Stage>().unwrap(), Stage::Execute);
        assert!("DONE".parse::<Stage>().is_err());
    }

    #[test]
    fn test_stage_serde_uses_wire_names() {
        let json = serde_json::to_string(&Stage::Finished).unwrap();
        assert_eq!(json, "\"FINISHED\"");
        let stage: Stage = serde_json::from_str("\"ask\"").unwrap();
        assert_eq!(stage, Stage::Ask);
    }
}
