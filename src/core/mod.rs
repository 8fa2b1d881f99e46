//! 核心层：错误与恢复、阶段状态机、会话存储

pub mod error;
pub mod recovery;
pub mod session_store;
pub mod state;

pub use error::{RecoveryAction, ResearchError};
pub use recovery::RecoveryEngine;
pub use session_store::{SessionHandle, SessionStore};
pub use state::{Stage, StageMachine};
