//! 控制台通道：stdin 读取用户输入，stdout 输出

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::integrations::UserChannel;

pub struct ConsoleChannel {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl ConsoleChannel {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

impl Default for ConsoleChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserChannel for ConsoleChannel {
    async fn send_text(&self, text: &str) -> Result<(), String> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("{}\n> ", text).as_bytes())
            .await
            .map_err(|e| e.to_string())?;
        stdout.flush().await.map_err(|e| e.to_string())
    }

    async fn next_input(&self) -> Option<String> {
        let mut lines = self.lines.lock().await;
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => return Some(line.trim().to_string()),
                Ok(None) => return None,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    return None;
                }
            }
        }
    }
}
