//! Operator prompt on the terminal

use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::warn;
use vss_core::bulletin::{async_trait, OperatorDecision};
use vss_core::PartyIndex;

/// Asks the operator on stdin whether to retry a failed round
pub struct ConsolePrompt {
    input: Mutex<BufReader<io::Stdin>>,
}

impl ConsolePrompt {
    pub fn new() -> Self {
        Self {
            input: Mutex::new(BufReader::new(io::stdin())),
        }
    }
}

#[async_trait]
impl OperatorDecision for ConsolePrompt {
    async fn retry(&self, label: &str, missing: &[PartyIndex]) -> bool {
        let mut input = self.input.lock().await;
        let question = format!(
            "Too few signatures on {label}, no answer from parties {missing:?}. Retry? [y/N] "
        );
        let mut stdout = io::stdout();
        if stdout.write_all(question.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
            return false;
        }

        let mut answer = String::new();
        match input.read_line(&mut answer).await {
            Ok(_) => is_yes(&answer),
            Err(e) => {
                warn!(error = %e, "Failed to read operator answer, halting");
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
