//! Ask command handler.
//!
//! Answers one question, or holds an interactive conversation on stdin.

use clap::Args;
use convrag_core::{config::AppConfig, AppResult};
use convrag_knowledge::{Conversation, RagPipeline};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Ask questions in a conversation
#[derive(Args, Debug)]
pub struct AskCommand {
    /// Question to ask (starts an interactive conversation when omitted)
    pub question: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        config.validate()?;

        let pipeline = Arc::new(RagPipeline::from_config(config).await?);
        let mut conversation = Conversation::new(pipeline);

        match self.question.as_deref().map(str::trim) {
            Some(question) if !question.is_empty() => {
                let answer = conversation.answer(question).await?;
                self.print_answer(question, &answer, &conversation)
            }
            _ => self.interactive(&mut conversation).await,
        }
    }

    /// Read questions until EOF or `exit`/`quit`. Failed questions are
    /// reported and the conversation continues.
    async fn interactive(&self, conversation: &mut Conversation) -> AppResult<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            eprint!("Ask a question (type 'exit' to quit): ");
            std::io::stderr().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let question = line.trim();

            if question.is_empty() {
                continue;
            }
            if is_exit(question) {
                break;
            }

            match conversation.answer(question).await {
                Ok(answer) => self.print_answer(question, &answer, conversation)?,
                Err(e) => {
                    tracing::error!(stage = ?e.failed_stage(), "Question failed: {}", e);
                    eprintln!("Error: {}", e);
                }
            }
        }

        tracing::info!(
            turns = conversation.history().len(),
            "Conversation ended"
        );
        Ok(())
    }

    fn print_answer(
        &self,
        question: &str,
        answer: &str,
        conversation: &Conversation,
    ) -> AppResult<()> {
        if self.json {
            let output = serde_json::json!({
                "question": question,
                "answer": answer,
                "historyLength": conversation.history().len(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}\n", answer);
        }
        Ok(())
    }
}

fn is_exit(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_words() {
        assert!(is_exit("exit"));
        assert!(is_exit("QUIT"));
        assert!(!is_exit("exit now"));
        assert!(!is_exit("When was Pakistan founded?"));
    }
}
