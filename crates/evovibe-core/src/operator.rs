//! Human operator interaction.
//!
//! Every question the run asks goes through [`Operator`]. Invalid answers
//! are re-asked in place; only a closed input stream ends a prompt loop
//! with an error.

use std::path::Path;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::{EvovibeError, EvovibeResult};

#[async_trait]
pub trait Operator: Send + Sync {
    /// Print `question` and read one line of input, without the newline.
    async fn prompt(&self, question: &str) -> EvovibeResult<String>;

    /// Print an informational message.
    async fn notify(&self, message: &str);

    /// Let the operator look at an image.
    async fn show_image(&self, path: &Path) {
        self.notify(&format!("Check the image {}", path.display()))
            .await;
    }

    /// Block until the operator presses ENTER.
    async fn confirm(&self, message: &str) -> EvovibeResult<()> {
        self.prompt(&format!("{message} Press ENTER to continue."))
            .await
            .map(|_| ())
    }

    async fn ask_yes_no(&self, question: &str) -> EvovibeResult<bool> {
        loop {
            let answer = self.prompt(&format!("{question} [y/n]")).await?;
            match answer.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.notify("Please answer y or n.").await,
            }
        }
    }

    /// Ask for an integer in `min..=max`.
    async fn ask_number(&self, question: &str, min: u32, max: u32) -> EvovibeResult<u32> {
        loop {
            let answer = self.prompt(question).await?;
            match answer.trim().parse::<u32>() {
                Ok(n) if (min..=max).contains(&n) => return Ok(n),
                Ok(n) => {
                    self.notify(&format!("{n} is outside {min}..={max}."))
                        .await
                }
                Err(_) => self.notify("Not a number!").await,
            }
        }
    }
}

/// Operator at the controlling terminal.
pub struct TerminalOperator {
    input: Mutex<Lines<BufReader<Stdin>>>,
    viewer: Option<String>,
}

impl TerminalOperator {
    pub fn new() -> Self {
        Self {
            input: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
            viewer: None,
        }
    }

    /// Open images with `program` (e.g. ImageMagick `display`) instead of printing their path.
    pub fn with_viewer(mut self, program: impl Into<String>) -> Self {
        self.viewer = Some(program.into());
        self
    }
}

impl Default for TerminalOperator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operator for TerminalOperator {
    async fn prompt(&self, question: &str) -> EvovibeResult<String> {
        let mut out = tokio::io::stdout();
        out.write_all(format!("{question} ").as_bytes())
            .await
            .map_err(|e| EvovibeError::io("<stdout>", e))?;
        out.flush()
            .await
            .map_err(|e| EvovibeError::io("<stdout>", e))?;
        let mut input = self.input.lock().await;
        match input
            .next_line()
            .await
            .map_err(|e| EvovibeError::io("<stdin>", e))?
        {
            Some(line) => Ok(line),
            None => Err(EvovibeError::OperatorClosed),
        }
    }

    async fn notify(&self, message: &str) {
        println!("{message}");
    }

    async fn show_image(&self, path: &Path) {
        let Some(viewer) = &self.viewer else {
            self.notify(&format!("Check the image {}", path.display()))
                .await;
            return;
        };
        if let Err(e) = tokio::process::Command::new(viewer).arg(path).spawn() {
            warn!(viewer = %viewer, error = %e, "image viewer failed to start");
            self.notify(&format!("Check the image {}", path.display()))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedOperator;

    #[tokio::test]
    async fn yes_no_reprompts_on_garbage() {
        let op = ScriptedOperator::new().script(["maybe", "", "Y"]);
        assert!(op.ask_yes_no("Accept?").await.unwrap());
        assert_eq!(op.prompts().len(), 3);
        assert!(op
            .transcript()
            .iter()
            .any(|line| line.contains("Please answer y or n")));
    }

    #[tokio::test]
    async fn number_reprompts_until_in_range() {
        let op = ScriptedOperator::new().script(["abc", "900", "42"]);
        assert_eq!(op.ask_number("Left?", 0, 599).await.unwrap(), 42);
        assert_eq!(op.prompts().len(), 3);
    }

    #[tokio::test]
    async fn exhausted_script_closes_input() {
        let op = ScriptedOperator::new();
        assert!(matches!(
            op.ask_yes_no("Anything?").await,
            Err(EvovibeError::OperatorClosed)
        ));
    }
}
