//! Interactive answers to clarifying questions

use async_trait::async_trait;
use quarry_research::{AnswerSource, ResearchError, ResearchResult};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Shows the clarifying prompt on `output` and reads the answer from `input`.
///
/// Answers may span several lines and end with an empty line or end of input.
pub struct LineAnswerSource<R, W> {
    io: Mutex<(R, W)>,
}

impl<R, W> LineAnswerSource<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            io: Mutex::new((input, output)),
        }
    }
}

/// Answer source reading from the terminal
pub fn stdin_answer_source(
) -> LineAnswerSource<tokio::io::BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    LineAnswerSource::new(
        tokio::io::BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
}

#[async_trait]
impl<R, W> AnswerSource for LineAnswerSource<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn answer(&self, _topic: &str, prompt: &str) -> ResearchResult<String> {
        let mut io = self.io.lock().await;
        let (input, output) = &mut *io;

        let banner = format!("\n{}\n\n(finish with an empty line)\n> ", prompt);
        output
            .write_all(banner.as_bytes())
            .await
            .map_err(|e| ResearchError::capability_with_source("answer source", "Failed to show prompt", e))?;
        output
            .flush()
            .await
            .map_err(|e| ResearchError::capability_with_source("answer source", "Failed to show prompt", e))?;

        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            let read = input
                .read_line(&mut line)
                .await
                .map_err(|e| ResearchError::capability_with_source("answer source", "Failed to read answer", e))?;

            let line = line.trim_end();
            if read == 0 || line.trim().is_empty() {
                break;
            }
            lines.push(line.to_string());
        }

        Ok(lines.join("\n"))
    }
}
