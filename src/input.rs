//! Where user utterances come from
//!
//! The input source is picked once at startup: typed lines or recognized
//! speech. Either way each call yields at most one utterance, and every
//! failure is handled here so the turn loop only sees "something", "nothing"
//! or "no more input".

use std::io::Write;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};

use crate::voice::{ListenSettings, SAMPLE_RATE, SpeechToText, record_utterance, samples_to_wav};

/// Result of waiting for one utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Utterance {
    /// Text to act on, verbatim (may be empty)
    Text(String),
    /// Nothing usable this time; prompt again
    Nothing,
    /// The input stream is closed
    EndOfInput,
}

/// A source of user utterances
#[async_trait]
pub trait InputSource: Send {
    /// Short source name for logs
    fn name(&self) -> &'static str;

    /// Wait for the next utterance
    async fn next_utterance(&mut self) -> Utterance;
}

/// Consecutive read failures after which the reader is treated as closed
const MAX_READ_FAILURES: u32 = 3;

/// Reads one line per turn from an async reader
pub struct TextInput<R> {
    reader: R,
    prompt: Option<String>,
    failures: u32,
}

impl TextInput<BufReader<Stdin>> {
    /// Read from standard input, printing `You: ` before each line
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin())).with_prompt("\nYou: ")
    }
}

impl<R> TextInput<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// Read lines from `reader` without printing a prompt
    #[must_use]
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            prompt: None,
            failures: 0,
        }
    }

    /// Print `prompt` to stdout before each read
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }
}

#[async_trait]
impl<R> InputSource for TextInput<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    fn name(&self) -> &'static str {
        "text"
    }

    async fn next_utterance(&mut self) -> Utterance {
        if let Some(prompt) = &self.prompt {
            print!("{prompt}");
            let _ = std::io::stdout().flush();
        }

        // Raw bytes so a line that is not valid UTF-8 is still delivered
        let mut line = Vec::new();
        match self.reader.read_until(b'\n', &mut line).await {
            Ok(0) => Utterance::EndOfInput,
            Ok(_) => {
                self.failures = 0;
                let line = String::from_utf8_lossy(&line);
                Utterance::Text(line.trim_end_matches(['\n', '\r']).to_string())
            }
            Err(e) => {
                self.failures += 1;
                if self.failures >= MAX_READ_FAILURES {
                    tracing::error!(error = %e, failures = self.failures, "input unreadable, closing");
                    return Utterance::EndOfInput;
                }
                tracing::warn!(error = %e, "failed to read input");
                Utterance::Nothing
            }
        }
    }
}

/// Captures one spoken utterance per turn and recognizes it
pub struct SpeechInput {
    stt: SpeechToText,
    settings: ListenSettings,
}

impl SpeechInput {
    /// Create a speech source with the given capture timeouts
    #[must_use]
    pub const fn new(stt: SpeechToText, settings: ListenSettings) -> Self {
        Self { stt, settings }
    }

    async fn listen(&self) -> crate::Result<Option<String>> {
        let settings = self.settings;
        let samples = tokio::task::spawn_blocking(move || record_utterance(settings))
            .await
            .map_err(|e| crate::Error::Audio(format!("capture task failed: {e}")))??;

        let Some(samples) = samples else {
            return Ok(None);
        };

        let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
        self.stt.transcribe(&wav).await
    }
}

#[async_trait]
impl InputSource for SpeechInput {
    fn name(&self) -> &'static str {
        "speech"
    }

    async fn next_utterance(&mut self) -> Utterance {
        println!("\nListening...");

        match self.listen().await {
            Ok(Some(text)) => {
                println!("You: {text}");
                Utterance::Text(text)
            }
            Ok(None) => {
                tracing::debug!("no speech could be recognized");
                println!("(no speech recognized)");
                Utterance::Nothing
            }
            Err(e) => {
                tracing::warn!(error = %e, "speech recognition canceled");
                Utterance::Nothing
            }
        }
    }
}
