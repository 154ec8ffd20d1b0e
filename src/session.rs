//! Session - the conversational turn loop
//!
//! Reads an utterance, checks for the exit phrase, asks the model for a reply
//! with bounded retry, renders it, and records both sides in the transcript.
//! Exactly one request is ever outstanding.

use std::sync::LazyLock;

use regex::Regex;

use crate::completion::{CompletionBackend, RetryPolicy, complete_with_retry};
use crate::input::{InputSource, Utterance};
use crate::render::{Renderer, ReplyKind};
use crate::transcript::Transcript;

/// "exit now", optional single space, optional trailing period
static EXIT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^exit\s?now\.?$").expect("valid regex")
});

/// Shown when every completion attempt failed to connect
pub const CONNECTION_FAILURE_MESSAGE: &str =
    "Failed to connect after several attempts. Please check your network and try again later.";

/// Printed when the session closes
pub const FAREWELL: &str = "Exiting chat...";

/// Whether `input` is the phrase that ends a session
#[must_use]
pub fn is_exit_phrase(input: &str) -> bool {
    EXIT_PATTERN.is_match(input.trim())
}

/// Where the turn loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting on the input source
    AwaitingInput,
    /// A completion request is in flight
    Requesting,
    /// A reply is being printed or spoken
    Rendering,
    /// The session has ended
    Closed,
}

/// What one pass through the loop did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A reply was rendered and recorded
    Replied(ReplyKind),
    /// The input source produced nothing; nothing was recorded
    NoInput,
    /// The request failed; the user turn stays without a reply
    Failed,
    /// Exit phrase or end of input
    Closed,
}

/// One interactive conversation
pub struct Session {
    transcript: Transcript,
    input: Box<dyn InputSource>,
    backend: Box<dyn CompletionBackend>,
    renderer: Renderer,
    retry: RetryPolicy,
    greeting: Option<String>,
    state: SessionState,
}

impl Session {
    /// Create a session whose transcript starts with `system_prompt`
    #[must_use]
    pub fn new(
        system_prompt: impl Into<String>,
        input: Box<dyn InputSource>,
        backend: Box<dyn CompletionBackend>,
        renderer: Renderer,
    ) -> Self {
        Self {
            transcript: Transcript::new(system_prompt),
            input,
            backend,
            renderer,
            retry: RetryPolicy::default(),
            greeting: None,
            state: SessionState::AwaitingInput,
        }
    }

    /// Replace the completion retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Announce `greeting` before the first turn
    ///
    /// The greeting is printed and spoken but not added to the transcript.
    #[must_use]
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = Some(greeting.into());
        self
    }

    /// Conversation so far
    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Current loop state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Run one pass: wait for input, then request and render a reply
    pub async fn step(&mut self) -> TurnOutcome {
        if self.state == SessionState::Closed {
            return TurnOutcome::Closed;
        }

        self.state = SessionState::AwaitingInput;
        let text = match self.input.next_utterance().await {
            Utterance::Text(text) => text,
            Utterance::Nothing => return TurnOutcome::NoInput,
            Utterance::EndOfInput => {
                tracing::info!(source = self.input.name(), "input closed");
                self.state = SessionState::Closed;
                return TurnOutcome::Closed;
            }
        };

        if is_exit_phrase(&text) {
            tracing::info!("exit phrase received");
            self.state = SessionState::Closed;
            return TurnOutcome::Closed;
        }

        self.state = SessionState::Requesting;
        self.transcript.push_user(text);
        tracing::debug!(
            backend = self.backend.name(),
            turns = self.transcript.len(),
            "requesting completion"
        );

        let renderer = &mut self.renderer;
        let result = complete_with_retry(
            self.backend.as_ref(),
            self.transcript.turns(),
            &self.retry,
            |e, attempt, max_attempts| {
                renderer.notice(&format!(
                    "Connection error: {e}. Retrying ({attempt}/{max_attempts})..."
                ));
            },
        )
        .await;

        let reply = match result {
            Ok(reply) => reply,
            Err(e) if e.is_connection() => {
                tracing::error!(error = %e, "completion failed after retries");
                self.renderer.notice(CONNECTION_FAILURE_MESSAGE);
                self.state = SessionState::AwaitingInput;
                return TurnOutcome::Failed;
            }
            Err(e) => {
                tracing::error!(error = %e, "completion request rejected");
                self.renderer.notice(&format!("Request failed: {e}"));
                self.state = SessionState::AwaitingInput;
                return TurnOutcome::Failed;
            }
        };

        self.state = SessionState::Rendering;
        let kind = self.renderer.render(&reply).await;
        self.transcript.push_assistant(reply);
        self.state = SessionState::AwaitingInput;

        TurnOutcome::Replied(kind)
    }

    /// Greet, then loop until the session closes
    ///
    /// Returns the final transcript.
    pub async fn run(mut self) -> Transcript {
        if let Some(greeting) = self.greeting.take() {
            self.renderer.announce(&greeting).await;
        }

        tracing::info!(
            input = self.input.name(),
            backend = self.backend.name(),
            speaks = self.renderer.speaks(),
            prompt_chars = self.transcript.system_prompt().len(),
            "session started"
        );

        loop {
            match self.step().await {
                TurnOutcome::Closed => break,
                TurnOutcome::NoInput => tracing::trace!("no input, prompting again"),
                TurnOutcome::Failed | TurnOutcome::Replied(_) => {}
            }
        }

        self.renderer.notice(FAREWELL);
        tracing::info!(turns = self.transcript.len(), "session closed");

        self.transcript
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_phrase_variants() {
        for phrase in [
            "exit now",
            "Exit Now.",
            "exitnow",
            "EXIT NOW",
            "  exit now  ",
            "exit\tnow",
            "Exit now.\n",
        ] {
            assert!(is_exit_phrase(phrase), "{phrase:?} should exit");
        }
    }

    #[test]
    fn not_exit_phrases() {
        for phrase in [
            "",
            "exit",
            "exit  now",
            "please exit now",
            "exit now please",
            "exit now..",
            "exit later",
        ] {
            assert!(!is_exit_phrase(phrase), "{phrase:?} should not exit");
        }
    }
}
