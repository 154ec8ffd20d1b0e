//! Reply classification and rendering
//!
//! Replies that contain a fenced code block are printed only. Everything else
//! is printed and, when a speech sink is attached, spoken as well.

use std::io::Write;

use async_trait::async_trait;

use crate::Result;

/// Fence delimiter that marks a reply as code
const CODE_FENCE: &str = "```";

/// Display name for assistant output
pub const ASSISTANT_NAME: &str = "VibeSpec";

/// How a reply is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Contains a code fence; printed verbatim, never spoken
    Code,
    /// Plain prose; printed and spoken
    Conversational,
}

/// Classify a complete reply
///
/// Any triple backtick anywhere in the reply makes it code, even when the
/// fence is only mentioned in passing.
#[must_use]
pub fn classify(reply: &str) -> ReplyKind {
    if reply.contains(CODE_FENCE) {
        ReplyKind::Code
    } else {
        ReplyKind::Conversational
    }
}

/// Something that can say text out loud
#[async_trait]
pub trait SpeechSink: Send + Sync {
    /// Speak `text` and return once playback has finished
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    async fn speak(&self, text: &str) -> Result<()>;
}

/// Routes replies to the console and, for prose, to a speech sink
pub struct Renderer {
    console: Box<dyn Write + Send>,
    speech: Option<Box<dyn SpeechSink>>,
}

impl Renderer {
    /// Create a renderer writing to `console`
    ///
    /// Pass `None` for `speech` in text-only mode.
    #[must_use]
    pub fn new(console: Box<dyn Write + Send>, speech: Option<Box<dyn SpeechSink>>) -> Self {
        Self { console, speech }
    }

    /// Renderer writing to standard output
    #[must_use]
    pub fn stdout(speech: Option<Box<dyn SpeechSink>>) -> Self {
        Self::new(Box::new(std::io::stdout()), speech)
    }

    /// Whether conversational replies are spoken
    #[must_use]
    pub fn speaks(&self) -> bool {
        self.speech.is_some()
    }

    /// Classify and render a complete reply
    pub async fn render(&mut self, reply: &str) -> ReplyKind {
        let kind = classify(reply);
        tracing::debug!(?kind, chars = reply.len(), "rendering reply");

        match kind {
            ReplyKind::Code => {
                self.print(&format!("\n{ASSISTANT_NAME} (code):\n{reply}\n"));
            }
            ReplyKind::Conversational => {
                self.print(&format!("\n{ASSISTANT_NAME}: {reply}\n"));
                speak(self.speech.as_deref(), reply).await;
            }
        }

        kind
    }

    /// Print and speak a fixed message such as the greeting
    pub async fn announce(&mut self, text: &str) {
        self.print(&format!("\n{ASSISTANT_NAME}: {text}\n"));
        speak(self.speech.as_deref(), text).await;
    }

    /// Print a status line that is never spoken
    pub fn notice(&mut self, text: &str) {
        self.print(&format!("{text}\n"));
    }

    fn print(&mut self, text: &str) {
        if let Err(e) = self
            .console
            .write_all(text.as_bytes())
            .and_then(|()| self.console.flush())
        {
            tracing::warn!(error = %e, "failed to write to console");
        }
    }
}

/// Best-effort speech: failures are logged, never returned
async fn speak(sink: Option<&dyn SpeechSink>, text: &str) {
    let Some(sink) = sink else {
        return;
    };

    if let Err(e) = sink.speak(text).await {
        tracing::warn!(error = %e, "speech synthesis failed, reply shown as text only");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::Error;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl SpeechSink for Recorder {
        async fn speak(&self, text: &str) -> Result<()> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl SpeechSink for Broken {
        async fn speak(&self, _text: &str) -> Result<()> {
            Err(Error::Synthesis("no output device".to_string()))
        }
    }

    #[test]
    fn fenced_reply_is_code() {
        let reply = "Here you go:\n```typespec\nmodel Book { title: string; }\n```";
        assert_eq!(classify(reply), ReplyKind::Code);
    }

    #[test]
    fn prose_is_conversational() {
        assert_eq!(classify("Sure, I can help with that."), ReplyKind::Conversational);
        assert_eq!(classify(""), ReplyKind::Conversational);
    }

    #[test]
    fn passing_mention_of_fence_is_code() {
        assert_eq!(
            classify("I'll wrap the output in ``` so you can copy it."),
            ReplyKind::Code
        );
    }

    #[test]
    fn single_and_double_backticks_are_prose() {
        assert_eq!(classify("Use the `model` keyword"), ReplyKind::Conversational);
        assert_eq!(classify("Use ``double`` ticks"), ReplyKind::Conversational);
    }

    #[tokio::test]
    async fn code_is_printed_not_spoken() {
        let console = Buffer::default();
        let speech = Recorder::default();
        let mut renderer = Renderer::new(Box::new(console.clone()), Some(Box::new(speech.clone())));

        let reply = "```typespec\nmodel Book {}\n```";
        assert_eq!(renderer.render(reply).await, ReplyKind::Code);

        assert!(console.contents().contains(reply));
        assert!(console.contents().contains("VibeSpec (code):"));
        assert!(speech.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn prose_is_printed_and_spoken() {
        let console = Buffer::default();
        let speech = Recorder::default();
        let mut renderer = Renderer::new(Box::new(console.clone()), Some(Box::new(speech.clone())));

        let reply = "Sure, I can help with that.";
        assert_eq!(renderer.render(reply).await, ReplyKind::Conversational);

        assert!(console.contents().contains("VibeSpec: Sure, I can help with that."));
        assert_eq!(*speech.0.lock().unwrap(), vec![reply.to_string()]);
    }

    #[tokio::test]
    async fn text_only_mode_prints() {
        let console = Buffer::default();
        let mut renderer = Renderer::new(Box::new(console.clone()), None);

        assert!(!renderer.speaks());
        renderer.render("Hello there").await;
        assert!(console.contents().contains("Hello there"));
    }

    #[tokio::test]
    async fn synthesis_failure_is_swallowed() {
        let console = Buffer::default();
        let mut renderer = Renderer::new(Box::new(console.clone()), Some(Box::new(Broken)));

        let kind = renderer.render("Still readable").await;
        assert_eq!(kind, ReplyKind::Conversational);
        assert!(console.contents().contains("Still readable"));
    }

    #[test]
    fn notice_goes_to_console() {
        let console = Buffer::default();
        let mut renderer = Renderer::new(Box::new(console.clone()), None);
        renderer.notice("Exiting chat...");
        assert_eq!(console.contents(), "Exiting chat...\n");
    }
}
