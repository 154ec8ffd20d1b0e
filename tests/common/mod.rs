//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use vibespec::completion::FragmentStream;
use vibespec::{
    CompletionBackend, Error, InputSource, Renderer, Result, RetryPolicy, Session, SpeechSink,
    Turn, Utterance,
};

pub const SYSTEM_PROMPT: &str = "You are VibeSpec, a TypeSpec guide.";

/// Input source that replays a fixed script, then reports end of input
pub struct ScriptedInput {
    script: VecDeque<Utterance>,
}

impl ScriptedInput {
    pub fn new(script: impl IntoIterator<Item = Utterance>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }

    /// Script made only of typed lines
    pub fn lines(lines: &[&str]) -> Self {
        Self::new(lines.iter().map(|l| Utterance::Text((*l).to_string())))
    }
}

#[async_trait]
impl InputSource for ScriptedInput {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn next_utterance(&mut self) -> Utterance {
        self.script.pop_front().unwrap_or(Utterance::EndOfInput)
    }
}

/// What the scripted backend does on one call
#[derive(Clone)]
pub enum Step {
    /// Stream these fragments
    Reply(Vec<&'static str>),
    /// Stream these fragments, then lose the connection
    Dropped(Vec<&'static str>),
    /// Fail to connect
    Unreachable,
    /// Reject the request outright
    Rejected,
}

/// Completion backend that follows a script and records every request
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    steps: Arc<Mutex<VecDeque<Step>>>,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Vec<Turn>>>>,
}

impl ScriptedBackend {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into_iter().collect())),
            ..Self::default()
        }
    }

    /// Backend that answers every call with the same text
    pub fn replying(reply: &'static str) -> Self {
        Self::new(std::iter::repeat_n(Step::Reply(vec![reply]), 16))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Transcripts sent with each call, in order
    pub fn requests(&self) -> Vec<Vec<Turn>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn open_stream(&self, turns: &[Turn]) -> Result<FragmentStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(turns.to_vec());

        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Unreachable);

        match step {
            Step::Reply(fragments) => Ok(futures::stream::iter(
                fragments.into_iter().map(|f| Ok(f.to_string())),
            )
            .boxed()),
            Step::Dropped(fragments) => Ok(futures::stream::iter(
                fragments
                    .into_iter()
                    .map(|f| Ok(f.to_string()))
                    .chain(std::iter::once(Err(Error::Connection(
                        "connection reset".to_string(),
                    )))),
            )
            .boxed()),
            Step::Unreachable => Err(Error::Connection("connection refused".to_string())),
            Step::Rejected => Err(Error::Completion("401 Unauthorized".to_string())),
        }
    }
}

/// Speech sink that records what it was asked to say
#[derive(Clone, Default)]
pub struct RecordingSink {
    spoken: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSink for RecordingSink {
    async fn speak(&self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Speech sink that always fails
pub struct FailingSink;

#[async_trait]
impl SpeechSink for FailingSink {
    async fn speak(&self, _text: &str) -> Result<()> {
        Err(Error::Synthesis("no output device".to_string()))
    }
}

/// Console that can be read back after the session
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A session wired to test doubles, with the handles to inspect them
pub struct Harness {
    pub session: Session,
    pub backend: ScriptedBackend,
    pub console: SharedBuffer,
    pub sink: RecordingSink,
}

/// Build a voice-capable session with no retry delay
pub fn harness(input: ScriptedInput, backend: ScriptedBackend) -> Harness {
    let console = SharedBuffer::default();
    let sink = RecordingSink::default();
    let renderer = Renderer::new(Box::new(console.clone()), Some(Box::new(sink.clone())));

    let session = Session::new(SYSTEM_PROMPT, Box::new(input), Box::new(backend.clone()), renderer)
        .with_retry(RetryPolicy::immediate(3));

    Harness {
        session,
        backend,
        console,
        sink,
    }
}
