//! VibeSpec - conversational assistant for designing TypeSpec APIs
//!
//! This library provides the pieces of a single interactive session:
//! - Text or speech input (microphone capture, end-of-speech detection, STT)
//! - Streaming chat completion with bounded retry
//! - Reply classification: code is printed, prose is printed and spoken (TTS)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Input Source                      │
//! │        Text (stdin)   │   Speech (mic + STT)         │
//! └────────────────────┬────────────────────────────────┘
//!                      │ utterance
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Session (turn loop)                 │
//! │   exit check │ Transcript │ retry │ classify/render  │
//! └──────────┬─────────────────────────────┬────────────┘
//!            │ full transcript             │ prose
//! ┌──────────▼──────────────┐   ┌──────────▼────────────┐
//! │ Chat completion (SSE)   │   │ TTS + playback        │
//! │ Azure OpenAI │ OpenAI   │   │ Azure │ OpenAI        │
//! └─────────────────────────┘   └───────────────────────┘
//! ```

pub mod completion;
pub mod config;
pub mod error;
pub mod input;
pub mod prompt;
pub mod render;
pub mod session;
pub mod setup;
pub mod transcript;
pub mod voice;

pub use completion::{CompletionBackend, FragmentStream, OpenAiChat, RetryPolicy};
pub use config::{Config, InputMode, Overrides};
pub use error::{Error, Result};
pub use input::{InputSource, SpeechInput, TextInput, Utterance};
pub use render::{Renderer, ReplyKind, SpeechSink};
pub use session::{Session, SessionState, TurnOutcome};
pub use transcript::{Role, Transcript, Turn};
