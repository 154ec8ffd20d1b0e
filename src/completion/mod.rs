//! Chat completion client
//!
//! A [`CompletionBackend`] turns the full transcript into a stream of reply
//! fragments. [`complete_with_retry`] drives one backend through the bounded
//! retry policy and assembles the fragments into a single reply.

mod openai;
mod retry;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;

pub use openai::{ChatEndpoint, OpenAiChat};
pub use retry::{RetryPolicy, complete_with_retry, is_recoverable_status};

use crate::Result;
use crate::transcript::Turn;

/// Lazy, finite, non-restartable sequence of reply fragments
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// A remote model that answers a conversation with streamed text
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Submit the whole conversation and open the reply stream
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Connection`] if the service cannot be reached,
    /// or another error if it rejects the request
    async fn open_stream(&self, turns: &[Turn]) -> Result<FragmentStream>;
}

/// Concatenate fragments in arrival order, skipping empty ones
///
/// # Errors
///
/// Returns the first error yielded by the stream; fragments read so far are
/// discarded
pub async fn collect_reply(mut stream: FragmentStream) -> Result<String> {
    let mut reply = String::new();
    let mut fragments = 0usize;

    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        if fragment.is_empty() {
            continue;
        }
        reply.push_str(&fragment);
        fragments += 1;
    }

    tracing::debug!(fragments, chars = reply.len(), "reply stream complete");
    Ok(reply)
}
