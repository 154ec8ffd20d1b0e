//! OpenAI-compatible streaming chat completions (OpenAI and Azure OpenAI)

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{CompletionBackend, FragmentStream, is_recoverable_status};
use crate::transcript::Turn;
use crate::{Error, Result};

/// Marker the service sends as the final SSE payload
const DONE_MARKER: &str = "[DONE]";

/// Where chat completion requests are sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEndpoint {
    /// Azure OpenAI resource; the model name is the deployment name
    Azure {
        /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`
        endpoint: String,
        /// REST API version, e.g. `2024-06-01`
        api_version: String,
    },
    /// OpenAI or any compatible server
    OpenAi {
        /// Base URL, e.g. `https://api.openai.com/v1`
        base_url: String,
    },
}

impl ChatEndpoint {
    /// Full request URL for `model`
    #[must_use]
    pub fn url(&self, model: &str) -> String {
        match self {
            Self::Azure {
                endpoint,
                api_version,
            } => format!(
                "{}/openai/deployments/{model}/chat/completions?api-version={api_version}",
                endpoint.trim_end_matches('/')
            ),
            Self::OpenAi { base_url } => {
                format!("{}/chat/completions", base_url.trim_end_matches('/'))
            }
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    #[serde(default)]
    message: Option<String>,
}

/// Streams chat completions over server-sent events
#[derive(Debug)]
pub struct OpenAiChat {
    client: reqwest::Client,
    endpoint: ChatEndpoint,
    api_key: SecretString,
    model: String,
}

impl OpenAiChat {
    /// Create a new chat client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the HTTP client cannot be built
    pub fn new(endpoint: ChatEndpoint, api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "API key required for chat completions".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("vibespec/", env!("CARGO_PKG_VERSION")))
            .build()?;

        tracing::debug!(url = %endpoint.url(&model), model = %model, "chat client initialized");

        Ok(Self {
            client,
            endpoint,
            api_key: SecretString::from(api_key),
            model,
        })
    }

    /// Model (or Azure deployment) requests are sent to
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self) -> reqwest::RequestBuilder {
        let builder = self.client.post(self.endpoint.url(&self.model));
        match self.endpoint {
            ChatEndpoint::Azure { .. } => builder.header("api-key", self.api_key.expose_secret()),
            ChatEndpoint::OpenAi { .. } => builder.bearer_auth(self.api_key.expose_secret()),
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiChat {
    fn name(&self) -> &'static str {
        match self.endpoint {
            ChatEndpoint::Azure { .. } => "azure-openai",
            ChatEndpoint::OpenAi { .. } => "openai",
        }
    }

    async fn open_stream(&self, turns: &[Turn]) -> Result<FragmentStream> {
        let body = ChatRequest {
            model: &self.model,
            messages: turns,
            stream: true,
        };

        tracing::debug!(turns = turns.len(), model = %self.model, "sending chat completion request");

        let response = self.request().json(&body).send().await.map_err(|e| {
            tracing::error!(error = %e, "chat completion request failed");
            if e.is_connect() || e.is_timeout() || e.is_request() {
                Error::Connection(e.to_string())
            } else {
                Error::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat completion API error");
            let message = format!("chat completion API error {status}: {body}");
            return Err(if is_recoverable_status(status.as_u16()) {
                Error::Connection(message)
            } else {
                Error::Completion(message)
            });
        }

        let stream = response
            .bytes_stream()
            .eventsource()
            .take_while(|event| {
                let done = matches!(event, Ok(e) if e.data.trim() == DONE_MARKER);
                futures::future::ready(!done)
            })
            .map(|event| match event {
                Ok(event) => parse_chunk(&event.data),
                Err(e) => Err(Error::Connection(format!("reply stream interrupted: {e}"))),
            });

        Ok(stream.boxed())
    }
}

/// Extract the text fragment from one SSE payload
///
/// Chunks without choices (Azure's leading content-filter chunk, usage
/// trailers) and deltas without content yield an empty fragment.
fn parse_chunk(data: &str) -> Result<String> {
    let chunk: ChatChunk = serde_json::from_str(data)
        .map_err(|e| Error::Completion(format!("malformed stream chunk: {e}")))?;

    if let Some(error) = chunk.error {
        let message = error
            .message
            .unwrap_or_else(|| "error during streaming".to_string());
        return Err(Error::Completion(message));
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .unwrap_or_default())
}
