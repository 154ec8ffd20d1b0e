//! Text-to-speech (TTS) processing

use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Azure output format matching the playback sample rate
const AZURE_OUTPUT_FORMAT: &str = "audio-24khz-48kbitrate-mono-mp3";

/// Longest `input` the `OpenAI` speech endpoint accepts
const OPENAI_MAX_INPUT_CHARS: usize = 4096;

/// TTS provider backend
#[derive(Clone, Debug)]
enum TtsProvider {
    Azure { region: String, language: String },
    OpenAI { model: String, speed: f32 },
}

/// Synthesizes speech from plain text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    voice: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a new TTS instance using Azure Speech
    ///
    /// # Errors
    ///
    /// Returns error if API key or region is missing
    pub fn new_azure(
        api_key: String,
        region: String,
        voice: String,
        language: String,
    ) -> Result<Self> {
        if api_key.is_empty() || region.is_empty() {
            return Err(Error::Config(
                "Azure Speech key and region required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key),
            voice,
            provider: TtsProvider::Azure { region, language },
        })
    }

    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(api_key: String, voice: String, model: String, speed: f32) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key),
            voice,
            provider: TtsProvider::OpenAI { model, speed },
        })
    }

    /// Voice identifier in use
    #[must_use]
    pub fn voice(&self) -> &str {
        &self.voice
    }

    /// Synthesize text to MP3 audio
    ///
    /// `on_chunk` is called with the size of every audio chunk as it arrives.
    /// Text longer than the provider accepts in one request is split at
    /// sentence or word boundaries and the MP3 streams are concatenated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Synthesis`] if a request or an audio stream fails
    pub async fn synthesize<F>(&self, text: &str, mut on_chunk: F) -> Result<Vec<u8>>
    where
        F: FnMut(usize) + Send,
    {
        let parts = match &self.provider {
            TtsProvider::Azure { .. } => vec![text],
            TtsProvider::OpenAI { .. } => split_text(text, OPENAI_MAX_INPUT_CHARS),
        };

        if parts.len() > 1 {
            tracing::info!(
                parts = parts.len(),
                chars = text.chars().count(),
                "splitting long text for synthesis"
            );
        }

        let mut audio = Vec::new();
        for part in parts {
            let request = match &self.provider {
                TtsProvider::Azure { region, language } => {
                    self.azure_request(region, language, part)
                }
                TtsProvider::OpenAI { model, speed } => self.openai_request(model, *speed, part),
            };

            let response = request
                .send()
                .await
                .map_err(|e| Error::Synthesis(format!("TTS request failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Synthesis(format!("TTS error {status}: {body}")));
            }

            audio.extend(read_audio(response, &mut on_chunk).await?);
        }

        tracing::debug!(bytes = audio.len(), "synthesis complete");
        Ok(audio)
    }

    fn azure_request(&self, region: &str, language: &str, text: &str) -> reqwest::RequestBuilder {
        let url = format!("https://{region}.tts.speech.microsoft.com/cognitiveservices/v1");

        self.client
            .post(url)
            .header("Ocp-Apim-Subscription-Key", self.api_key.expose_secret())
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", AZURE_OUTPUT_FORMAT)
            .header("User-Agent", "vibespec")
            .body(build_ssml(&self.voice, language, text))
    }

    fn openai_request(&self, model: &str, speed: f32, text: &str) -> reqwest::RequestBuilder {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
            response_format: &'a str,
        }

        let request = TtsRequest {
            model,
            input: text,
            voice: &self.voice,
            speed,
            response_format: "mp3",
        };

        self.client
            .post("https://api.openai.com/v1/audio/speech")
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
    }
}

/// Collect a streamed audio body, reporting each chunk
async fn read_audio<F>(response: reqwest::Response, mut on_chunk: F) -> Result<Vec<u8>>
where
    F: FnMut(usize) + Send,
{
    let mut audio = Vec::new();
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| Error::Synthesis(format!("audio stream interrupted: {e}")))?;
        on_chunk(chunk.len());
        audio.extend_from_slice(&chunk);
    }

    Ok(audio)
}

/// Split `text` into pieces of at most `max_chars` characters
///
/// Prefers to cut after a sentence end, then at whitespace, and only cuts
/// inside a word when a piece has neither.
fn split_text(text: &str, max_chars: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = text.trim();

    while rest.chars().count() > max_chars {
        let limit = rest
            .char_indices()
            .nth(max_chars)
            .map_or(rest.len(), |(i, _)| i);
        let head = &rest[..limit];

        let cut = head
            .rfind(['.', '!', '?', '\n'])
            .map(|i| i + 1)
            .or_else(|| head.rfind(char::is_whitespace))
            .filter(|&i| i > 0)
            .unwrap_or(limit);

        parts.push(rest[..cut].trim_end());
        rest = rest[cut..].trim_start();
    }

    if !rest.is_empty() {
        parts.push(rest);
    }
    parts
}

/// Wrap plain text in the minimal SSML document Azure expects
fn build_ssml(voice: &str, language: &str, text: &str) -> String {
    format!(
        "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='{}'><voice name='{}'>{}</voice></speak>",
        escape_xml(language),
        escape_xml(voice),
        escape_xml(text)
    )
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape_xml(r#"a < b & "c" > 'd'"#),
            "a &lt; b &amp; &quot;c&quot; &gt; &apos;d&apos;"
        );
        assert_eq!(escape_xml("plain text"), "plain text");
    }

    #[test]
    fn ssml_wraps_text_in_voice() {
        let ssml = build_ssml("en-US-BrianMultilingualNeural", "en-US", "Models & routes");
        assert!(ssml.starts_with("<speak version='1.0'"));
        assert!(ssml.contains("xml:lang='en-US'"));
        assert!(ssml.contains("<voice name='en-US-BrianMultilingualNeural'>Models &amp; routes</voice>"));
        assert!(ssml.ends_with("</speak>"));
    }

    #[test]
    fn rejects_missing_credentials() {
        assert!(
            TextToSpeech::new_azure(String::new(), "eastus".into(), "v".into(), "en-US".into())
                .is_err()
        );
        assert!(TextToSpeech::new_openai(String::new(), "alloy".into(), "tts-1".into(), 1.0).is_err());
    }

    #[test]
    fn short_text_is_one_part() {
        assert_eq!(split_text("  A library API.  ", 4096), vec!["A library API."]);
        assert!(split_text("   ", 4096).is_empty());
    }

    #[test]
    fn long_text_splits_at_sentence_ends() {
        let sentence = "Books have titles and authors. ";
        let text = sentence.repeat(300);

        let parts = split_text(&text, OPENAI_MAX_INPUT_CHARS);

        assert!(parts.len() > 1);
        for part in &parts {
            assert!(part.chars().count() <= OPENAI_MAX_INPUT_CHARS);
            assert!(part.ends_with('.'), "{part:?}");
        }
        let rejoined: String = parts.join(" ");
        assert_eq!(rejoined, text.trim());
    }

    #[test]
    fn falls_back_to_word_then_hard_cuts() {
        assert_eq!(split_text("alpha beta gamma", 11), vec!["alpha beta", "gamma"]);
        assert_eq!(split_text("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(split_text("ééééé", 2), vec!["éé", "éé", "é"]);
    }

    #[test]
    fn keeps_voice() {
        let tts = TextToSpeech::new_openai("key".into(), "alloy".into(), "tts-1".into(), 1.0).unwrap();
        assert_eq!(tts.voice(), "alloy");
    }
}
