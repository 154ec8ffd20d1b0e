//! Speech-to-text (STT) processing

use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Response from Azure Speech short-audio recognition
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AzureRecognition {
    recognition_status: String,
    #[serde(default)]
    display_text: Option<String>,
}

/// Response from OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// STT provider backend
#[derive(Clone, Debug)]
enum SttProvider {
    Azure { region: String },
    Whisper { model: String },
}

/// Transcribes one captured utterance
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    language: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a new STT instance using Azure Speech
    ///
    /// # Errors
    ///
    /// Returns error if API key or region is missing
    pub fn new_azure(api_key: String, region: String, language: String) -> Result<Self> {
        if api_key.is_empty() || region.is_empty() {
            return Err(Error::Config(
                "Azure Speech key and region required for recognition".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key),
            language,
            provider: SttProvider::Azure { region },
        })
    }

    /// Create a new STT instance using `OpenAI` Whisper
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_whisper(api_key: String, model: String, language: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key),
            language,
            provider: SttProvider::Whisper { model },
        })
    }

    /// Transcribe WAV audio
    ///
    /// Returns `None` when the service heard no recognizable speech.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Recognition`] if the request fails or recognition was
    /// canceled
    pub async fn transcribe(&self, wav: &[u8]) -> Result<Option<String>> {
        match &self.provider {
            SttProvider::Azure { region } => self.transcribe_azure(region, wav).await,
            SttProvider::Whisper { model } => self.transcribe_whisper(model, wav).await,
        }
    }

    /// Transcribe using the Azure Speech REST API for short audio
    async fn transcribe_azure(&self, region: &str, wav: &[u8]) -> Result<Option<String>> {
        tracing::debug!(audio_bytes = wav.len(), "starting Azure recognition");

        let url = format!(
            "https://{region}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1"
        );

        let response = self
            .client
            .post(&url)
            .query(&[("language", self.language.as_str()), ("format", "simple")])
            .header("Ocp-Apim-Subscription-Key", self.api_key.expose_secret())
            .header("Content-Type", "audio/wav; codecs=audio/pcm; samplerate=16000")
            .header("Accept", "application/json")
            .body(wav.to_vec())
            .send()
            .await
            .map_err(|e| Error::Recognition(format!("Azure request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Recognition(format!(
                "Azure Speech error {status}: {body}"
            )));
        }

        let result: AzureRecognition = response
            .json()
            .await
            .map_err(|e| Error::Recognition(format!("unreadable Azure response: {e}")))?;

        interpret_azure(result)
    }

    /// Transcribe using OpenAI Whisper
    async fn transcribe_whisper(&self, model: &str, wav: &[u8]) -> Result<Option<String>> {
        tracing::debug!(audio_bytes = wav.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Recognition(e.to_string()))?,
            )
            .text("model", model.to_string())
            .text("language", whisper_language(&self.language).to_string());

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Recognition(format!("Whisper request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Recognition(format!(
                "Whisper API error {status}: {body}"
            )));
        }

        let result: WhisperResponse = response
            .json()
            .await
            .map_err(|e| Error::Recognition(format!("unreadable Whisper response: {e}")))?;

        let text = result.text.trim();
        tracing::info!(transcript = %text, "transcription complete");
        Ok((!text.is_empty()).then(|| text.to_string()))
    }
}

/// Map an Azure recognition status onto recognized / no-match / canceled
fn interpret_azure(result: AzureRecognition) -> Result<Option<String>> {
    match result.recognition_status.as_str() {
        "Success" => {
            let text = result.display_text.unwrap_or_default();
            let text = text.trim();
            tracing::info!(transcript = %text, "recognition complete");
            Ok((!text.is_empty()).then(|| text.to_string()))
        }
        "NoMatch" | "InitialSilenceTimeout" | "BabbleTimeout" => {
            tracing::debug!(status = %result.recognition_status, "no speech recognized");
            Ok(None)
        }
        other => Err(Error::Recognition(format!("recognition canceled: {other}"))),
    }
}

/// Whisper takes an ISO-639-1 code, so `en-US` becomes `en`
fn whisper_language(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn azure(status: &str, text: Option<&str>) -> AzureRecognition {
        AzureRecognition {
            recognition_status: status.to_string(),
            display_text: text.map(str::to_string),
        }
    }

    #[test]
    fn azure_success_returns_text() {
        let result = interpret_azure(azure("Success", Some("I want to track books I've read.")));
        assert_eq!(
            result.unwrap().as_deref(),
            Some("I want to track books I've read.")
        );
    }

    #[test]
    fn azure_success_with_blank_text_is_no_match() {
        assert!(interpret_azure(azure("Success", Some("  "))).unwrap().is_none());
        assert!(interpret_azure(azure("Success", None)).unwrap().is_none());
    }

    #[test]
    fn azure_no_match_statuses() {
        for status in ["NoMatch", "InitialSilenceTimeout", "BabbleTimeout"] {
            assert!(interpret_azure(azure(status, None)).unwrap().is_none(), "{status}");
        }
    }

    #[test]
    fn azure_error_is_cancellation() {
        let err = interpret_azure(azure("Error", None)).unwrap_err();
        assert!(matches!(err, Error::Recognition(ref m) if m.contains("Error")));
    }

    #[test]
    fn parses_azure_json() {
        let json = r#"{"RecognitionStatus":"Success","DisplayText":"Exit now.","Offset":100,"Duration":900}"#;
        let result: AzureRecognition = serde_json::from_str(json).unwrap();
        assert_eq!(result.recognition_status, "Success");
        assert_eq!(result.display_text.as_deref(), Some("Exit now."));
    }

    #[test]
    fn whisper_language_uses_primary_subtag() {
        assert_eq!(whisper_language("en-US"), "en");
        assert_eq!(whisper_language("de_DE"), "de");
        assert_eq!(whisper_language("fr"), "fr");
    }

    #[test]
    fn rejects_missing_credentials() {
        assert!(SpeechToText::new_azure(String::new(), "westus".into(), "en-US".into()).is_err());
        assert!(SpeechToText::new_azure("key".into(), String::new(), "en-US".into()).is_err());
        assert!(SpeechToText::new_whisper(String::new(), "whisper-1".into(), "en-US".into()).is_err());
    }
}
