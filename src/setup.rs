//! Interactive first-run setup wizard (`vibespec setup`)

use std::path::PathBuf;

use dialoguer::{Confirm, Input, Select};

use crate::config::file::{
    self, LlmFileConfig, SpeechFileConfig, VibeSpecConfigFile,
};

const PROVIDERS: [&str; 2] = ["Azure", "OpenAI"];

/// Run the interactive setup wizard
///
/// # Errors
///
/// Returns error if user input fails or config cannot be written
pub fn run_setup() -> anyhow::Result<()> {
    println!("VibeSpec Setup\n");

    let existing = file::load_config_file();
    let config_path =
        file::config_file_path().unwrap_or_else(|| PathBuf::from("~/.config/vibespec/config.toml"));

    if config_path.exists() {
        println!("Existing config found at {}\n", config_path.display());
    }

    let mut api_keys = existing.api_keys;

    // 1. Completion provider
    let llm_provider = select_provider("Select a chat completion provider", existing.llm.provider.as_deref())?;

    let llm = if llm_provider == "azure" {
        let endpoint: String = Input::new()
            .with_prompt("Azure OpenAI endpoint (AZURE_OPENAI_API_ENDPOINT)")
            .default(existing.llm.endpoint.clone().unwrap_or_default())
            .interact_text()?;
        api_keys.azure_openai = ask_key("Azure OpenAI", "AZURE_OPENAI_API_KEY", api_keys.azure_openai)?;

        let api_version: String = Input::new()
            .with_prompt("API version")
            .default(
                existing
                    .llm
                    .api_version
                    .clone()
                    .unwrap_or_else(|| "2024-06-01".to_string()),
            )
            .interact_text()?;

        LlmFileConfig {
            endpoint: Some(endpoint).filter(|e| !e.is_empty()),
            api_version: Some(api_version),
            ..LlmFileConfig::default()
        }
    } else {
        api_keys.openai = ask_key("OpenAI", "OPENAI_API_KEY", api_keys.openai)?;
        LlmFileConfig {
            base_url: existing.llm.base_url.clone(),
            ..LlmFileConfig::default()
        }
    };

    let model: String = Input::new()
        .with_prompt(if llm_provider == "azure" {
            "Deployment name"
        } else {
            "Model"
        })
        .default(existing.llm.model.clone().unwrap_or_else(|| "gpt-4o".to_string()))
        .interact_text()?;

    let llm = LlmFileConfig {
        provider: Some(llm_provider),
        model: Some(model),
        ..llm
    };

    // 2. Speech (optional)
    let enable_voice = Confirm::new()
        .with_prompt("Speak replies out loud?")
        .default(existing.speech.enabled.unwrap_or(true))
        .interact()?;

    let speech = if enable_voice {
        let speech_provider =
            select_provider("Select a speech provider", existing.speech.provider.as_deref())?;

        if speech_provider == "azure" {
            let region: String = Input::new()
                .with_prompt("Azure Speech region (AZURE_SPEECH_REGION)")
                .default(existing.speech.region.clone().unwrap_or_else(|| "eastus".to_string()))
                .interact_text()?;
            api_keys.azure_speech = ask_key("Azure Speech", "AZURE_SPEECH_KEY", api_keys.azure_speech)?;

            SpeechFileConfig {
                enabled: Some(true),
                provider: Some(speech_provider),
                region: Some(region),
                voice: existing.speech.voice,
                ..SpeechFileConfig::default()
            }
        } else {
            if api_keys.openai.is_none() {
                api_keys.openai = ask_key("OpenAI", "OPENAI_API_KEY", None)?;
            }

            SpeechFileConfig {
                enabled: Some(true),
                provider: Some(speech_provider),
                voice: existing.speech.voice,
                tts_model: existing.speech.tts_model.or_else(|| Some("tts-1".to_string())),
                stt_model: existing.speech.stt_model.or_else(|| Some("whisper-1".to_string())),
                ..SpeechFileConfig::default()
            }
        }
    } else {
        SpeechFileConfig {
            enabled: Some(false),
            ..SpeechFileConfig::default()
        }
    };

    // 3. Build and write config
    let config_file = VibeSpecConfigFile {
        llm,
        speech,
        session: existing.session,
        api_keys,
    };

    file::write_config_file(&config_path, &config_file)?;
    println!("\nConfig written to {}", config_path.display());
    println!("\nSetup complete! Run `vibespec` to start, or `vibespec --input speech` to talk.");

    Ok(())
}

fn select_provider(prompt: &str, current: Option<&str>) -> anyhow::Result<String> {
    let default = current
        .and_then(|p| PROVIDERS.iter().position(|l| l.eq_ignore_ascii_case(p)))
        .unwrap_or(0);

    let idx = Select::new()
        .with_prompt(prompt)
        .items(&PROVIDERS)
        .default(default)
        .interact()?;

    Ok(PROVIDERS[idx].to_lowercase())
}

/// Prompt for a key, keeping the current one when left blank
fn ask_key(service: &str, env_hint: &str, current: Option<String>) -> anyhow::Result<Option<String>> {
    let prompt = match current.as_deref().map(mask_key) {
        Some(masked) => format!("{service} API key (current: {masked}, leave blank to keep)"),
        None => format!("{service} API key ({env_hint})"),
    };

    let input: String = Input::new()
        .with_prompt(&prompt)
        .allow_empty(true)
        .interact_text()?;

    Ok(if input.is_empty() { current } else { Some(input) })
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "****".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_long_keys() {
        assert_eq!(mask_key("sk-1234567890abcd"), "sk-1...abcd");
    }

    #[test]
    fn hides_short_keys() {
        assert_eq!(mask_key("abc"), "****");
        assert_eq!(mask_key("12345678"), "****");
    }
}
