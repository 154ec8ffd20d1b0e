//! Built-in prompt text and startup messages

/// Default system prompt: TypeSpec drafting guide with a canonical example
pub const DEFAULT_SYSTEM_PROMPT: &str = include_str!("../prompts/system.md");

/// First thing the assistant says in every session
pub const GREETING: &str = "Hello! I'm VibeSpec, your helpful assistant for creating API \
definitions using TypeSpec. My goal is to take your ideas and turn them into clear, structured \
service definitions that are easy to understand and implement. If you have a concept in mind \
for a service or API, I can guide you through the process of defining it, making sure we cover \
all the important aspects like data models, error handling, and operations.";

/// Startup banner
pub const BANNER: &str = r"
____   ____._____.            _________
\   \ /   /|__\_ |__   ____  /   _____/_____   ____   ____
 \   Y   / |  || __ \_/ __ \ \_____  \\____ \_/ __ \_/ ___\
  \     /  |  || \_\ \  ___/ /        \  |_> >  ___/\  \___
   \___/   |__||___  /\___  >_______  /   __/ \___  >\___  >
                   \/     \/        \/|__|        \/     \/
";

/// Resolve the system prompt: file contents if a path is given, else the default
///
/// # Errors
///
/// Returns error if the file cannot be read or is empty
pub fn load_system_prompt(path: Option<&std::path::Path>) -> crate::Result<String> {
    let Some(path) = path else {
        return Ok(DEFAULT_SYSTEM_PROMPT.trim_end().to_string());
    };

    let prompt = std::fs::read_to_string(path).map_err(|e| {
        crate::Error::Config(format!("cannot read system prompt {}: {e}", path.display()))
    })?;

    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(crate::Error::Config(format!(
            "system prompt {} is empty",
            path.display()
        )));
    }

    tracing::info!(path = %path.display(), chars = prompt.len(), "loaded system prompt");
    Ok(prompt.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prompt_mentions_typespec() {
        let prompt = load_system_prompt(None).unwrap();
        assert!(prompt.contains("TypeSpec"));
        assert!(prompt.contains("```"));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = load_system_prompt(Some(std::path::Path::new("/nonexistent/prompt.md")))
            .unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn greeting_has_no_code_fence() {
        assert!(!GREETING.contains("```"));
    }
}
