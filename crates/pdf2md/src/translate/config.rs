use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.1";
pub const DEFAULT_LANGUAGE: &str = "English";
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Settings of the translation service.
///
/// Built from the environment, then overridden by command-line flags.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatorConfig {
    pub ollama_url: String,
    pub model: String,
    pub language: String,
    pub prompt_dir: Option<PathBuf>,
    /// Requests in flight at once.
    pub concurrency: usize,
    /// Extra attempts for retryable failures.
    pub retries: usize,
    /// Delay before the first retry, doubled on each further one.
    pub retry_delay: Duration,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        TranslatorConfig {
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            prompt_dir: None,
            concurrency: DEFAULT_CONCURRENCY,
            retries: 1,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Command-line values that win over the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub ollama_url: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
    pub prompt_dir: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub retries: Option<usize>,
}

impl TranslatorConfig {
    /// Read `OLLAMA_URL`, `PDF2MD_MODEL`, `PDF2MD_TARGET_LANGUAGE`,
    /// `PDF2MD_PROMPT_DIR` and `PDF2MD_CONCURRENCY`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = TranslatorConfig::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        TranslatorConfig {
            ollama_url: non_empty("OLLAMA_URL").unwrap_or(defaults.ollama_url),
            model: non_empty("PDF2MD_MODEL").unwrap_or(defaults.model),
            language: non_empty("PDF2MD_TARGET_LANGUAGE").unwrap_or(defaults.language),
            prompt_dir: non_empty("PDF2MD_PROMPT_DIR").map(PathBuf::from),
            concurrency: non_empty("PDF2MD_CONCURRENCY")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.concurrency),
            ..defaults
        }
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(url) = overrides.ollama_url {
            self.ollama_url = url;
        }
        if let Some(model) = overrides.model {
            self.model = model;
        }
        if let Some(language) = overrides.language {
            self.language = language;
        }
        if overrides.prompt_dir.is_some() {
            self.prompt_dir = overrides.prompt_dir;
        }
        if let Some(concurrency) = overrides.concurrency {
            self.concurrency = concurrency;
        }
        if let Some(retries) = overrides.retries {
            self.retries = retries;
        }
        self.concurrency = self.concurrency.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        assert_eq!(TranslatorConfig::from_lookup(lookup(&[])), TranslatorConfig::default());
    }

    #[test]
    fn test_environment_values() {
        let config = TranslatorConfig::from_lookup(lookup(&[
            ("OLLAMA_URL", "http://gpu:11434"),
            ("PDF2MD_MODEL", "qwen2.5"),
            ("PDF2MD_TARGET_LANGUAGE", "Japanese"),
            ("PDF2MD_PROMPT_DIR", "/etc/prompts"),
            ("PDF2MD_CONCURRENCY", "not a number"),
        ]));

        assert_eq!(config.ollama_url, "http://gpu:11434");
        assert_eq!(config.model, "qwen2.5");
        assert_eq!(config.language, "Japanese");
        assert_eq!(config.prompt_dir, Some(PathBuf::from("/etc/prompts")));
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_overrides_win() {
        let config = TranslatorConfig::from_lookup(lookup(&[("PDF2MD_MODEL", "qwen2.5")]))
            .with_overrides(Overrides {
                model: Some("mistral".to_string()),
                concurrency: Some(0),
                ..Default::default()
            });

        assert_eq!(config.model, "mistral");
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.language, DEFAULT_LANGUAGE);
    }
}
