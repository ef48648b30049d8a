use std::{path::Path, time::Duration};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0";
/// Placeholder shipped in sample env files; treated as "no key".
const PLACEHOLDER_API_KEY: &str = "sk-test-key-placeholder";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Openai,
    Anthropic,
    Local,
    Mock,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openai_key_env(),
            base_url: default_openai_base_url(),
        }
    }
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnthropicConfig {
    #[serde(default = "default_anthropic_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
    #[serde(default = "default_anthropic_version")]
    pub api_version: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_anthropic_key_env(),
            base_url: default_anthropic_base_url(),
            api_version: default_anthropic_version(),
        }
    }
}

fn default_anthropic_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_anthropic_version() -> String {
    "2023-06-01".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default = "default_local_base_url")]
    pub base_url: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            base_url: default_local_base_url(),
        }
    }
}

fn default_local_base_url() -> String {
    "http://localhost:11434/v1".to_string()
}

/// Language-model backend selection and sampling parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_provider")]
    pub provider: Provider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_ai_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    #[serde(default)]
    pub local: LocalConfig,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_ai_timeout_secs(),
            openai: OpenAiConfig::default(),
            anthropic: AnthropicConfig::default(),
            local: LocalConfig::default(),
        }
    }
}

fn default_provider() -> Provider {
    Provider::Openai
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    500
}

fn default_ai_timeout_secs() -> u64 {
    60
}

impl AiConfig {
    /// Reads the credential for the selected provider from the environment.
    /// `None` for providers that need none, or when the variable is unset/placeholder.
    pub fn api_key(&self) -> Option<String> {
        let var = match self.provider {
            Provider::Openai => &self.openai.api_key_env,
            Provider::Anthropic => &self.anthropic.api_key_env,
            Provider::Local | Provider::Mock => return None,
        };

        std::env::var(var)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty() && key != PLACEHOLDER_API_KEY)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Seconds to wait before every extraction
    #[serde(default = "default_request_delay")]
    pub request_delay: f64,
    /// Seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u8,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_delay: default_request_delay(),
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_request_delay() -> f64 {
    1.0
}

fn default_request_timeout() -> u64 {
    10
}

const MAX_RETRIES_LIMIT: u8 = 10;

fn default_max_retries() -> u8 {
    3
}

impl ScrapeConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_secs_f64(self.request_delay.max(0.0))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Free text inserted into the prompt, e.g. "2-3 sentences"
    #[serde(default = "default_description_length")]
    pub description_length: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_true")]
    pub extract_people: bool,
    #[serde(default = "default_true")]
    pub extract_author: bool,
    #[serde(default = "default_true")]
    pub extract_publisher: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            description_length: default_description_length(),
            batch_size: default_batch_size(),
            extract_people: true,
            extract_author: true,
            extract_publisher: true,
        }
    }
}

fn default_description_length() -> String {
    "2-3 sentences".to_string()
}

fn default_batch_size() -> usize {
    10
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Csv,
    Tsv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quoting {
    All,
    Minimal,
    NonNumeric,
    None,
}

/// Delimiter and quoting discipline of one output format
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DialectConfig {
    pub delimiter: char,
    pub quoting: Quoting,
    #[serde(default = "default_quotechar")]
    pub quotechar: char,
    #[serde(default = "default_escape_char")]
    pub escape_char: char,
}

fn default_quotechar() -> char {
    '"'
}

fn default_escape_char() -> char {
    '\\'
}

impl DialectConfig {
    pub fn csv() -> Self {
        Self {
            delimiter: ',',
            quoting: Quoting::Minimal,
            quotechar: default_quotechar(),
            escape_char: default_escape_char(),
        }
    }

    pub fn tsv() -> Self {
        Self {
            delimiter: '\t',
            quoting: Quoting::None,
            quotechar: default_quotechar(),
            escape_char: default_escape_char(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_format")]
    pub format: OutputFormat,
    #[serde(default)]
    pub resume_processing: bool,
    #[serde(default = "DialectConfig::csv")]
    pub csv: DialectConfig,
    #[serde(default = "DialectConfig::tsv")]
    pub tsv: DialectConfig,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_output_format(),
            resume_processing: false,
            csv: DialectConfig::csv(),
            tsv: DialectConfig::tsv(),
        }
    }
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Csv
}

impl OutputConfig {
    pub fn dialect(&self, format: OutputFormat) -> &DialectConfig {
        match format {
            OutputFormat::Csv => &self.csv,
            OutputFormat::Tsv => &self.tsv,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub scraping: ScrapeConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        if self.processing.batch_size == 0 {
            bail!("processing.batch_size must be greater than 0");
        }

        if self.scraping.max_retries > MAX_RETRIES_LIMIT {
            bail!(
                "scraping.max_retries must be at most {MAX_RETRIES_LIMIT}, got {}",
                self.scraping.max_retries
            );
        }

        if !(0.0..=2.0).contains(&self.ai.temperature) {
            bail!(
                "ai.temperature must be between 0.0 and 2.0, got {}",
                self.ai.temperature
            );
        }

        if self.ai.max_tokens == 0 {
            bail!("ai.max_tokens must be greater than 0");
        }

        if self.ai.request_timeout_secs == 0 {
            bail!("ai.request_timeout_secs must be greater than 0");
        }

        if !self.scraping.request_delay.is_finite() || self.scraping.request_delay < 0.0 {
            bail!(
                "scraping.request_delay must be a non-negative number, got {}",
                self.scraping.request_delay
            );
        }

        for (name, dialect) in [("csv", &self.output.csv), ("tsv", &self.output.tsv)] {
            for (field, ch) in [
                ("delimiter", dialect.delimiter),
                ("quotechar", dialect.quotechar),
                ("escape_char", dialect.escape_char),
            ] {
                if !ch.is_ascii() {
                    bail!("output.{name}.{field} must be a single ASCII character, got {ch:?}");
                }
            }
        }

        Ok(())
    }

    /// Loads the YAML config at `path`, writing the defaults there first if
    /// the file does not exist yet.
    pub fn load_with(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            log::info!("Creating default config at {}", path.display());
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, serde_yml::to_string(&Self::default())?)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }

        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = serde_yml::from_str(&config_str)
            .with_context(|| format!("config {} is malformed", path.display()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_is_created_with_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");

        let config = Config::load_with(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config.processing.batch_size, 10);
        assert_eq!(config.ai.provider, Provider::Openai);
        assert_eq!(config.output.tsv.delimiter, '\t');
    }

    #[test]
    fn partial_config_fills_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(
            &path,
            "ai:\n  provider: local\n  model: llama3\nprocessing:\n  batch_size: 3\n",
        )
        .unwrap();

        let config = Config::load_with(&path).unwrap();

        assert_eq!(config.ai.provider, Provider::Local);
        assert_eq!(config.ai.model, "llama3");
        assert_eq!(config.ai.local.base_url, "http://localhost:11434/v1");
        assert_eq!(config.processing.batch_size, 3);
        assert!(config.processing.extract_people);
        assert_eq!(config.output.csv.quoting, Quoting::Minimal);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, "processing:\n  batch_size: 0\n").unwrap();

        assert!(Config::load_with(&path).is_err());
    }

    #[test]
    fn excessive_retries_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");

        std::fs::write(&path, "scraping:\n  max_retries: 255\n").unwrap();
        assert!(Config::load_with(&path).is_err());

        std::fs::write(&path, "scraping:\n  max_retries: 10\n").unwrap();
        assert_eq!(Config::load_with(&path).unwrap().scraping.max_retries, 10);
    }

    #[test]
    fn local_and_mock_need_no_key() {
        let mut ai = AiConfig::default();
        ai.provider = Provider::Local;
        assert!(ai.api_key().is_none());
        ai.provider = Provider::Mock;
        assert!(ai.api_key().is_none());
    }

    #[test]
    fn placeholder_key_counts_as_missing() {
        let mut ai = AiConfig::default();
        ai.openai.api_key_env = "BOOKMARK_ENRICHER_TEST_PLACEHOLDER_KEY".to_string();
        std::env::set_var("BOOKMARK_ENRICHER_TEST_PLACEHOLDER_KEY", PLACEHOLDER_API_KEY);
        assert!(ai.api_key().is_none());
        std::env::remove_var("BOOKMARK_ENRICHER_TEST_PLACEHOLDER_KEY");
    }
}
