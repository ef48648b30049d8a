use serde::Deserialize;
use serde_json::json;

use crate::config::{AiConfig, Provider};
use crate::errors::BackendError;
use crate::text::truncate_chars;

/// Everything a backend needs for one completion.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    /// Source material, only consulted by the offline mock.
    pub title: String,
    pub text: String,
}

/// Prompt in, text out.
pub trait CompletionBackend {
    fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError>;

    fn name(&self) -> &'static str;
}

/// Picks the backend once at startup.
pub fn from_config(config: &AiConfig) -> anyhow::Result<Box<dyn CompletionBackend>> {
    let api_key = config.api_key();

    let backend: Box<dyn CompletionBackend> = match (config.provider, api_key) {
        (Provider::Mock, _) => Box::new(MockBackend),
        (Provider::Local, _) => Box::new(OpenAiBackend::local(config)?),
        (Provider::Openai, Some(key)) => Box::new(OpenAiBackend::hosted(config, key)?),
        (Provider::Anthropic, Some(key)) => Box::new(AnthropicBackend::new(config, key)?),
        (provider, None) => {
            log::warn!("{provider:?} API key not configured - using mock responses");
            Box::new(MockBackend)
        }
    };

    log::info!("using {} backend with model {}", backend.name(), config.model);
    Ok(backend)
}

fn build_client(config: &AiConfig) -> reqwest::Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(config.request_timeout())
        .build()
}

fn check_status(resp: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body: truncate_chars(&body, 300),
    })
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI chat-completions API, hosted or at a compatible local endpoint.
pub struct OpenAiBackend {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    name: &'static str,
}

impl OpenAiBackend {
    fn with(
        config: &AiConfig,
        base_url: &str,
        api_key: Option<String>,
        name: &'static str,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            name,
        })
    }

    pub fn hosted(config: &AiConfig, api_key: String) -> anyhow::Result<Self> {
        Self::with(config, &config.openai.base_url, Some(api_key), "openai")
    }

    /// Local servers don't need a key.
    pub fn local(config: &AiConfig) -> anyhow::Result<Self> {
        Self::with(config, &config.local.base_url, None, "local")
    }
}

impl CompletionBackend for OpenAiBackend {
    fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.prompt},
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let mut req = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let completion: ChatCompletion = check_status(req.send()?)?.json()?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| BackendError::Payload("no choices in completion".to_string()))
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicMessage {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic messages API.
pub struct AnthropicBackend {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl AnthropicBackend {
    pub fn new(config: &AiConfig, api_key: String) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            endpoint: format!(
                "{}/v1/messages",
                config.anthropic.base_url.trim_end_matches('/')
            ),
            api_key,
            api_version: config.anthropic.api_version.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

impl CompletionBackend for AnthropicBackend {
    fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "system": request.system,
            "messages": [{"role": "user", "content": request.prompt}],
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(&body)
            .send()?;

        let message: AnthropicMessage = check_status(resp)?.json()?;

        message
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| BackendError::Payload("no text block in message".to_string()))
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}

const MOCK_DESCRIPTION_CHARS: usize = 200;
const MOCK_MAX_TAGS: usize = 3;

/// Offline stand-in: summarizes from the source text without any network.
pub struct MockBackend;

impl MockBackend {
    pub fn description(text: &str) -> String {
        let sentences = text
            .split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .take(3)
            .collect::<Vec<_>>();
        truncate_chars(&sentences.join(". "), MOCK_DESCRIPTION_CHARS)
    }

    pub fn tags(title: &str) -> Vec<String> {
        title
            .to_lowercase()
            .split_whitespace()
            .filter(|word| word.chars().count() > 3)
            .take(MOCK_MAX_TAGS)
            .map(str::to_string)
            .collect()
    }
}

impl CompletionBackend for MockBackend {
    fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        let response = json!({
            "description": Self::description(&request.text),
            "tags": Self::tags(&request.title),
            "author": "",
        });

        serde_json::to_string_pretty(&response).map_err(|e| BackendError::Payload(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
