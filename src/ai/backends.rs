use crate::error::AnalysisError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Boxed future returned by text generation backends
pub type GenerateFuture<'a> = Pin<Box<dyn Future<Output = Result<String, AnalysisError>> + Send + 'a>>;

/// Trait for text generation backends: a prompt goes in, free text comes out
pub trait TextGenerator: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &str;

    fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a>;
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const TEMPERATURE: f32 = 0.4;
const MAX_OUTPUT_TOKENS: u32 = 512;

fn http_client() -> Client {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Turn a non-success HTTP response into a backend error
async fn error_for_status(
    backend: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, AnalysisError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(AnalysisError::BackendError(format!(
        "{} API returned error {}: {}",
        backend, status, error_text
    )))
}

/// Google Gemini backend using the `generateContent` endpoint
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

impl GeminiBackend {
    /// Create a new Gemini backend
    ///
    /// # Example
    /// ```
    /// use vitals::ai::backends::GeminiBackend;
    ///
    /// let backend = GeminiBackend::new("key".to_string(), "gemini-1.5-flash".to_string());
    /// ```
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(
            api_key,
            model,
            "https://generativelanguage.googleapis.com/v1beta".to_string(),
        )
    }

    pub fn with_base_url(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            model,
            base_url,
        }
    }

    fn api_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn extract_text(response: GeminiResponse) -> Result<String, AnalysisError> {
        if let Some(error) = response.error {
            return Err(AnalysisError::BackendError(format!(
                "Gemini error: {}",
                error.message
            )));
        }

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .ok_or_else(|| AnalysisError::InvalidResponse("No candidates in Gemini response".to_string()))?
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect();

        Ok(text)
    }
}

impl TextGenerator for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(async move {
            let request = GeminiRequest {
                contents: vec![GeminiContent {
                    parts: vec![GeminiPart {
                        text: prompt.to_string(),
                    }],
                }],
                generation_config: GeminiGenerationConfig {
                    temperature: TEMPERATURE,
                    max_output_tokens: MAX_OUTPUT_TOKENS,
                },
            };

            let response = self
                .client
                .post(self.api_url())
                .header("x-goog-api-key", &self.api_key)
                .json(&request)
                .send()
                .await?;
            let response = error_for_status("Gemini", response).await?;

            let parsed: GeminiResponse = response.json().await.map_err(|e| {
                AnalysisError::InvalidResponse(format!("Failed to parse Gemini response: {}", e))
            })?;

            Self::extract_text(parsed)
        })
    }
}

/// OpenAI-compatible chat completions backend
pub struct OpenAIBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    error: Option<OpenAIError>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
}

impl OpenAIBackend {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(api_key, model, "https://api.openai.com/v1".to_string())
    }

    /// Create a backend for any OpenAI-compatible endpoint
    pub fn with_base_url(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            model,
            base_url,
        }
    }

    fn api_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl TextGenerator for OpenAIBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(async move {
            let request = OpenAIRequest {
                model: self.model.clone(),
                messages: vec![OpenAIMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                }],
                temperature: TEMPERATURE,
                max_tokens: MAX_OUTPUT_TOKENS,
            };

            let response = self
                .client
                .post(self.api_url())
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await?;
            let response = error_for_status("OpenAI", response).await?;

            let parsed: OpenAIResponse = response.json().await.map_err(|e| {
                AnalysisError::InvalidResponse(format!("Failed to parse OpenAI response: {}", e))
            })?;

            if let Some(error) = parsed.error {
                return Err(AnalysisError::BackendError(format!(
                    "OpenAI API error ({}): {}",
                    error.error_type.unwrap_or_else(|| "unknown".to_string()),
                    error.message
                )));
            }

            parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| {
                    AnalysisError::InvalidResponse("No choices in OpenAI response".to_string())
                })
        })
    }
}

/// Ollama backend for local inference
pub struct OllamaBackend {
    client: Client,
    endpoint: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    ///
    /// # Arguments
    /// * `endpoint` - Ollama server URL (e.g., "http://localhost:11434")
    /// * `model` - Model name to use (e.g., "llama3")
    pub fn new(endpoint: String, model: String) -> Self {
        Self {
            client: http_client(),
            endpoint,
            model,
        }
    }

    fn api_url(&self) -> String {
        format!("{}/api/generate", self.endpoint.trim_end_matches('/'))
    }
}

impl TextGenerator for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(async move {
            let request = OllamaRequest {
                model: self.model.clone(),
                prompt: prompt.to_string(),
                stream: false,
                options: OllamaOptions {
                    temperature: TEMPERATURE,
                    num_predict: MAX_OUTPUT_TOKENS,
                },
            };

            let response = self
                .client
                .post(self.api_url())
                .json(&request)
                .send()
                .await?;
            let response = error_for_status("Ollama", response).await?;

            let parsed: OllamaResponse = response.json().await.map_err(|e| {
                AnalysisError::InvalidResponse(format!("Failed to parse Ollama response: {}", e))
            })?;

            if let Some(error) = parsed.error {
                return Err(AnalysisError::BackendError(format!("Ollama error: {}", error)));
            }

            Ok(parsed.response)
        })
    }
}

/// Deterministic backend for tests and offline runs
///
/// Responses are returned in order and cycle after the last one. Every prompt
/// is recorded so tests can inspect what was sent.
#[derive(Clone)]
pub struct MockBackend {
    responses: Vec<Result<String, AnalysisError>>,
    current_index: Arc<Mutex<usize>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    pub fn with_responses(responses: Vec<Result<String, AnalysisError>>) -> Self {
        Self {
            responses,
            current_index: Arc::new(Mutex::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always answer with `text`
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::with_responses(vec![Ok(text.into())])
    }

    /// Always answer that no notification is needed
    pub fn silent() -> Self {
        Self::with_text("NO_NOTIFICATION")
    }

    /// Always fail with a backend error
    pub fn error(message: impl Into<String>) -> Self {
        Self::with_responses(vec![Err(AnalysisError::BackendError(message.into()))])
    }

    pub fn timeout() -> Self {
        Self::with_responses(vec![Err(AnalysisError::Timeout)])
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().ok().and_then(|p| p.last().cloned())
    }
}

impl TextGenerator for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(async move {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(prompt.to_string());
            }

            if self.responses.is_empty() {
                return Err(AnalysisError::BackendError(
                    "Mock backend has no responses".to_string(),
                ));
            }

            let response_index = match self.current_index.lock() {
                Ok(mut index) => {
                    let i = *index % self.responses.len();
                    *index += 1;
                    i
                }
                Err(_) => 0,
            };

            self.responses[response_index].clone()
        })
    }
}
