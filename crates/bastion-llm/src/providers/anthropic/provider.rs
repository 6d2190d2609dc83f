use super::convert::{convert_messages, convert_response, convert_tool};
use super::types::{AnthropicConfig, AnthropicError, AnthropicRequest, AnthropicResponse, API_VERSION};
use crate::completion::{CompletionRequest, CompletionResponse};
use crate::error::{Error, Result};
use crate::providers::{sanitize_api_error, LlmProvider};
use reqwest::Client;
use tracing::{debug, instrument};

/// Anthropic provider
pub struct AnthropicProvider {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub(crate) fn build_request(&self, request: &CompletionRequest) -> AnthropicRequest {
        let model = if request.model.is_empty() {
            self.config.default_model.clone()
        } else {
            request.model.clone()
        };
        let (system, messages) = convert_messages(&request.messages);

        AnthropicRequest {
            model,
            max_tokens: request.max_tokens.unwrap_or(self.config.default_max_tokens),
            system,
            messages,
            temperature: request.temperature,
            tools: request
                .has_tools()
                .then(|| request.tools.iter().map(convert_tool).collect()),
        }
    }

    async fn send_request(&self, request: AnthropicRequest) -> Result<AnthropicResponse> {
        let url = format!("{}/v1/messages", self.config.base_url);

        debug!(url = %url, "Sending request to Anthropic");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(self.config.timeout.as_millis() as u64)
                } else {
                    Error::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !status.is_success() {
            if status.as_u16() == 429 {
                return Err(Error::RateLimit);
            }
            let detail = match serde_json::from_str::<AnthropicError>(&body) {
                Ok(error) => format!("{}: {}", error.error.r#type, error.error.message),
                // SECURITY: Don't expose raw HTTP response body
                Err(_) => format!("HTTP {status}"),
            };
            return Err(Error::Api(sanitize_api_error(&self.config.name, &detail)));
        }

        serde_json::from_str(&body).map_err(|e| Error::InvalidResponse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn available_models(&self) -> Vec<String> {
        vec![self.config.default_model.clone()]
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    #[instrument(skip(self, request), fields(provider = %self.config.name, model = %request.model, tools = request.tools.len()))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let anthropic_request = self.build_request(&request);
        let response = self.send_request(anthropic_request).await?;
        Ok(convert_response(response))
    }
}
