//! OpenAI assistants v2 provider

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use super::AssistantsProvider;
use super::retry::{RetryConfig, with_retry_when};
use super::types::*;
use crate::error::{AssistantsError, ProviderError, ProviderErrorKind, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for the OpenAI assistants API
pub struct OpenAIProvider {
    client: reqwest::Client,
    name: String,
    api_key: String,
    base_url: String,
    organization: Option<String>,
    timeout: Duration,
    retry: RetryConfig,
}

impl OpenAIProvider {
    /// Create a provider against the public OpenAI endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            name: "openai".to_string(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            organization: None,
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }

    /// Create from environment variables.
    ///
    /// Reads `OPENAI_API_KEY` (required), `OPENAI_BASE_URL` and
    /// `OPENAI_ORGANIZATION`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            AssistantsError::Configuration("OPENAI_API_KEY environment variable not set".to_string())
        })?;

        let mut provider = Self::new(api_key);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            provider = provider.with_base_url(base_url);
        }
        if let Ok(organization) = std::env::var("OPENAI_ORGANIZATION") {
            provider = provider.with_organization(organization);
        }
        Ok(provider)
    }

    /// Use a custom base URL (Azure OpenAI or a compatible gateway).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Register under a name other than `openai`.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(Method::GET, path, None).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T> {
        self.send(Method::POST, path, Some(body)).await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(Method::DELETE, path, None).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T> {
        with_retry_when(
            &self.retry,
            |e| replay_safe(&method, e),
            || self.send_once(method.clone(), path, body.as_ref()),
        )
        .await
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(provider = %self.name, %method, %url, "Sending request");

        let mut request = self
            .client
            .request(method, &url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("OpenAI-Beta", "assistants=v2")
            .timeout(self.timeout);

        if let Some(organization) = &self.organization {
            request = request.header("OpenAI-Organization", organization);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers());
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            let message = match serde_json::from_str::<OpenAIError>(&text) {
                Ok(error) => format!(
                    "OpenAI API error ({}): {}",
                    error.error.error_type.unwrap_or_else(|| status.to_string()),
                    error.error.message
                ),
                Err(_) => format!("OpenAI API error ({}): {}", status, text),
            };

            let mut error = ProviderError::new(
                &self.name,
                ProviderErrorKind::from_status(status.as_u16()),
                message,
            )
            .with_status(status.as_u16());
            if let Some(delay) = retry_after {
                error = error.with_retry_after(delay);
            }
            return Err(error.into());
        }

        response.json::<T>().await.map_err(|e| {
            ProviderError::new(
                &self.name,
                ProviderErrorKind::Decode,
                format!("Failed to parse OpenAI response: {}", e),
            )
            .into()
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> AssistantsError {
        if e.is_timeout() {
            AssistantsError::ProviderTimeout {
                provider: self.name.clone(),
                elapsed: self.timeout,
            }
        } else {
            ProviderError::new(
                &self.name,
                ProviderErrorKind::Network,
                format!("Failed to send request to OpenAI: {}", e),
            )
            .into()
        }
    }
}

/// Read `retry-after-ms` or `retry-after` (seconds) from a response.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    if let Some(ms) = headers
        .get("retry-after-ms")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
    {
        return Some(Duration::from_millis(ms));
    }

    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

/// Whether `error` may be retried for a request sent with `method`
///
/// A failed POST may already have created or changed something upstream, so
/// it is only replayed after a 429, which the backend rejects unprocessed.
fn replay_safe(method: &Method, error: &AssistantsError) -> bool {
    if *method == Method::GET || *method == Method::DELETE {
        return error.is_retryable();
    }
    matches!(
        error.root_cause(),
        AssistantsError::Provider(e) if e.kind == ProviderErrorKind::RateLimited
    )
}

fn seg(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

#[derive(Deserialize)]
struct OpenAIError {
    error: OpenAIErrorDetail,
}

#[derive(Deserialize)]
struct OpenAIErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

#[async_trait]
impl AssistantsProvider for OpenAIProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            name: self.name.clone(),
            version: "v2".to_string(),
            supports_streaming: true,
            supports_file_search: true,
            supports_code_interpreter: true,
            max_page_size: ListParams::MAX_LIMIT,
            models: vec![
                "gpt-4o".to_string(),
                "gpt-4o-mini".to_string(),
                "gpt-4-turbo".to_string(),
            ],
        }
    }

    async fn validate_connection(&self) -> Result<()> {
        let _: ListResponse<Value> = self.get("/assistants?limit=1").await?;
        Ok(())
    }

    async fn create_assistant(&self, request: CreateAssistantRequest) -> Result<Assistant> {
        self.post("/assistants", serde_json::to_value(request)?).await
    }

    async fn list_assistants(&self, params: ListParams) -> Result<ListResponse<Assistant>> {
        self.get(&format!("/assistants{}", params.to_query())).await
    }

    async fn get_assistant(&self, assistant_id: &str) -> Result<Assistant> {
        self.get(&format!("/assistants/{}", seg(assistant_id))).await
    }

    async fn update_assistant(
        &self,
        assistant_id: &str,
        request: UpdateAssistantRequest,
    ) -> Result<Assistant> {
        self.post(
            &format!("/assistants/{}", seg(assistant_id)),
            serde_json::to_value(request)?,
        )
        .await
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<DeletionStatus> {
        self.delete(&format!("/assistants/{}", seg(assistant_id))).await
    }

    async fn create_thread(&self, request: CreateThreadRequest) -> Result<Thread> {
        self.post("/threads", serde_json::to_value(request)?).await
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Thread> {
        self.get(&format!("/threads/{}", seg(thread_id))).await
    }

    async fn update_thread(&self, thread_id: &str, request: UpdateThreadRequest) -> Result<Thread> {
        self.post(
            &format!("/threads/{}", seg(thread_id)),
            serde_json::to_value(request)?,
        )
        .await
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<DeletionStatus> {
        self.delete(&format!("/threads/{}", seg(thread_id))).await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        request: CreateMessageRequest,
    ) -> Result<Message> {
        self.post(
            &format!("/threads/{}/messages", seg(thread_id)),
            serde_json::to_value(request)?,
        )
        .await
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        params: ListParams,
    ) -> Result<ListResponse<Message>> {
        self.get(&format!(
            "/threads/{}/messages{}",
            seg(thread_id),
            params.to_query()
        ))
        .await
    }

    async fn get_message(&self, thread_id: &str, message_id: &str) -> Result<Message> {
        self.get(&format!(
            "/threads/{}/messages/{}",
            seg(thread_id),
            seg(message_id)
        ))
        .await
    }

    async fn update_message(
        &self,
        thread_id: &str,
        message_id: &str,
        request: UpdateMessageRequest,
    ) -> Result<Message> {
        self.post(
            &format!("/threads/{}/messages/{}", seg(thread_id), seg(message_id)),
            serde_json::to_value(request)?,
        )
        .await
    }

    async fn delete_message(&self, thread_id: &str, message_id: &str) -> Result<DeletionStatus> {
        self.delete(&format!(
            "/threads/{}/messages/{}",
            seg(thread_id),
            seg(message_id)
        ))
        .await
    }

    async fn create_run(&self, thread_id: &str, request: CreateRunRequest) -> Result<Run> {
        self.post(
            &format!("/threads/{}/runs", seg(thread_id)),
            serde_json::to_value(request)?,
        )
        .await
    }

    async fn list_runs(&self, thread_id: &str, params: ListParams) -> Result<ListResponse<Run>> {
        self.get(&format!("/threads/{}/runs{}", seg(thread_id), params.to_query()))
            .await
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        self.get(&format!("/threads/{}/runs/{}", seg(thread_id), seg(run_id)))
            .await
    }

    async fn update_run(
        &self,
        thread_id: &str,
        run_id: &str,
        request: UpdateRunRequest,
    ) -> Result<Run> {
        self.post(
            &format!("/threads/{}/runs/{}", seg(thread_id), seg(run_id)),
            serde_json::to_value(request)?,
        )
        .await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        self.post(
            &format!("/threads/{}/runs/{}/cancel", seg(thread_id), seg(run_id)),
            Value::Object(Default::default()),
        )
        .await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        request: SubmitToolOutputsRequest,
    ) -> Result<Run> {
        self.post(
            &format!(
                "/threads/{}/runs/{}/submit_tool_outputs",
                seg(thread_id),
                seg(run_id)
            ),
            serde_json::to_value(request)?,
        )
        .await
    }

    async fn list_run_steps(
        &self,
        thread_id: &str,
        run_id: &str,
        params: ListParams,
    ) -> Result<ListResponse<RunStep>> {
        self.get(&format!(
            "/threads/{}/runs/{}/steps{}",
            seg(thread_id),
            seg(run_id),
            params.to_query()
        ))
        .await
    }

    async fn get_run_step(
        &self,
        thread_id: &str,
        run_id: &str,
        step_id: &str,
    ) -> Result<RunStep> {
        self.get(&format!(
            "/threads/{}/runs/{}/steps/{}",
            seg(thread_id),
            seg(run_id),
            seg(step_id)
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_provider_builders() {
        let provider = OpenAIProvider::new("sk-test")
            .with_base_url("https://gateway.example.com/v1/")
            .with_organization("org-1")
            .with_timeout(Duration::from_secs(5))
            .named("primary");

        assert_eq!(provider.name(), "primary");
        assert_eq!(provider.base_url, "https://gateway.example.com/v1");
        assert_eq!(provider.organization.as_deref(), Some("org-1"));
        assert_eq!(provider.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert("retry-after", HeaderValue::from_static("2"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(2)));

        headers.insert("retry-after-ms", HeaderValue::from_static("250"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_path_segments_are_encoded() {
        assert_eq!(seg("asst_abc"), "asst_abc");
        assert_eq!(seg("../x"), "..%2Fx");
    }

    #[test]
    fn test_replay_safe_by_method() {
        let server: AssistantsError =
            ProviderError::new("openai", ProviderErrorKind::Server, "bad gateway").into();
        let limited: AssistantsError =
            ProviderError::new("openai", ProviderErrorKind::RateLimited, "slow down").into();
        let timeout = AssistantsError::ProviderTimeout {
            provider: "openai".to_string(),
            elapsed: Duration::from_secs(30),
        };

        assert!(replay_safe(&Method::GET, &server));
        assert!(replay_safe(&Method::DELETE, &timeout));
        assert!(!replay_safe(&Method::POST, &server));
        assert!(!replay_safe(&Method::POST, &timeout));
        assert!(replay_safe(&Method::POST, &limited));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_post_is_not_replayed() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let config = RetryConfig::default().with_jitter(false);
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let flaky = move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ProviderError::new("openai", ProviderErrorKind::Server, "upstream reset").into())
            } else {
                Ok("msg_1")
            }
        };

        let post = with_retry_when(&config, |e| replay_safe(&Method::POST, e), flaky).await;
        assert!(post.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        calls.store(0, Ordering::SeqCst);
        let get = with_retry_when(&config, |e| replay_safe(&Method::GET, e), flaky).await;
        assert_eq!(get.unwrap(), "msg_1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        let provider = OpenAIProvider::new("sk-test")
            .with_base_url("http://127.0.0.1:9")
            .with_retry(RetryConfig::no_retry());

        let err = provider.get_assistant("asst_1").await.unwrap_err();
        match err {
            AssistantsError::Provider(e) => {
                assert_eq!(e.kind, ProviderErrorKind::Network);
                assert_eq!(e.provider, "openai");
            }
            AssistantsError::ProviderTimeout { .. } => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
