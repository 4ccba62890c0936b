//! The gateway: one request primitive shared by every endpoint

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use teamtask_core::{retry_when, Credential, ErrorContext, RetryConfig, TeamtaskError, TeamtaskResult};
use tracing::{debug, info};

use crate::config::ApiClientConfig;
use crate::credential::CredentialCell;
use crate::response::{normalize, transport_error};
use crate::RequestResult;

/// Issues requests against the backend and normalizes every outcome.
///
/// Cloning is cheap; clones share the HTTP connection pool and the credential cell.
#[derive(Clone)]
pub struct ApiGateway {
    client: reqwest::Client,
    config: Arc<ApiClientConfig>,
    credential: CredentialCell,
}

impl ApiGateway {
    /// Create a gateway with its own, initially empty, credential cell
    pub fn new(config: ApiClientConfig) -> TeamtaskResult<Self> {
        Self::with_credential_cell(config, CredentialCell::new())
    }

    /// Create a gateway that reads the credential from a shared cell
    pub fn with_credential_cell(
        config: ApiClientConfig,
        credential: CredentialCell,
    ) -> TeamtaskResult<Self> {
        let client = create_http_client(&config)?;

        info!("Created API gateway for {}", config.base_url);

        Ok(Self {
            client,
            config: Arc::new(config),
            credential,
        })
    }

    pub fn config(&self) -> &ApiClientConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn credential(&self) -> &CredentialCell {
        &self.credential
    }

    /// Issue a request carrying the current credential.
    ///
    /// The credential is captured once here; changes made while the request is in
    /// flight (including during retries) do not affect it.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> RequestResult<Value> {
        let credential = self.credential.snapshot();
        self.dispatch(method, path, body, credential).await
    }

    /// Issue a request and decode the data into `T`
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> RequestResult<T> {
        let value = self.request(method, path, body).await?;
        decode(value, path)
    }

    /// Issue a request that never carries a credential
    pub(crate) async fn request_anonymous(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> RequestResult<Value> {
        self.dispatch(method, path, body, None).await
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        credential: Option<Credential>,
    ) -> RequestResult<Value> {
        let url = self.config.endpoint_url(path);
        let operation = format!("{} {}", method, path);

        // POST is not idempotent, so it gets exactly one attempt.
        let disabled = RetryConfig::disabled();
        let retry = if method == Method::POST {
            &disabled
        } else {
            &self.config.retry
        };

        let method_ref = &method;
        let url_ref = url.as_str();
        let body_ref = body.as_ref();
        let credential_ref = credential.as_ref();

        let result = retry_when(
            move || self.send_once(method_ref, url_ref, body_ref, credential_ref),
            retry,
            &operation,
            TeamtaskError::is_recoverable,
        )
        .await;

        if let Err(error) = &result {
            debug!(method = %method, url = %url, "API request failed");
            error.log();
        }

        result
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        body: Option<&Value>,
        credential: Option<&Credential>,
    ) -> RequestResult<Value> {
        debug!(
            method = %method,
            url = %url,
            authenticated = credential.is_some(),
            "Sending API request"
        );

        let mut request = self.client.request(method.clone(), url);
        if let Some(credential) = credential {
            request = request.header(AUTHORIZATION, credential.bearer());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let timeout_seconds = self.config.timeout_seconds;
        let response = request.send().await.map_err(|e| {
            transport_error(e, &self.config.base_url, method, url, timeout_seconds)
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            transport_error(e, &self.config.base_url, method, url, timeout_seconds)
        })?;

        debug!(method = %method, url = %url, status = status.as_u16(), "Received API response");

        normalize(status, url, &text)
    }
}

impl std::fmt::Debug for ApiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiGateway")
            .field("base_url", &self.config.base_url)
            .field("credential", &self.credential)
            .finish()
    }
}

/// Decode normalized data into a typed shape
pub(crate) fn decode<T: DeserializeOwned>(value: Value, path: &str) -> RequestResult<T> {
    serde_json::from_value(value).map_err(|e| TeamtaskError::MalformedResponse {
        message: format!("Unexpected response shape from {}: {}", path, e),
        source: Some(Box::new(e)),
        context: ErrorContext::new("api_gateway").with_operation("decode"),
    })
}

/// Helper function to create HTTP client with common configuration
pub(crate) fn create_http_client(config: &ApiClientConfig) -> TeamtaskResult<reqwest::Client> {
    let mut headers = HeaderMap::new();

    headers.insert(
        reqwest::header::USER_AGENT,
        HeaderValue::from_str(&config.user_agent).map_err(|e| TeamtaskError::Validation {
            message: format!("Invalid user agent: {}", e),
            field: Some("user_agent".to_string()),
            context: ErrorContext::new("http_client").with_operation("create_client"),
        })?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    for (key, value) in &config.headers {
        let header_name =
            HeaderName::from_bytes(key.as_bytes()).map_err(|e| TeamtaskError::Validation {
                message: format!("Invalid header name '{}': {}", key, e),
                field: Some("headers".to_string()),
                context: ErrorContext::new("http_client").with_operation("create_client"),
            })?;

        let header_value = HeaderValue::from_str(value).map_err(|e| TeamtaskError::Validation {
            message: format!("Invalid header value for '{}': {}", key, e),
            field: Some("headers".to_string()),
            context: ErrorContext::new("http_client").with_operation("create_client"),
        })?;

        headers.insert(header_name, header_value);
    }

    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_seconds))
        .default_headers(headers)
        .build()
        .map_err(|e| TeamtaskError::Internal {
            message: format!("Failed to create HTTP client: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("http_client").with_operation("create_client"),
        })
}
