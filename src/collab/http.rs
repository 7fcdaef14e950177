use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Security requirements for outbound collaborator calls
#[derive(Debug, Clone)]
pub struct HttpSecurityConfig {
    /// Require HTTPS for all external communications
    pub require_https: bool,
    /// Whole-request timeout
    pub timeout: Duration,
    /// Maximum response size in bytes
    pub max_response_size: usize,
    /// Hosts calls may go to; empty allows any host
    pub allowed_hosts: Vec<String>,
}

impl Default for HttpSecurityConfig {
    fn default() -> Self {
        Self {
            require_https: true,
            timeout: Duration::from_secs(10),
            max_response_size: 2 * 1024 * 1024, // 2MB max
            allowed_hosts: Vec::new(),
        }
    }
}

/// HTTP client for the ML and workflow collaborators
#[derive(Clone)]
pub struct SecureHttpClient {
    client: Client,
    config: HttpSecurityConfig,
}

impl SecureHttpClient {
    pub fn new(config: HttpSecurityConfig) -> Result<Self> {
        let mut client_builder = Client::builder()
            .timeout(config.timeout)
            .user_agent("expert-governance/0.1");

        if config.require_https {
            client_builder = client_builder.https_only(true);
        }

        let client = client_builder
            .build()
            .context("Failed to create secure HTTP client")?;

        Ok(Self { client, config })
    }

    /// Validate URL for security requirements
    pub fn validate_url(&self, url: &str) -> Result<Url> {
        let parsed_url = Url::parse(url).context("Invalid URL format")?;

        if self.config.require_https && parsed_url.scheme() != "https" {
            return Err(anyhow::anyhow!(
                "HTTPS is required but URL uses {}: {}",
                parsed_url.scheme(),
                url
            ));
        }

        let Some(host) = parsed_url.host_str() else {
            return Err(anyhow::anyhow!("URL must have a valid host: {}", url));
        };

        if !self.config.allowed_hosts.is_empty()
            && !self
                .config
                .allowed_hosts
                .iter()
                .any(|allowed| host == allowed || host.ends_with(&format!(".{}", allowed)))
        {
            return Err(anyhow::anyhow!(
                "Host '{}' is not in the allowed list: {:?}",
                host,
                self.config.allowed_hosts
            ));
        }

        if host == "localhost" || host == "127.0.0.1" {
            warn!("Allowing localhost collaborator URL: {}", url);
        }

        Ok(parsed_url)
    }

    /// POST a JSON body, exactly as given, and return the response text.
    pub async fn post_json(
        &self,
        url: &str,
        body: Vec<u8>,
        headers: &[(&str, String)],
    ) -> Result<String> {
        let validated_url = self.validate_url(url)?;

        let mut request = self
            .client
            .post(validated_url.as_str())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        let response = request
            .body(body)
            .send()
            .await
            .context("Failed to send HTTP request")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "HTTP request failed with status {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ));
        }

        let content_length = response.content_length().unwrap_or(0);
        if content_length > self.config.max_response_size as u64 {
            return Err(anyhow::anyhow!(
                "Response too large: {} bytes (max: {})",
                content_length,
                self.config.max_response_size
            ));
        }

        let response_text = response
            .text()
            .await
            .context("Failed to read response body")?;

        if response_text.len() > self.config.max_response_size {
            return Err(anyhow::anyhow!(
                "Response body too large: {} bytes (max: {})",
                response_text.len(),
                self.config.max_response_size
            ));
        }

        debug!(url = %validated_url, bytes = response_text.len(), "Collaborator responded");
        Ok(response_text)
    }

    pub fn config(&self) -> &HttpSecurityConfig {
        &self.config
    }
}
