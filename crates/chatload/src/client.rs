//! Transport seam between the scenario and the job API

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use crate::config::TargetConfig;
use crate::error::Result;
use crate::model::{JobRequest, RawResponse};

/// Minimal HTTP surface the scenario needs
///
/// `Err` means no HTTP status was obtained at all. Every status code, including 4xx and
/// 5xx, comes back as `Ok` so the scenario can classify it.
#[async_trait]
pub trait JobApi: Send + Sync {
    /// `POST {base}/chat`
    async fn submit(&self, request: &JobRequest) -> Result<RawResponse>;

    /// `GET {base}/{status_url}`
    async fn fetch_status(&self, status_url: &str) -> Result<RawResponse>;
}

/// Join a status fragment onto the base URL with exactly one `/` between them.
///
/// Absolute `http(s)://` status URLs are returned unchanged.
pub fn join_status_url(base_url: &str, status_url: &str) -> String {
    if status_url.starts_with("http://") || status_url.starts_with("https://") {
        return status_url.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        status_url.trim_start_matches('/')
    )
}

/// `JobApi` over a pooled reqwest client
#[derive(Debug, Clone)]
pub struct HttpJobApi {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpJobApi {
    pub fn new(config: &TargetConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .pool_max_idle_per_host(config.max_idle_per_host)
            .build()?;

        Ok(Self::with_client(client, config))
    }

    /// Reuse an existing client
    pub fn with_client(client: reqwest::Client, config: &TargetConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn chat_url(&self) -> String {
        format!("{}/chat", self.base_url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => builder,
        }
    }
}

async fn read_response(response: reqwest::Response) -> RawResponse {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    RawResponse { status, body }
}

#[async_trait]
impl JobApi for HttpJobApi {
    async fn submit(&self, request: &JobRequest) -> Result<RawResponse> {
        let url = self.chat_url();
        debug!("POST {}", url);

        let response = self
            .authorize(self.client.post(&url))
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await?;

        Ok(read_response(response).await)
    }

    async fn fetch_status(&self, status_url: &str) -> Result<RawResponse> {
        let url = join_status_url(&self.base_url, status_url);
        debug!("GET {}", url);

        let response = self
            .authorize(self.client.get(&url))
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        Ok(read_response(response).await)
    }
}
