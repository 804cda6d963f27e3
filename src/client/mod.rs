//! Client for a meeting directory server
//!
//! Nothing in here is global. A [`ServiceContext`] carries the base
//! URI, the transport used to reach it and the normalizer settings, and
//! is handed to whatever needs to talk to the server.
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::core::AppConfig;
use crate::meeting::MeetingRecord;
use crate::normalize::{
    Normalizer, NormalizerConfig, OutputShape, Page, PageError, RichShape, TimezonePolicy,
};
use crate::query::SearchSpecification;

pub mod info;
pub use info::{ServerEntry, ServerInfo, Service};

/// What came back from a GET, before any interpretation.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl TransportResponse {
    pub fn is_json_success(&self) -> bool {
        (200..300).contains(&self.status)
            && self
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"))
    }
}

/// Opaque request/response primitive.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<TransportResponse>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<TransportResponse> {
        let res = self
            .client
            .get(url.clone())
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = res.status().as_u16();
        let content_type = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = res.text().await?;
        Ok(TransportResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Outcome of a failed fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The server answered, but not with a 2xx JSON response
    #[error("no data (status {status}, content type {content_type:?})")]
    NoData {
        status: u16,
        content_type: Option<String>,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unable to decode response: {0}")]
    Decode(String),
    /// A well formed response with no usable meetings
    #[error("no meetings found")]
    EmptyResult,
}

impl From<PageError> for FetchError {
    fn from(err: PageError) -> Self {
        match err {
            PageError::NoMeetings => FetchError::EmptyResult,
            other => FetchError::Decode(other.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct ServiceContext {
    pub base_uri: Url,
    pub transport: Arc<dyn Transport>,
    pub normalizer: Normalizer,
}

impl ServiceContext {
    pub fn new(base_uri: Url, transport: Arc<dyn Transport>, normalizer: Normalizer) -> Self {
        Self {
            base_uri,
            transport,
            normalizer,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let base_uri = Url::parse(&config.base_uri)?;
        let transport = ReqwestTransport::new(Duration::from_secs(config.request_timeout_secs))?;
        let timezone_policy = if config.require_timezone {
            TimezonePolicy::Required
        } else {
            TimezonePolicy::DefaultToLocal
        };
        let normalizer = Normalizer::new(NormalizerConfig {
            timezone_policy,
            local_timezone: config.local_timezone,
        });
        Ok(Self::new(base_uri, Arc::new(transport), normalizer))
    }
}

#[derive(Clone)]
pub struct DirectoryClient {
    ctx: ServiceContext,
}

impl DirectoryClient {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    pub fn info_url(&self) -> Url {
        let mut url = self.ctx.base_uri.clone();
        url.set_query(Some("info"));
        url
    }

    pub async fn server_info(&self) -> Result<ServerInfo, FetchError> {
        let body = self.fetch_json(&self.info_url()).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// Runs a search and returns the parsed records.
    pub async fn search(&self, spec: &SearchSpecification) -> Result<Page<MeetingRecord>, FetchError> {
        self.search_shaped::<RichShape>(spec).await
    }

    /// Runs a search and shapes each record with `S`. A page in which
    /// no record survived normalization is an [`FetchError::EmptyResult`].
    pub async fn search_shaped<S: OutputShape>(
        &self,
        spec: &SearchSpecification,
    ) -> Result<Page<S::Output>, FetchError> {
        let url = spec.to_url(&self.ctx.base_uri);
        let body = self.fetch_json(&url).await?;
        let page = self.ctx.normalizer.parse_page_str::<S>(&body)?;
        if page.meetings.is_empty() {
            return Err(FetchError::EmptyResult);
        }
        Ok(page)
    }

    async fn fetch_json(&self, url: &Url) -> Result<String, FetchError> {
        tracing::debug!("GET {}", url);
        let res = self.ctx.transport.get(url).await.map_err(|e| {
            tracing::warn!("Request to {} failed: {:#}", url, e);
            FetchError::Transport(format!("{:#}", e))
        })?;

        if !res.is_json_success() {
            tracing::warn!(
                "Request to {} returned status {} ({:?})",
                url,
                res.status,
                res.content_type
            );
            return Err(FetchError::NoData {
                status: res.status,
                content_type: res.content_type,
            });
        }

        Ok(res.body)
    }
}
