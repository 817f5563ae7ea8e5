use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, USER_AGENT};
use tracing::debug;
use url::Url;

use crate::analysis::{decode_response, PostId, TreeResult};
use crate::fetch::FetchError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub http_client: Option<HttpClient>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: format!("tweetlytics/{}", crate::VERSION),
            timeout: Duration::from_secs(20),
            http_client: None,
        }
    }
}

/// Client for the analysis backend (`GET /api/analyze/<id>`).
pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        let base_url = parse_base_url(&config.base_url)?;
        let user_agent = if config.user_agent.trim().is_empty() {
            format!("tweetlytics/{}", crate::VERSION)
        } else {
            config.user_agent
        };

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder().timeout(config.timeout).build()?,
        };

        Ok(Client {
            http,
            user_agent,
            base_url,
        })
    }

    pub fn analyze_url(&self, id: &PostId) -> Result<Url, FetchError> {
        self.base_url
            .join(&format!("api/analyze/{}", id.as_str()))
            .map_err(|err| FetchError::InvalidBaseUrl(err.to_string()))
    }

    pub fn analyze(&self, id: &PostId) -> Result<TreeResult, FetchError> {
        let url = self.analyze_url(id)?;
        debug!(%url, "requesting analysis");
        let response = self
            .http
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text()?;
        Ok(decode_response(&body)?)
    }
}

/// Normalizes the configured base so that `join` appends below it instead of
/// replacing its last path segment.
fn parse_base_url(raw: &str) -> Result<Url, FetchError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FetchError::InvalidBaseUrl("backend base url is empty".into()));
    }
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&with_slash).map_err(|err| FetchError::InvalidBaseUrl(err.to_string()))
}
