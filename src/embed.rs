use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::analysis::PostId;

pub const DEFAULT_ENDPOINT: &str = "https://publish.twitter.com/oembed";
pub const EMBED_FAILED_PLACEHOLDER: &str = "Could not load tweet!";

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embed request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("embed endpoint responded with status {0}")]
    Status(u16),
    #[error("invalid embed endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub author: String,
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedState {
    Loading,
    Ready(Embed),
    Failed,
}

#[derive(Deserialize)]
struct OEmbedResponse {
    #[serde(default)]
    html: String,
    #[serde(default)]
    author_name: String,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            user_agent: format!("tweetlytics/{}", crate::VERSION),
            timeout: Duration::from_secs(8),
        }
    }
}

pub struct Client {
    http: HttpClient,
    endpoint: Url,
    user_agent: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, EmbedError> {
        let endpoint = Url::parse(config.endpoint.trim())?;
        let http = HttpClient::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            endpoint,
            user_agent: config.user_agent,
        })
    }

    pub fn request_url(&self, id: &PostId) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("url", &id.permalink())
            .append_pair("omit_script", "true")
            .append_pair("dnt", "true");
        url
    }

    pub fn fetch(&self, id: &PostId) -> Result<Embed, EmbedError> {
        let response = self
            .http
            .get(self.request_url(id))
            .header(USER_AGENT, &self.user_agent)
            .send()?;
        if !response.status().is_success() {
            return Err(EmbedError::Status(response.status().as_u16()));
        }
        let body: OEmbedResponse = response.json()?;
        Ok(Embed {
            author: body.author_name,
            text: html_to_text(&body.html),
            url: if body.url.is_empty() {
                id.permalink()
            } else {
                body.url
            },
        })
    }
}

/// Reduces the oEmbed blockquote to the post text. The trailing attribution
/// paragraph is dropped along with every tag.
pub fn html_to_text(html: &str) -> String {
    static PARAGRAPH_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?is)<p[^>]*>(.*?)</p>").expect("valid paragraph regex"));
    static BREAK_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid break regex"));
    static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));

    let body = PARAGRAPH_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let source = if body.is_empty() { html } else { body.as_str() };
    let with_breaks = BREAK_RE.replace_all(source, "\n");
    let stripped = TAG_RE.replace_all(&with_breaks, "");
    decode_entities(stripped.trim())
}

fn decode_entities(text: &str) -> String {
    text.replace("&mdash;", "-")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

struct EmbedResponse {
    id: PostId,
    result: Result<Embed, EmbedError>,
}

/// Fetches embeds on worker threads and keeps per-post state. Failures stay
/// local to the post that failed.
pub struct Loader {
    client: Option<Arc<Client>>,
    states: HashMap<PostId, EmbedState>,
    response_tx: Sender<EmbedResponse>,
    response_rx: Receiver<EmbedResponse>,
}

impl Loader {
    pub fn new(client: Option<Arc<Client>>) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            client,
            states: HashMap::new(),
            response_tx,
            response_rx,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    pub fn state(&self, id: &PostId) -> Option<&EmbedState> {
        self.states.get(id)
    }

    /// Starts a fetch for `id` unless one already ran or is running.
    pub fn request(&mut self, id: &PostId) {
        let Some(client) = self.client.clone() else {
            return;
        };
        if self.states.contains_key(id) {
            return;
        }
        self.states.insert(id.clone(), EmbedState::Loading);
        let tx = self.response_tx.clone();
        let id = id.clone();
        thread::spawn(move || {
            let result = client.fetch(&id);
            let _ = tx.send(EmbedResponse { id, result });
        });
    }

    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(response) = self.response_rx.try_recv() {
            self.apply(response.id, response.result);
            changed = true;
        }
        changed
    }

    fn apply(&mut self, id: PostId, result: Result<Embed, EmbedError>) {
        let state = match result {
            Ok(embed) => {
                debug!(%id, "embed loaded");
                EmbedState::Ready(embed)
            }
            Err(err) => {
                warn!(%id, error = %err, "embed failed");
                EmbedState::Failed
            }
        };
        self.states.insert(id, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_HTML: &str = "<blockquote class=\"twitter-tweet\"><p lang=\"en\" dir=\"ltr\">Just finished my first marathon!<br>Slow &amp; sore.</p>&mdash; Runner (@runner) <a href=\"https://twitter.com/runner/status/1\">December 11, 2022</a></blockquote>\n";

    #[test]
    fn html_reduces_to_post_text() {
        assert_eq!(
            html_to_text(SAMPLE_HTML),
            "Just finished my first marathon!\nSlow & sore."
        );
    }

    #[test]
    fn html_without_paragraph_is_stripped() {
        assert_eq!(html_to_text("<b>bold</b> &quot;quoted&quot;"), "bold \"quoted\"");
    }

    #[test]
    fn request_url_points_at_status_permalink() {
        let client = Client::new(ClientConfig::default()).unwrap();
        let url = client.request_url(&PostId::new("42"));
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&(
            "url".to_string(),
            "https://twitter.com/twitter/status/42".to_string()
        )));
        assert!(url.as_str().starts_with(DEFAULT_ENDPOINT));
    }

    #[test]
    fn failures_only_mark_their_own_post() {
        let mut loader = Loader::disabled();
        loader.apply(
            PostId::new("1"),
            Err(EmbedError::Status(404)),
        );
        loader.apply(
            PostId::new("2"),
            Ok(Embed {
                author: "a".into(),
                text: "t".into(),
                url: "u".into(),
            }),
        );
        assert_eq!(loader.state(&PostId::new("1")), Some(&EmbedState::Failed));
        assert!(matches!(
            loader.state(&PostId::new("2")),
            Some(EmbedState::Ready(_))
        ));
    }

    #[test]
    fn disabled_loader_never_requests() {
        let mut loader = Loader::disabled();
        loader.request(&PostId::new("1"));
        assert!(loader.state(&PostId::new("1")).is_none());
        assert!(!loader.poll());
    }
}
