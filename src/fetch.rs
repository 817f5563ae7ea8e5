use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analysis::{PostId, TreeResult};
use crate::data::TreeSource;
use crate::example::ExampleKey;

/// Shown whenever a fetch fails. The underlying cause only goes to the log.
pub const FETCH_FAILED_MESSAGE: &str = "Something went wrong while processing your request, make sure the Tweet URL is valid and try again!";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend responded with status {0}")]
    Status(u16),
    #[error("malformed analysis response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid backend url: {0}")]
    InvalidBaseUrl(String),
    #[error("no source can serve {0}")]
    Unavailable(FetchKey),
}

/// What to fetch: a live post or one of the bundled examples.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FetchKey {
    Post(PostId),
    Example(ExampleKey),
}

impl FetchKey {
    /// Whether `id` names the same post this key asked for.
    pub fn refers_to(&self, id: &PostId) -> bool {
        match self {
            FetchKey::Post(post) => post == id,
            FetchKey::Example(_) => false,
        }
    }
}

impl fmt::Display for FetchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchKey::Post(id) => write!(f, "{id}"),
            FetchKey::Example(key) => write!(f, "{key}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum FetchState {
    #[default]
    Idle,
    Loading(FetchKey),
    Success(TreeResult),
    Error(String),
}

impl FetchState {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Loading(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FetchState::Success(_) | FetchState::Error(_))
    }

    pub fn result(&self) -> Option<&TreeResult> {
        match self {
            FetchState::Success(result) => Some(result),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FetchState::Idle => "idle",
            FetchState::Loading(_) => "loading",
            FetchState::Success(_) => "success",
            FetchState::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub request_id: u64,
    pub key: FetchKey,
}

struct FetchResponse {
    request_id: u64,
    result: Result<TreeResult, FetchError>,
}

/// Outcome of applying a response that was still current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub request_id: u64,
    pub succeeded: bool,
    /// Root id of the result when it differs from the requested key.
    pub embedded_id: Option<PostId>,
}

/// Tri-state fetch lifecycle. Only the most recently issued request may move
/// the state out of `Loading`; responses to older requests are dropped.
pub struct FetchPipeline {
    state: FetchState,
    next_request_id: u64,
    pending: Option<Ticket>,
    response_tx: Sender<FetchResponse>,
    response_rx: Receiver<FetchResponse>,
}

impl Default for FetchPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchPipeline {
    pub fn new() -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            state: FetchState::Idle,
            next_request_id: 1,
            pending: None,
            response_tx,
            response_rx,
        }
    }

    pub fn state(&self) -> &FetchState {
        &self.state
    }

    pub fn pending(&self) -> Option<&Ticket> {
        self.pending.as_ref()
    }

    /// Moves to `Loading(key)` immediately and issues a new request id,
    /// superseding whatever was in flight.
    pub fn begin(&mut self, key: FetchKey) -> Ticket {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        if let Some(previous) = self.pending.as_ref() {
            debug!(
                superseded = previous.request_id,
                request_id, "fetch superseded"
            );
        }
        let ticket = Ticket {
            request_id,
            key: key.clone(),
        };
        self.pending = Some(ticket.clone());
        self.state = FetchState::Loading(key);
        ticket
    }

    /// Starts a fetch and runs the source on a worker thread. The result is
    /// applied by a later `poll` or `wait`.
    pub fn start(&mut self, key: FetchKey, source: Arc<dyn TreeSource>) -> u64 {
        let ticket = self.begin(key);
        let request_id = ticket.request_id;
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = source.load(&ticket.key);
            let _ = tx.send(FetchResponse { request_id, result });
        });
        request_id
    }

    /// Jumps straight to `Error`, invalidating anything still in flight.
    pub fn fail<S: Into<String>>(&mut self, message: S) {
        self.pending = None;
        self.state = FetchState::Error(message.into());
    }

    pub fn reset(&mut self) {
        self.pending = None;
        self.state = FetchState::Idle;
    }

    /// Applies the outcome of request `request_id`. Returns `None` when the
    /// request is no longer the current one.
    pub fn complete(
        &mut self,
        request_id: u64,
        result: Result<TreeResult, FetchError>,
    ) -> Option<Resolution> {
        let Some(ticket) = self.pending.as_ref() else {
            debug!(request_id, "dropping response with no fetch pending");
            return None;
        };
        if ticket.request_id != request_id {
            debug!(
                request_id,
                current = ticket.request_id,
                "dropping stale response"
            );
            return None;
        }
        let Some(ticket) = self.pending.take() else {
            return None;
        };

        match result {
            Ok(result) => {
                let embedded_id = result
                    .root
                    .as_ref()
                    .map(|root| &root.id)
                    .filter(|id| !ticket.key.refers_to(id))
                    .cloned();
                info!(
                    request_id,
                    key = %ticket.key,
                    posts = result.stats().posts,
                    "analysis loaded"
                );
                self.state = FetchState::Success(result);
                Some(Resolution {
                    request_id,
                    succeeded: true,
                    embedded_id,
                })
            }
            Err(err) => {
                warn!(request_id, key = %ticket.key, error = %err, "analysis fetch failed");
                self.state = FetchState::Error(FETCH_FAILED_MESSAGE.to_string());
                Some(Resolution {
                    request_id,
                    succeeded: false,
                    embedded_id: None,
                })
            }
        }
    }

    /// Drains finished workers without blocking. Returns the last resolution
    /// that changed the state.
    pub fn poll(&mut self) -> Option<Resolution> {
        let mut applied = None;
        while let Ok(response) = self.response_rx.try_recv() {
            if let Some(resolution) = self.complete(response.request_id, response.result) {
                applied = Some(resolution);
            }
        }
        applied
    }

    /// Blocks until the current request resolves or `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> Option<Resolution> {
        let deadline = Instant::now() + timeout;
        while self.pending.is_some() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(response) => {
                    if let Some(resolution) = self.complete(response.request_id, response.result)
                    {
                        return Some(resolution);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None;
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::TreeNode;
    use crate::data::StaticSource;

    fn tree(root_id: &str) -> TreeResult {
        TreeResult {
            root: Some(TreeNode {
                id: PostId::new(root_id),
                text: format!("post {root_id}"),
                sentiment: Default::default(),
                stance: Default::default(),
                acceptability: None,
                engagement: Default::default(),
                children: Vec::new(),
            }),
            metrics: Default::default(),
        }
    }

    fn post(id: &str) -> FetchKey {
        FetchKey::Post(PostId::new(id))
    }

    #[test]
    fn begin_enters_loading_synchronously() {
        let mut pipeline = FetchPipeline::new();
        assert_eq!(pipeline.state(), &FetchState::Idle);
        let ticket = pipeline.begin(post("1"));
        assert_eq!(pipeline.state(), &FetchState::Loading(post("1")));
        assert_eq!(pipeline.pending(), Some(&ticket));
    }

    #[test]
    fn success_and_error_are_exclusive_outcomes() {
        let mut pipeline = FetchPipeline::new();
        let ticket = pipeline.begin(post("1"));
        let resolution = pipeline.complete(ticket.request_id, Ok(tree("1"))).unwrap();
        assert!(resolution.succeeded);
        assert!(matches!(pipeline.state(), FetchState::Success(_)));
        assert!(pipeline.complete(ticket.request_id, Err(FetchError::Status(500))).is_none());
        assert!(matches!(pipeline.state(), FetchState::Success(_)));

        let ticket = pipeline.begin(post("2"));
        let resolution = pipeline
            .complete(ticket.request_id, Err(FetchError::Status(502)))
            .unwrap();
        assert!(!resolution.succeeded);
        assert_eq!(
            pipeline.state(),
            &FetchState::Error(FETCH_FAILED_MESSAGE.to_string())
        );
    }

    #[test]
    fn late_response_from_superseded_fetch_is_ignored() {
        let mut pipeline = FetchPipeline::new();
        let first = pipeline.begin(post("1"));
        let second = pipeline.begin(post("2"));

        assert!(pipeline.complete(second.request_id, Ok(tree("2"))).is_some());
        assert!(pipeline.complete(first.request_id, Ok(tree("1"))).is_none());

        let root = pipeline.state().result().and_then(|r| r.root.as_ref()).unwrap();
        assert_eq!(root.id.as_str(), "2");
    }

    #[test]
    fn early_response_from_superseded_fetch_is_ignored() {
        let mut pipeline = FetchPipeline::new();
        let first = pipeline.begin(post("1"));
        let second = pipeline.begin(post("2"));

        assert!(pipeline.complete(first.request_id, Ok(tree("1"))).is_none());
        assert_eq!(pipeline.state(), &FetchState::Loading(post("2")));
        assert!(pipeline
            .complete(second.request_id, Err(FetchError::Status(404)))
            .is_some());
        assert!(matches!(pipeline.state(), FetchState::Error(_)));
    }

    #[test]
    fn example_results_surface_their_root_id() {
        let mut pipeline = FetchPipeline::new();
        let ticket = pipeline.begin(FetchKey::Example(ExampleKey::One));
        let resolution = pipeline.complete(ticket.request_id, Ok(tree("555"))).unwrap();
        assert_eq!(resolution.embedded_id, Some(PostId::new("555")));

        let ticket = pipeline.begin(post("555"));
        let resolution = pipeline.complete(ticket.request_id, Ok(tree("555"))).unwrap();
        assert_eq!(resolution.embedded_id, None);
    }

    #[test]
    fn fail_invalidates_pending_request() {
        let mut pipeline = FetchPipeline::new();
        let ticket = pipeline.begin(post("1"));
        pipeline.fail("Invalid identifier");
        assert!(pipeline.complete(ticket.request_id, Ok(tree("1"))).is_none());
        assert_eq!(
            pipeline.state(),
            &FetchState::Error("Invalid identifier".to_string())
        );
    }

    #[test]
    fn worker_results_are_applied_by_wait() {
        let source = Arc::new(StaticSource::new().with_result(post("7"), tree("7")));
        let mut pipeline = FetchPipeline::new();
        pipeline.start(post("7"), source);
        assert!(pipeline.state().is_loading());
        let resolution = pipeline.wait(Duration::from_secs(5)).unwrap();
        assert!(resolution.succeeded);
        assert!(pipeline.state().is_terminal());
    }
}
