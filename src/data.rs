use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::analysis::TreeResult;
use crate::backend;
use crate::fetch::{FetchError, FetchKey};

pub const DEFAULT_EXAMPLE_DELAY: Duration = Duration::from_millis(1500);

/// Anything that can turn a fetch key into an analysis result. Implementations
/// may block; the pipeline calls them from worker threads.
pub trait TreeSource: Send + Sync {
    fn load(&self, key: &FetchKey) -> Result<TreeResult, FetchError>;
}

pub struct BackendSource {
    client: Arc<backend::Client>,
}

impl BackendSource {
    pub fn new(client: Arc<backend::Client>) -> Self {
        Self { client }
    }
}

impl TreeSource for BackendSource {
    fn load(&self, key: &FetchKey) -> Result<TreeResult, FetchError> {
        match key {
            FetchKey::Post(id) => self.client.analyze(id),
            FetchKey::Example(_) => Err(FetchError::Unavailable(key.clone())),
        }
    }
}

/// Serves the bundled examples after a short pause so the loading state is
/// visible, the way a real round trip would be.
pub struct ExampleSource {
    delay: Duration,
}

impl ExampleSource {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for ExampleSource {
    fn default() -> Self {
        Self::new(DEFAULT_EXAMPLE_DELAY)
    }
}

impl TreeSource for ExampleSource {
    fn load(&self, key: &FetchKey) -> Result<TreeResult, FetchError> {
        let FetchKey::Example(example) = key else {
            return Err(FetchError::Unavailable(key.clone()));
        };
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        debug!(example = %example, "serving bundled example");
        Ok(example.load()?)
    }
}

/// Sends example keys to the bundled fixtures and post ids to the live
/// backend, when one is configured.
pub struct RoutingSource {
    live: Option<Arc<dyn TreeSource>>,
    examples: ExampleSource,
}

impl RoutingSource {
    pub fn new(live: Option<Arc<dyn TreeSource>>, examples: ExampleSource) -> Self {
        Self { live, examples }
    }
}

impl TreeSource for RoutingSource {
    fn load(&self, key: &FetchKey) -> Result<TreeResult, FetchError> {
        match key {
            FetchKey::Example(_) => self.examples.load(key),
            FetchKey::Post(_) => match self.live.as_ref() {
                Some(live) => live.load(key),
                None => Err(FetchError::Unavailable(key.clone())),
            },
        }
    }
}

/// In-memory source answering from a fixed table; keys without an entry
/// fail with a 404.
#[derive(Default)]
pub struct StaticSource {
    results: HashMap<FetchKey, TreeResult>,
    delays: HashMap<FetchKey, Duration>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, key: FetchKey, result: TreeResult) -> Self {
        self.results.insert(key, result);
        self
    }

    pub fn with_delay(mut self, key: FetchKey, delay: Duration) -> Self {
        self.delays.insert(key, delay);
        self
    }
}

impl TreeSource for StaticSource {
    fn load(&self, key: &FetchKey) -> Result<TreeResult, FetchError> {
        if let Some(delay) = self.delays.get(key) {
            thread::sleep(*delay);
        }
        self.results
            .get(key)
            .cloned()
            .ok_or(FetchError::Status(404))
    }
}
