use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::analysis::{PostId, TreeNode, TreeResult};
use crate::data::TreeSource;
use crate::fetch::{FetchKey, FetchPipeline, FetchState, Resolution};
use crate::inspect::{DetailField, Inspector};
use crate::tree::{ArgumentTree, TreeRow};
use crate::validate::{self, ValidationError};

pub const INVALID_IDENTIFIER_MESSAGE: &str =
    "Invalid Tweet URL ID. Check the URL and try another post.";

/// Everything the analysis screen needs for one frame, derived from the
/// current fetch state.
pub enum PageView<'a> {
    Idle,
    Loading {
        key: &'a FetchKey,
    },
    Failed {
        message: &'a str,
    },
    Ready {
        result: &'a TreeResult,
        rows: Vec<TreeRow<'a>>,
        selected: Option<&'a TreeNode>,
        details: Option<Vec<DetailField>>,
    },
}

/// Validates home-screen input into the key to navigate to.
pub fn submit(input: &str) -> Result<FetchKey, ValidationError> {
    validate::validate(input).map(FetchKey::Post)
}

/// Owns one analysis session: the fetch lifecycle, the expand/collapse state
/// of the tree on screen, and the node inspector.
pub struct PageController {
    source: Arc<dyn TreeSource>,
    pipeline: FetchPipeline,
    route: Option<FetchKey>,
    display_id: Option<String>,
    tree: ArgumentTree,
    inspector: Inspector,
}

impl PageController {
    pub fn new(source: Arc<dyn TreeSource>) -> Self {
        Self {
            source,
            pipeline: FetchPipeline::new(),
            route: None,
            display_id: None,
            tree: ArgumentTree::new(),
            inspector: Inspector::new(),
        }
    }

    /// Enters the analysis view for a raw route parameter. Unusable input goes
    /// straight to the error state without touching any source.
    pub fn enter(&mut self, route: Option<&str>) {
        match route.and_then(validate::parse_route) {
            Some(key) => self.enter_key(key),
            None => {
                debug!(?route, "unusable route parameter");
                self.clear_session();
                self.route = None;
                self.display_id = route.map(|raw| raw.trim().to_string());
                self.pipeline.fail(INVALID_IDENTIFIER_MESSAGE);
            }
        }
    }

    pub fn enter_key(&mut self, key: FetchKey) {
        info!(key = %key, "entering analysis");
        self.clear_session();
        self.display_id = Some(key.to_string());
        self.route = Some(key.clone());
        self.pipeline.start(key, self.source.clone());
    }

    /// Re-enters the current route from scratch.
    pub fn reload(&mut self) -> bool {
        let Some(key) = self.route.clone() else {
            return false;
        };
        self.enter_key(key);
        true
    }

    /// Returns to the idle state, discarding the session.
    pub fn leave(&mut self) {
        self.clear_session();
        self.route = None;
        self.display_id = None;
        self.pipeline.reset();
    }

    fn clear_session(&mut self) {
        self.tree.reset();
        self.inspector.close();
    }

    /// Applies finished fetches. Returns true when the state changed.
    pub fn poll(&mut self) -> bool {
        match self.pipeline.poll() {
            Some(resolution) => {
                self.apply(resolution);
                true
            }
            None => false,
        }
    }

    pub fn wait(&mut self, timeout: Duration) -> bool {
        match self.pipeline.wait(timeout) {
            Some(resolution) => {
                self.apply(resolution);
                true
            }
            None => false,
        }
    }

    fn apply(&mut self, resolution: Resolution) {
        if resolution.succeeded {
            self.clear_session();
            if let Some(result) = self.pipeline.state().result() {
                for issue in result.integrity_issues() {
                    warn!(%issue, "omitting metric");
                }
            }
        }
        if let Some(id) = resolution.embedded_id {
            debug!(displayed = %id, "adopting embedded root id");
            self.display_id = Some(id.to_string());
        }
    }

    pub fn state(&self) -> &FetchState {
        self.pipeline.state()
    }

    pub fn route(&self) -> Option<&FetchKey> {
        self.route.as_ref()
    }

    pub fn display_id(&self) -> Option<&str> {
        self.display_id.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.pipeline.state().is_loading()
    }

    pub fn result(&self) -> Option<&TreeResult> {
        self.pipeline.state().result()
    }

    pub fn inspector(&self) -> &Inspector {
        &self.inspector
    }

    pub fn collapsed_count(&self) -> usize {
        self.tree.collapsed_count()
    }

    pub fn toggle(&mut self, id: &PostId) -> Option<bool> {
        let result = self.pipeline.state().result()?;
        result.find(id)?;
        Some(self.tree.toggle(id))
    }

    pub fn expand_all(&mut self) -> bool {
        if self.pipeline.state().result().is_none() {
            return false;
        }
        self.tree.expand_all()
    }

    /// Opens the inspector for `id` if it is part of the loaded tree.
    pub fn select(&mut self, id: &PostId) -> bool {
        let Some(node) = self.pipeline.state().result().and_then(|r| r.find(id)) else {
            return false;
        };
        self.inspector.select(node);
        true
    }

    pub fn close_inspector(&mut self) {
        self.inspector.close();
    }

    pub fn selected_node(&self) -> Option<&TreeNode> {
        let root = self.result()?.root.as_ref()?;
        self.inspector.selected_node(root)
    }

    pub fn view(&mut self) -> PageView<'_> {
        let Self {
            pipeline,
            tree,
            inspector,
            ..
        } = self;
        match pipeline.state() {
            FetchState::Idle => PageView::Idle,
            FetchState::Loading(key) => PageView::Loading { key },
            FetchState::Error(message) => PageView::Failed { message },
            FetchState::Success(result) => {
                let (rows, selected) = match result.root.as_ref() {
                    Some(root) => (tree.rows(root), inspector.selected_node(root)),
                    None => (Vec::new(), None),
                };
                let details = selected.map(crate::inspect::node_details);
                PageView::Ready {
                    result,
                    rows,
                    selected,
                    details,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Engagement, Sentiment, Stance, TreeMetrics};
    use crate::data::StaticSource;
    use crate::fetch::FETCH_FAILED_MESSAGE;

    const WAIT: Duration = Duration::from_secs(5);

    fn leaf(id: &str, sentiment: Sentiment, stance: Stance) -> TreeNode {
        TreeNode {
            id: PostId::new(id),
            text: format!("post {id}"),
            sentiment,
            stance,
            acceptability: None,
            engagement: Engagement::default(),
            children: Vec::new(),
        }
    }

    fn two_nodes() -> TreeResult {
        let mut root = leaf("123", Sentiment::Positive, Stance::None);
        root.children.push(leaf("456", Sentiment::Negative, Stance::Attack));
        TreeResult {
            root: Some(root),
            metrics: TreeMetrics::default(),
        }
    }

    fn controller(source: StaticSource) -> PageController {
        PageController::new(Arc::new(source))
    }

    fn post(id: &str) -> FetchKey {
        FetchKey::Post(PostId::new(id))
    }

    #[test]
    fn unusable_route_is_an_immediate_error() {
        let mut page = controller(StaticSource::new());
        page.enter(None);
        assert_eq!(
            page.state(),
            &FetchState::Error(INVALID_IDENTIFIER_MESSAGE.to_string())
        );
        page.enter(Some("definitely not a post"));
        assert!(matches!(page.view(), PageView::Failed { .. }));
    }

    #[test]
    fn entering_starts_loading() {
        let mut page = controller(StaticSource::new().with_result(post("123"), two_nodes()));
        page.enter(Some("123"));
        assert!(page.is_loading());
        assert_eq!(page.display_id(), Some("123"));
        assert!(page.wait(WAIT));
        assert!(matches!(page.view(), PageView::Ready { .. }));
    }

    #[test]
    fn failed_fetch_shows_generic_message() {
        let mut page = controller(StaticSource::new());
        page.enter(Some("999"));
        assert!(page.wait(WAIT));
        assert_eq!(
            page.state(),
            &FetchState::Error(FETCH_FAILED_MESSAGE.to_string())
        );
    }

    #[test]
    fn ui_mutations_are_noops_without_a_tree() {
        let mut page = controller(StaticSource::new());
        page.enter(Some("1"));
        assert_eq!(page.toggle(&PostId::new("1")), None);
        assert!(!page.select(&PostId::new("1")));
        assert!(!page.expand_all());
    }

    #[test]
    fn new_result_resets_expansion_and_selection() {
        let source = StaticSource::new()
            .with_result(post("123"), two_nodes())
            .with_result(post("124"), two_nodes());
        let mut page = controller(source);
        page.enter(Some("123"));
        assert!(page.wait(WAIT));
        assert_eq!(page.toggle(&PostId::new("123")), Some(false));
        assert!(page.select(&PostId::new("456")));

        assert!(page.reload());
        assert!(page.wait(WAIT));
        assert_eq!(page.collapsed_count(), 0);
        assert!(!page.inspector().is_open());
    }

    #[test]
    fn select_then_close() {
        let mut page = controller(StaticSource::new().with_result(post("123"), two_nodes()));
        page.enter(Some("123"));
        assert!(page.wait(WAIT));
        assert!(page.select(&PostId::new("123")));
        assert!(page.select(&PostId::new("456")));
        assert_eq!(
            page.selected_node().map(|node| node.id.as_str()),
            Some("456")
        );
        match page.view() {
            PageView::Ready { details, .. } => assert!(details.is_some()),
            _ => panic!("expected ready view"),
        }
        page.close_inspector();
        assert!(page.selected_node().is_none());
        assert!(!page.select(&PostId::new("nope")));
    }

    #[test]
    fn slow_superseded_fetch_does_not_clobber_newer_result() {
        let source = StaticSource::new()
            .with_result(post("1"), two_nodes())
            .with_delay(post("1"), Duration::from_millis(200))
            .with_result(post("2"), TreeResult::default());
        let mut page = controller(source);
        page.enter(Some("1"));
        page.enter(Some("2"));
        assert!(page.wait(WAIT));
        std::thread::sleep(Duration::from_millis(400));
        assert!(!page.poll());
        let result = page.result().unwrap();
        assert!(result.root.is_none());
        assert_eq!(page.display_id(), Some("2"));
    }

    #[test]
    fn submit_validates_before_navigation() {
        assert_eq!(submit("twitter.com/user/status/123"), Ok(post("123")));
        assert_eq!(submit(""), Err(ValidationError::EmptyInput));
    }

    #[test]
    fn leave_returns_to_idle() {
        let mut page = controller(StaticSource::new().with_result(post("123"), two_nodes()));
        page.enter(Some("123"));
        page.leave();
        assert_eq!(page.state(), &FetchState::Idle);
        assert!(!page.reload());
    }
}
