use crate::analysis::{PostId, TreeNode};

pub const NOT_AN_ARGUMENT: &str = "Not an argument";
pub const NO_LINK: &str = "Unavailable";

/// A labelled value shown in the node detail popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailField {
    pub label: &'static str,
    pub value: String,
}

impl DetailField {
    fn new<V: Into<String>>(label: &'static str, value: V) -> Self {
        Self {
            label,
            value: value.into(),
        }
    }
}

/// Tracks the single node whose details are open, if any.
#[derive(Debug, Clone, Default)]
pub struct Inspector {
    selected: Option<PostId>,
}

impl Inspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the detail view for `node`, replacing any previous selection.
    pub fn select(&mut self, node: &TreeNode) {
        self.selected = Some(node.id.clone());
    }

    pub fn close(&mut self) {
        self.selected = None;
    }

    pub fn is_open(&self) -> bool {
        self.selected.is_some()
    }

    pub fn selected(&self) -> Option<&PostId> {
        self.selected.as_ref()
    }

    /// Resolves the selection against `root`.
    pub fn selected_node<'a>(&self, root: &'a TreeNode) -> Option<&'a TreeNode> {
        self.selected.as_ref().and_then(|id| root.find(id))
    }

    pub fn details(&self, root: &TreeNode) -> Option<Vec<DetailField>> {
        self.selected_node(root).map(node_details)
    }
}

pub fn format_strength(acceptability: Option<f64>) -> String {
    match acceptability {
        Some(score) => format!("{score:.4}"),
        None => NOT_AN_ARGUMENT.to_string(),
    }
}

/// Public permalink, unless the backend never told us which post this is.
pub fn post_link(node: &TreeNode) -> Option<String> {
    (!node.id.is_synthetic()).then(|| node.id.permalink())
}

pub fn node_details(node: &TreeNode) -> Vec<DetailField> {
    vec![
        DetailField::new("ID", node.id.to_string()),
        DetailField::new("Text", format!("\"{}\"", node.text)),
        DetailField::new("Sentiment", node.sentiment.as_str()),
        DetailField::new("Argumentative Type", node.stance.as_str()),
        DetailField::new(
            "Argument Strength (Acceptability Degree)",
            format_strength(node.acceptability),
        ),
        DetailField::new("Like Count", node.engagement.likes.to_string()),
        DetailField::new("Retweet Count", node.engagement.retweets.to_string()),
        DetailField::new("Reply Count", node.engagement.replies.to_string()),
        DetailField::new("Quote Count", node.engagement.quotes.to_string()),
        DetailField::new("Link", post_link(node).unwrap_or_else(|| NO_LINK.to_string())),
    ]
}
