use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub const POST_URL_BASE: &str = "https://twitter.com/twitter/status";

const SYNTHETIC_ID_PREFIX: &str = "unidentified-";

/// Identifier of a single post. The backend emits ids either as JSON strings
/// or as integers; both decode to the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn permalink(&self) -> String {
        format!("{}/{}", POST_URL_BASE, self.0)
    }

    /// Placeholder for a node the backend sent without any id. Never a
    /// valid post id, so it cannot collide with a real one.
    fn synthetic(index: usize) -> Self {
        Self(format!("{SYNTHETIC_ID_PREFIX}{index}"))
    }

    pub fn is_synthetic(&self) -> bool {
        self.0.starts_with(SYNTHETIC_ID_PREFIX)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PostId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for PostId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => PostId(text),
            Raw::Signed(n) => PostId(n.to_string()),
            Raw::Unsigned(n) => PostId(n.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
    #[serde(other)]
    Unknown,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
            Sentiment::Unknown => "unknown",
        }
    }
}

/// Argumentative relation of a post to its parent. `None` is reserved for the
/// root post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    Attack,
    Support,
    Neutral,
    #[default]
    None,
    #[serde(other)]
    Unknown,
}

impl Stance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stance::Attack => "attack",
            Stance::Support => "support",
            Stance::Neutral => "neutral",
            Stance::None => "none",
            Stance::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Engagement {
    #[serde(default, rename = "like_count")]
    pub likes: u64,
    #[serde(default, rename = "retweet_count")]
    pub retweets: u64,
    #[serde(default, rename = "reply_count")]
    pub replies: u64,
    #[serde(default, rename = "quote_count")]
    pub quotes: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "WireNode")]
pub struct TreeNode {
    pub id: PostId,
    pub text: String,
    pub sentiment: Sentiment,
    pub stance: Stance,
    pub acceptability: Option<f64>,
    pub engagement: Engagement,
    pub children: Vec<TreeNode>,
}

// Reply chains can be arbitrarily deep, so every traversal below keeps its
// own stack instead of recursing.
impl TreeNode {
    /// Depth-first search in server order.
    pub fn find(&self, id: &PostId) -> Option<&TreeNode> {
        let mut found = None;
        self.walk_until(&mut |node| {
            if &node.id == id {
                found = Some(node);
                true
            } else {
                false
            }
        });
        found
    }

    pub fn is_argument(&self) -> bool {
        self.acceptability.is_some()
    }

    /// Number of nodes below this one.
    pub fn descendant_count(&self) -> usize {
        let mut count = 0usize;
        self.walk(&mut |_| count += 1);
        count - 1
    }

    /// Pre-order visit in server order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a TreeNode)) {
        self.walk_until(&mut |node| {
            visit(node);
            false
        });
    }

    fn walk_until<'a>(&'a self, visit: &mut impl FnMut(&'a TreeNode) -> bool) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if visit(node) {
                return;
            }
            stack.extend(node.children.iter().rev());
        }
    }
}

impl Drop for TreeNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

#[derive(Deserialize)]
struct WireNode {
    #[serde(default)]
    name: Option<PostId>,
    #[serde(default)]
    attributes: WireAttributes,
    #[serde(default)]
    children: Vec<TreeNode>,
}

#[derive(Deserialize, Default)]
struct WireAttributes {
    #[serde(default)]
    id: Option<PostId>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    sentiment: Sentiment,
    #[serde(default)]
    argumentative_type: Stance,
    #[serde(default)]
    acceptability: Option<f64>,
    #[serde(default)]
    public_metrics: Option<Engagement>,
    #[serde(flatten)]
    engagement: Engagement,
}

impl From<WireNode> for TreeNode {
    fn from(wire: WireNode) -> Self {
        let WireNode {
            name,
            attributes,
            children,
        } = wire;
        let id = attributes
            .id
            .or(name)
            .unwrap_or_else(|| PostId::new(String::new()));
        TreeNode {
            id,
            text: attributes.text,
            sentiment: attributes.sentiment,
            stance: attributes.argumentative_type,
            acceptability: attributes.acceptability,
            engagement: attributes.public_metrics.unwrap_or(attributes.engagement),
            children,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TreeMetrics {
    #[serde(default)]
    pub general_sentiment: Sentiment,
    #[serde(default, rename = "root_tweet_sentiment")]
    pub root_sentiment: Sentiment,
    #[serde(default)]
    pub sentiment_towards_root: Sentiment,
    #[serde(default, rename = "root_tweet_argument_strength")]
    pub root_argument_strength: Option<f64>,
    #[serde(default, rename = "strongest_argument_id")]
    pub strongest_argument: Option<PostId>,
}

/// The unit returned by a successful fetch.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "WireResult")]
pub struct TreeResult {
    pub root: Option<TreeNode>,
    pub metrics: TreeMetrics,
}

#[derive(Deserialize)]
struct WireResult {
    #[serde(default)]
    tweet_tree: Option<TreeNode>,
    #[serde(default)]
    metrics: TreeMetrics,
}

impl From<WireResult> for TreeResult {
    fn from(wire: WireResult) -> Self {
        let WireResult {
            mut tweet_tree,
            metrics,
        } = wire;
        {
            let mut stack: Vec<&mut TreeNode> = tweet_tree.iter_mut().collect();
            let mut unnamed = 0usize;
            while let Some(node) = stack.pop() {
                if node.id.as_str().is_empty() {
                    unnamed += 1;
                    node.id = PostId::synthetic(unnamed);
                }
                stack.extend(node.children.iter_mut().rev());
            }
        }
        TreeResult {
            root: tweet_tree,
            metrics,
        }
    }
}

/// Envelope the analysis backend wraps every result in.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisResponse {
    pub response: TreeResult,
}

/// Decodes an analysis envelope. Every reply level nests two JSON levels, so
/// serde_json's recursion limit is lifted and the stack grows on demand.
pub fn decode_response(body: &str) -> Result<TreeResult, serde_json::Error> {
    let mut json = serde_json::Deserializer::from_str(body);
    json.disable_recursion_limit();
    let envelope = AnalysisResponse::deserialize(serde_stacker::Deserializer::new(&mut json))?;
    json.end()?;
    Ok(envelope.response)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataIntegrityError {
    #[error("analysis result has no root post")]
    MissingRoot,
    #[error("strongest argument {0} is not part of the tree")]
    UnresolvedStrongestArgument(PostId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMetrics<'a> {
    pub general_sentiment: Sentiment,
    pub root_sentiment: Sentiment,
    pub sentiment_towards_root: Sentiment,
    pub root_argument_strength: Option<f64>,
    pub strongest_argument: Option<&'a TreeNode>,
    pub issues: Vec<DataIntegrityError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeStats {
    pub posts: usize,
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
    pub attacks: usize,
    pub supports: usize,
    pub arguments: usize,
}

impl TreeResult {
    pub fn find(&self, id: &PostId) -> Option<&TreeNode> {
        self.root.as_ref().and_then(|root| root.find(id))
    }

    pub fn integrity_issues(&self) -> Vec<DataIntegrityError> {
        let Some(root) = self.root.as_ref() else {
            return vec![DataIntegrityError::MissingRoot];
        };
        match &self.metrics.strongest_argument {
            Some(id) if root.find(id).is_none() => {
                vec![DataIntegrityError::UnresolvedStrongestArgument(id.clone())]
            }
            _ => Vec::new(),
        }
    }

    /// Metrics with the strongest-argument reference resolved against the
    /// tree. Unresolvable references are dropped and reported in `issues`.
    pub fn resolved_metrics(&self) -> ResolvedMetrics<'_> {
        let strongest_argument = self
            .metrics
            .strongest_argument
            .as_ref()
            .and_then(|id| self.find(id));
        ResolvedMetrics {
            general_sentiment: self.metrics.general_sentiment,
            root_sentiment: self.metrics.root_sentiment,
            sentiment_towards_root: self.metrics.sentiment_towards_root,
            root_argument_strength: self.metrics.root_argument_strength,
            strongest_argument,
            issues: self.integrity_issues(),
        }
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        if let Some(root) = self.root.as_ref() {
            root.walk(&mut |node| {
                stats.posts += 1;
                match node.sentiment {
                    Sentiment::Positive => stats.positive += 1,
                    Sentiment::Negative => stats.negative += 1,
                    Sentiment::Neutral | Sentiment::Unknown => stats.neutral += 1,
                }
                match node.stance {
                    Stance::Attack => stats.attacks += 1,
                    Stance::Support => stats.supports += 1,
                    _ => {}
                }
                if node.is_argument() {
                    stats.arguments += 1;
                }
            });
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_NODES: &str = r#"{
        "response": {
            "tweet_tree": {
                "name": 123,
                "attributes": {
                    "id": "123",
                    "text": "root post",
                    "sentiment": "positive",
                    "argumentative_type": "none",
                    "acceptability": 0.72,
                    "public_metrics": {"like_count": 10, "retweet_count": 2, "reply_count": 1, "quote_count": 0}
                },
                "children": [{
                    "name": "456",
                    "attributes": {
                        "text": "disagree",
                        "sentiment": "negative",
                        "argumentative_type": "attack",
                        "like_count": 3
                    }
                }]
            },
            "metrics": {
                "general_sentiment": "negative",
                "root_tweet_sentiment": "positive",
                "sentiment_towards_root": "negative",
                "root_tweet_argument_strength": 0.72,
                "strongest_argument_id": 456
            }
        }
    }"#;

    fn decode() -> TreeResult {
        serde_json::from_str::<AnalysisResponse>(TWO_NODES)
            .unwrap()
            .response
    }

    #[test]
    fn decodes_backend_envelope() {
        let result = decode();
        let root = result.root.as_ref().unwrap();
        assert_eq!(root.id.as_str(), "123");
        assert_eq!(root.engagement.likes, 10);
        assert_eq!(root.acceptability, Some(0.72));
        let child = &root.children[0];
        assert_eq!(child.id.as_str(), "456");
        assert_eq!(child.stance, Stance::Attack);
        assert_eq!(child.engagement.likes, 3);
        assert!(!child.is_argument());
        assert_eq!(result.metrics.strongest_argument, Some(PostId::new("456")));
    }

    #[test]
    fn unknown_labels_decode_softly() {
        let node: TreeNode = serde_json::from_str(
            r#"{"name": "1", "attributes": {"sentiment": "ecstatic", "argumentative_type": "rebuttal"}}"#,
        )
        .unwrap();
        assert_eq!(node.sentiment, Sentiment::Unknown);
        assert_eq!(node.stance, Stance::Unknown);
        assert_eq!(node.id.as_str(), "1");
    }

    #[test]
    fn strongest_argument_resolves_against_tree() {
        let result = decode();
        let metrics = result.resolved_metrics();
        assert_eq!(
            metrics.strongest_argument.map(|node| node.text.as_str()),
            Some("disagree")
        );
        assert!(metrics.issues.is_empty());
    }

    #[test]
    fn dangling_strongest_argument_is_omitted() {
        let mut result = decode();
        result.metrics.strongest_argument = Some(PostId::new("missing"));
        let metrics = result.resolved_metrics();
        assert!(metrics.strongest_argument.is_none());
        assert_eq!(
            metrics.issues,
            vec![DataIntegrityError::UnresolvedStrongestArgument(
                PostId::new("missing")
            )]
        );
    }

    #[test]
    fn missing_root_is_reported() {
        let result: TreeResult =
            serde_json::from_str(r#"{"metrics": {"strongest_argument_id": "9"}}"#).unwrap();
        assert!(result.root.is_none());
        assert_eq!(result.integrity_issues(), vec![DataIntegrityError::MissingRoot]);
        assert!(result.resolved_metrics().strongest_argument.is_none());
        assert_eq!(result.stats().posts, 0);
    }

    fn reply_chain_json(depth: usize) -> String {
        let mut json = String::from(r#"{"response":{"tweet_tree":"#);
        for i in 0..depth {
            json.push_str(&format!(
                r#"{{"name":"{i}","attributes":{{"text":"reply {i}","sentiment":"negative","argumentative_type":"attack"}},"children":["#
            ));
        }
        for _ in 0..depth {
            json.push_str("]}");
        }
        json.push_str(r#","metrics":{"strongest_argument_id":"7"}}}"#);
        json
    }

    #[test]
    fn deep_reply_chains_decode() {
        let result = decode_response(&reply_chain_json(300)).unwrap();
        let root = result.root.as_ref().unwrap();
        assert_eq!(root.descendant_count(), 299);
        assert_eq!(
            result.find(&PostId::new("299")).map(|node| node.text.as_str()),
            Some("reply 299")
        );
        assert_eq!(result.stats().posts, 300);
        assert!(result.integrity_issues().is_empty());
    }

    #[test]
    fn very_deep_trees_drop_without_recursing() {
        let mut node = TreeNode {
            id: PostId::new("leaf"),
            text: String::new(),
            sentiment: Sentiment::Neutral,
            stance: Stance::Support,
            acceptability: None,
            engagement: Engagement::default(),
            children: Vec::new(),
        };
        for i in 0..200_000 {
            node = TreeNode {
                id: PostId::new(i.to_string()),
                text: String::new(),
                sentiment: Sentiment::Neutral,
                stance: Stance::Support,
                acceptability: None,
                engagement: Engagement::default(),
                children: vec![node],
            };
        }
        assert_eq!(node.descendant_count(), 200_000);
        assert!(node.find(&PostId::new("leaf")).is_some());
        drop(node);
    }

    #[test]
    fn posts_without_ids_get_distinct_placeholders() {
        let result = decode_response(
            r#"{"response": {"tweet_tree": {"name": "1", "attributes": {}, "children": [
                {"attributes": {"text": "first"}},
                {"attributes": {"text": "second"}}
            ]}}}"#,
        )
        .unwrap();
        let root = result.root.as_ref().unwrap();
        let first = &root.children[0].id;
        let second = &root.children[1].id;
        assert_ne!(first, second);
        assert!(first.is_synthetic() && second.is_synthetic());
        assert!(!root.id.is_synthetic());
        assert_eq!(result.find(second).map(|node| node.text.as_str()), Some("second"));

        let mut tree = crate::tree::ArgumentTree::new();
        tree.toggle(first);
        assert!(!tree.is_expanded(first));
        assert!(tree.is_expanded(second));
    }

    #[test]
    fn stats_count_every_post() {
        let stats = decode().stats();
        assert_eq!(stats.posts, 2);
        assert_eq!(stats.positive, 1);
        assert_eq!(stats.negative, 1);
        assert_eq!(stats.attacks, 1);
        assert_eq!(stats.arguments, 1);
    }
}
