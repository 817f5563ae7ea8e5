use std::collections::HashMap;

use crate::analysis::{PostId, Sentiment, Stance, TreeNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeColor {
    Green,
    Red,
    Grey,
}

impl NodeColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeColor::Green => "green",
            NodeColor::Red => "red",
            NodeColor::Grey => "grey",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeClass {
    Attack,
    Support,
    Neutral,
}

impl EdgeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeClass::Attack => "attack",
            EdgeClass::Support => "support",
            EdgeClass::Neutral => "neutral",
        }
    }
}

pub fn color_for(sentiment: Sentiment) -> NodeColor {
    match sentiment {
        Sentiment::Positive => NodeColor::Green,
        Sentiment::Negative => NodeColor::Red,
        Sentiment::Neutral | Sentiment::Unknown => NodeColor::Grey,
    }
}

/// Class of the edge joining a child to its parent, taken from the child's
/// stance.
pub fn edge_class_for(stance: Stance) -> EdgeClass {
    match stance {
        Stance::Attack => EdgeClass::Attack,
        Stance::Support => EdgeClass::Support,
        Stance::Neutral | Stance::None | Stance::Unknown => EdgeClass::Neutral,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeUiState {
    pub expanded: bool,
}

impl Default for NodeUiState {
    fn default() -> Self {
        Self { expanded: true }
    }
}

/// One line of the rendered tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeRow<'a> {
    pub node: &'a TreeNode,
    pub depth: usize,
    pub color: NodeColor,
    /// `None` for the root, which has no parent edge.
    pub edge: Option<EdgeClass>,
    pub expanded: bool,
    pub hidden_descendants: usize,
    pub is_last_sibling: bool,
    /// For each ancestor level, whether a later sibling still follows. Used to
    /// draw continuation guides.
    pub guides: Vec<bool>,
}

impl TreeRow<'_> {
    pub fn has_children(&self) -> bool {
        !self.node.children.is_empty()
    }
}

/// Per-node expand/collapse state for the tree currently on screen.
#[derive(Debug, Clone, Default)]
pub struct ArgumentTree {
    nodes: HashMap<PostId, NodeUiState>,
}

impl ArgumentTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.nodes.clear();
    }

    pub fn is_expanded(&self, id: &PostId) -> bool {
        self.nodes.get(id).copied().unwrap_or_default().expanded
    }

    /// Flips the flag of exactly this node. Descendants keep their own flags,
    /// so re-expanding restores the nested layout.
    pub fn toggle(&mut self, id: &PostId) -> bool {
        let state = self.nodes.entry(id.clone()).or_default();
        state.expanded = !state.expanded;
        state.expanded
    }

    pub fn expand_all(&mut self) -> bool {
        let mut changed = false;
        for state in self.nodes.values_mut() {
            if !state.expanded {
                state.expanded = true;
                changed = true;
            }
        }
        changed
    }

    pub fn collapsed_count(&self) -> usize {
        self.nodes.values().filter(|state| !state.expanded).count()
    }

    /// Depth-first rows in server order, skipping every node below a
    /// collapsed ancestor.
    pub fn rows<'a>(&mut self, root: &'a TreeNode) -> Vec<TreeRow<'a>> {
        let mut rows = Vec::new();
        let mut guides: Vec<bool> = Vec::new();
        let mut stack = vec![Visit::Node {
            node: root,
            depth: 0,
            edge: None,
            is_last_sibling: true,
        }];

        while let Some(visit) = stack.pop() {
            let (node, depth, edge, is_last_sibling) = match visit {
                Visit::CloseGuide => {
                    guides.pop();
                    continue;
                }
                Visit::Node {
                    node,
                    depth,
                    edge,
                    is_last_sibling,
                } => (node, depth, edge, is_last_sibling),
            };

            let expanded = self.nodes.entry(node.id.clone()).or_default().expanded;
            let hidden_descendants = if expanded {
                0
            } else {
                node.descendant_count()
            };
            rows.push(TreeRow {
                node,
                depth,
                color: color_for(node.sentiment),
                edge,
                expanded,
                hidden_descendants,
                is_last_sibling,
                guides: guides.clone(),
            });
            if !expanded || node.children.is_empty() {
                continue;
            }

            if depth > 0 {
                guides.push(!is_last_sibling);
                stack.push(Visit::CloseGuide);
            }
            let count = node.children.len();
            for (index, child) in node.children.iter().enumerate().rev() {
                stack.push(Visit::Node {
                    node: child,
                    depth: depth + 1,
                    edge: Some(edge_class_for(child.stance)),
                    is_last_sibling: index + 1 == count,
                });
            }
        }
        rows
    }
}

enum Visit<'a> {
    Node {
        node: &'a TreeNode,
        depth: usize,
        edge: Option<EdgeClass>,
        is_last_sibling: bool,
    },
    CloseGuide,
}
