//! Polymorphic tree nodes for browsing guides and benchmarks.
//!
//! The set of node kinds is closed (groups and rules), so nodes are a tagged
//! enum with a `kind` discriminator rather than trait objects. Children of a
//! group live in one heterogeneous list ordered by title.

use crate::entities::{DsGroup, DsRule, Group, Rule, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Group(GroupNode),
    Rule(RuleNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupNode {
    pub id: String,
    pub parent_id: String,
    pub title: String,
    pub level: i64,
    pub group_count: i64,
    pub rule_count: i64,
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleNode {
    pub id: String,
    /// The rule's `group_id`.
    pub parent_id: String,
    pub title: String,
    pub severity: Severity,
    pub level: i64,
}

impl TreeNode {
    pub fn id(&self) -> &str {
        match self {
            TreeNode::Group(g) => &g.id,
            TreeNode::Rule(r) => &r.id,
        }
    }

    pub fn parent_id(&self) -> &str {
        match self {
            TreeNode::Group(g) => &g.parent_id,
            TreeNode::Rule(r) => &r.parent_id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            TreeNode::Group(g) => &g.title,
            TreeNode::Rule(r) => &r.title,
        }
    }

    pub fn children(&self) -> &[TreeNode] {
        match self {
            TreeNode::Group(g) => &g.children,
            TreeNode::Rule(_) => &[],
        }
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn size(&self) -> usize {
        1 + self.children().iter().map(TreeNode::size).sum::<usize>()
    }
}

/// A node before linking: same payload, no children yet.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatNode(pub TreeNode);

impl From<&Group> for FlatNode {
    fn from(g: &Group) -> Self {
        FlatNode(TreeNode::Group(GroupNode {
            id: g.id.clone(),
            parent_id: g.parent_id.clone(),
            title: g.title.clone(),
            level: g.level,
            group_count: g.group_count,
            rule_count: g.rule_count,
            children: Vec::new(),
        }))
    }
}

impl From<&Rule> for FlatNode {
    fn from(r: &Rule) -> Self {
        FlatNode(TreeNode::Rule(RuleNode {
            id: r.id.clone(),
            parent_id: r.group_id.clone(),
            title: r.title.clone(),
            severity: r.severity,
            level: r.level,
        }))
    }
}

impl From<&DsGroup> for FlatNode {
    fn from(g: &DsGroup) -> Self {
        FlatNode(TreeNode::Group(GroupNode {
            id: g.id.clone(),
            parent_id: g.parent_id.clone(),
            title: g.title.clone(),
            level: g.level,
            group_count: g.group_count,
            rule_count: g.rule_count,
            children: Vec::new(),
        }))
    }
}

impl From<&DsRule> for FlatNode {
    fn from(r: &DsRule) -> Self {
        FlatNode(TreeNode::Rule(RuleNode {
            id: r.id.clone(),
            parent_id: r.group_id.clone(),
            title: r.title.clone(),
            severity: r.severity,
            level: 0,
        }))
    }
}

fn sort_by_title(nodes: &mut [TreeNode]) {
    nodes.sort_by(|a, b| a.title().cmp(b.title()).then_with(|| a.id().cmp(b.id())));
}

/// Links flat nodes into a forest.
///
/// A node with an empty `parent_id` is a root; otherwise it attaches to the
/// group whose id equals `parent_id`. Nodes whose parent is missing (or is a
/// rule) stay roots, which covers sources that point at the benchmark node
/// above the top-level groups. Roots and children are ordered by title, then
/// id, so the result does not depend on input order.
pub fn build_forest(nodes: Vec<FlatNode>) -> Vec<TreeNode> {
    let mut nodes: Vec<TreeNode> = nodes.into_iter().map(|n| n.0).collect();

    let mut group_index: HashMap<String, usize> = HashMap::new();
    for (idx, node) in nodes.iter().enumerate() {
        if let TreeNode::Group(g) = node {
            group_index.entry(g.id.clone()).or_insert(idx);
        }
    }

    // parent index for each node, None for roots
    let parents: Vec<Option<usize>> = nodes
        .iter()
        .enumerate()
        .map(|(idx, node)| {
            let parent_id = node.parent_id();
            if parent_id.is_empty() {
                return None;
            }
            group_index
                .get(parent_id)
                .copied()
                .filter(|&p| p != idx)
        })
        .collect();

    // Break cycles: a node is a root if walking up never reaches a root.
    let n = nodes.len();
    let mut anchored = vec![None::<bool>; n];
    for start in 0..n {
        let mut path = Vec::new();
        let mut cur = start;
        let verdict = loop {
            if let Some(v) = anchored[cur] {
                break v;
            }
            if path.contains(&cur) || path.len() > n {
                break false;
            }
            path.push(cur);
            match parents[cur] {
                None => break true,
                Some(p) => cur = p,
            }
        };
        for idx in path {
            anchored[idx] = Some(verdict);
        }
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut roots = Vec::new();
    for idx in 0..n {
        match parents[idx] {
            Some(p) if anchored[idx] == Some(true) => children[p].push(idx),
            _ => roots.push(idx),
        }
    }

    let mut slots: Vec<Option<TreeNode>> = nodes.drain(..).map(Some).collect();

    fn assemble(
        idx: usize,
        slots: &mut [Option<TreeNode>],
        children: &[Vec<usize>],
    ) -> Option<TreeNode> {
        let mut node = slots[idx].take()?;
        if let TreeNode::Group(g) = &mut node {
            for &child in &children[idx] {
                if let Some(c) = assemble(child, slots, children) {
                    g.children.push(c);
                }
            }
            sort_by_title(&mut g.children);
        }
        Some(node)
    }

    let mut forest: Vec<TreeNode> = roots
        .into_iter()
        .filter_map(|idx| assemble(idx, &mut slots, &children))
        .collect();
    sort_by_title(&mut forest);
    forest
}
