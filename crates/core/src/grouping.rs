//! Grouping trees and their flattening into index tuples.
//!
//! Summary and matrix payloads describe their row (`groupingsDown`) and
//! column (`groupingsAcross`) headers as nested trees. The parsers need one
//! label tuple per data bucket, in the same order the buckets appear in the
//! fact map.

use serde::{Deserialize, Serialize};

/// One node of a grouping tree as returned in a report payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingNode {
    /// Fact-map path of this node, e.g. `"0_1"`.
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub groupings: Vec<GroupingNode>,
}

impl GroupingNode {
    pub fn new(label: impl Into<String>, groupings: Vec<GroupingNode>) -> Self {
        GroupingNode {
            key: String::new(),
            label: label.into(),
            groupings,
        }
    }

    pub fn leaf(label: impl Into<String>) -> Self {
        GroupingNode::new(label, Vec::new())
    }
}

/// Wrapper matching `{"groupings": [...]}` in the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupingTree {
    #[serde(default)]
    pub groupings: Vec<GroupingNode>,
}

/// Labels present at each depth of `nodes`, shallowest first.
///
/// Siblings are visited in order and each level lists every label found at
/// that depth, so a label repeats when several parents share a child label.
pub fn levels(nodes: &[GroupingNode]) -> Vec<Vec<String>> {
    let mut out = Vec::new();
    collect_levels(nodes.iter().collect(), &mut out);
    out
}

fn collect_levels(nodes: Vec<&GroupingNode>, out: &mut Vec<Vec<String>>) {
    if nodes.is_empty() {
        return;
    }
    out.push(nodes.iter().map(|n| n.label.clone()).collect());
    let nested: Vec<&GroupingNode> = nodes.iter().flat_map(|n| n.groupings.iter()).collect();
    collect_levels(nested, out);
}

/// Flatten a list of grouping trees into label tuples.
///
/// Each top-level node contributes the cartesian product of its own
/// per-depth label lists; results are concatenated in input order. A tuple
/// is as long as its subtree is deep.
pub fn flatten(nodes: &[GroupingNode]) -> Vec<Vec<String>> {
    nodes
        .iter()
        .flat_map(|node| cartesian_product(&levels(std::slice::from_ref(node))))
        .collect()
}

fn cartesian_product(lists: &[Vec<String>]) -> Vec<Vec<String>> {
    lists.iter().fold(vec![Vec::new()], |acc, list| {
        acc.iter()
            .flat_map(|prefix| {
                list.iter().map(move |label| {
                    let mut tuple = prefix.clone();
                    tuple.push(label.clone());
                    tuple
                })
            })
            .collect()
    })
}
