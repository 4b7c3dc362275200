//! Hierarchical policy trees and consumption queries.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::labels::{Label, Labels};

/// A node in the policy tree. The node's name is its key in the parent's
/// `children` map; the root has no name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyNode {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<PolicyRule>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, PolicyNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyRule {
    /// Who may consume endpoints matching `coverage`.
    Consumers {
        #[serde(default)]
        coverage: Vec<Label>,
        allow: Vec<AllowRule>,
    },
    /// Labels a consumer must carry to reach endpoints matching `coverage`.
    Requires {
        #[serde(default)]
        coverage: Vec<Label>,
        requires: Vec<Label>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllowRule {
    #[serde(default)]
    pub action: ConsumableAction,
    pub label: Label,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumableAction {
    #[default]
    Accept,
    Deny,
}

/// Consumer and provider label sets to evaluate against the tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchContext {
    #[serde(default)]
    pub from: Labels,
    #[serde(default)]
    pub to: Labels,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allowed,
    Denied,
    Undecided,
}

impl PolicyNode {
    /// This node with its children stripped.
    pub fn without_children(&self) -> PolicyNode {
        PolicyNode {
            rules: self.rules.clone(),
            children: BTreeMap::new(),
        }
    }

    /// The descendant addressed by `path`.
    pub fn lookup(&self, path: &PolicyPath) -> Option<&PolicyNode> {
        path.segments()
            .iter()
            .try_fold(self, |node, seg| node.children.get(seg))
    }

    /// Replace (or create) the subtree at `path`, creating empty intermediate
    /// nodes as needed.
    pub fn graft(&mut self, path: &PolicyPath, node: PolicyNode) {
        let (leaf, parents) = path.split_last();
        let mut cursor = self;
        for seg in parents {
            cursor = cursor.children.entry(seg.clone()).or_default();
        }
        cursor.children.insert(leaf.to_string(), node);
    }

    /// Remove the subtree at `path`, returning it if it existed.
    pub fn prune(&mut self, path: &PolicyPath) -> Option<PolicyNode> {
        let (leaf, parents) = path.split_last();
        let mut cursor = self;
        for seg in parents {
            cursor = cursor.children.get_mut(seg)?;
        }
        cursor.children.remove(leaf)
    }

    /// This node and every descendant, breadth-first.
    pub fn walk(&self) -> Vec<&PolicyNode> {
        let mut out = vec![self];
        let mut i = 0;
        while i < out.len() {
            let node: &PolicyNode = out[i];
            out.extend(node.children.values());
            i += 1;
        }
        out
    }

    /// First child name that cannot be addressed by a path segment.
    pub fn invalid_child_name(&self) -> Option<&str> {
        for (name, child) in &self.children {
            if name.is_empty() || name.contains('/') {
                return Some(name.as_str());
            }
            if let Some(bad) = child.invalid_child_name() {
                return Some(bad);
            }
        }
        None
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyPathError {
    #[error("policy path is empty")]
    Empty,
    #[error("policy path '{0}' contains an empty segment")]
    EmptySegment(String),
}

/// Root-relative, slash-delimited address of a policy node.
///
/// Leading and trailing slashes are ignored, so `/a/b/` and `a/b` name the
/// same node. Always holds at least one segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolicyPath {
    segments: Vec<String>,
}

impl PolicyPath {
    pub fn parse(raw: &str) -> Result<Self, PolicyPathError> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Err(PolicyPathError::Empty);
        }
        let segments: Vec<String> = trimmed.split('/').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(PolicyPathError::EmptySegment(raw.to_string()));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    fn split_last(&self) -> (&str, &[String]) {
        // Parsing guarantees at least one segment.
        match self.segments.split_last() {
            Some((leaf, parents)) => (leaf.as_str(), parents),
            None => ("", &self.segments[..]),
        }
    }
}

impl FromStr for PolicyPath {
    type Err = PolicyPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PolicyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}
