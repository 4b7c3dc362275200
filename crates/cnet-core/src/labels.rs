//! Security labels and the identities assigned to them.
//!
//! A [`Labels`] set is content-addressed: its canonical form is the key-sorted
//! sequence of length-prefixed `source`, `key` and `value` fields, and the
//! SHA-256 of that form is the set's digest. The daemon keys identities by this digest, so two sets
//! with the same content always resolve to the same [`Identity`].

use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Numeric security identity assigned to one distinct label set.
pub type Identity = u32;

/// Source tag applied to labels submitted without one.
pub const DEFAULT_LABEL_SOURCE: &str = "cilium";

fn default_source() -> String {
    DEFAULT_LABEL_SOURCE.to_string()
}

/// A single key/value label tagged with the source that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default = "default_source")]
    pub source: String,
}

impl Label {
    /// Label from the default source.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            source: default_source(),
        }
    }

    pub fn with_source(
        key: impl Into<String>,
        value: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            source: source.into(),
        }
    }
}

/// An unordered set of labels, at most one per key.
///
/// On the wire this is a JSON object keyed by label key. Each entry is either
/// a full label record or a bare string, which is shorthand for a label with
/// that value from [`DEFAULT_LABEL_SOURCE`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Labels(BTreeMap<String, Label>);

#[derive(Deserialize)]
#[serde(untagged)]
enum LabelEntry {
    Record(Label),
    Value(String),
}

impl<'de> Deserialize<'de> for Labels {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, LabelEntry>::deserialize(deserializer)?;
        let mut labels = BTreeMap::new();
        for (key, entry) in raw {
            if key.is_empty() {
                return Err(de::Error::custom("label key must not be empty"));
            }
            let label = match entry {
                LabelEntry::Value(value) => Label::new(key.clone(), value),
                LabelEntry::Record(mut label) => {
                    if label.key.is_empty() {
                        label.key = key.clone();
                    } else if label.key != key {
                        return Err(de::Error::custom(format!(
                            "label key '{}' does not match its entry '{key}'",
                            label.key
                        )));
                    }
                    label
                }
            };
            labels.insert(key, label);
        }
        Ok(Labels(labels))
    }
}

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a label, replacing any label with the same key.
    pub fn insert(&mut self, label: Label) -> Option<Label> {
        self.0.insert(label.key.clone(), label)
    }

    pub fn get(&self, key: &str) -> Option<&Label> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Labels in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.0.values()
    }

    /// True if an identical label (key, value and source) is present.
    pub fn contains(&self, label: &Label) -> bool {
        self.0.get(&label.key) == Some(label)
    }

    /// True if every label in `labels` is present in this set.
    pub fn contains_all<'a>(&self, labels: impl IntoIterator<Item = &'a Label>) -> bool {
        labels.into_iter().all(|l| self.contains(l))
    }

    /// Canonical byte form used for digesting.
    ///
    /// Each field is written as `{byte length}:{bytes}`, so delimiters inside
    /// keys or values cannot make two different sets encode the same.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        for label in self.0.values() {
            for field in [&label.source, &label.key, &label.value] {
                out.push_str(&field.len().to_string());
                out.push(':');
                out.push_str(field);
            }
        }
        out
    }

    /// Lowercase hex SHA-256 of the canonical form.
    pub fn sha256sum(&self) -> String {
        let digest = Sha256::digest(self.canonical().as_bytes());
        hex::encode(digest)
    }
}

impl FromIterator<Label> for Labels {
    fn from_iter<I: IntoIterator<Item = Label>>(iter: I) -> Self {
        let mut labels = Labels::new();
        for label in iter {
            labels.insert(label);
        }
        labels
    }
}

/// An allocated identity together with the label set it stands for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityIdentity {
    pub id: Identity,
    pub labels: Labels,
    pub sha256sum: String,
}

impl SecurityIdentity {
    pub fn new(id: Identity, labels: Labels) -> Self {
        let sha256sum = labels.sha256sum();
        Self {
            id,
            labels,
            sha256sum,
        }
    }
}
