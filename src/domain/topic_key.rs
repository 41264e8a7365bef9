//! Hierarchical topic identifiers for change notifications.
//!
//! A [`TopicKey`] is an ordered list of path segments describing *what*
//! changed: `[]` is the root (everything), `["spool"]` covers every spool
//! and `["spool", "5"]` covers spool 5 only. A key is an ancestor of every
//! key that starts with the same segments, which is the rule the
//! [`super::SubscriberRegistry`] uses to fan events out.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::inventory::EntityKind;

/// Immutable, hierarchical topic identifier.
///
/// Serialized as a JSON array of strings (`["spool", "5"]`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicKey(Vec<String>);

impl TopicKey {
    /// The root topic `[]`, an ancestor of every other topic.
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Builds a topic from arbitrary segments.
    #[must_use]
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Topic covering every entity of the given kind (`["spool"]`).
    #[must_use]
    pub fn for_kind(kind: EntityKind) -> Self {
        Self(vec![kind.as_str().to_string()])
    }

    /// Topic covering a single entity (`["spool", "5"]`).
    #[must_use]
    pub fn for_entity(kind: EntityKind, id: u64) -> Self {
        Self(vec![kind.as_str().to_string(), id.to_string()])
    }

    /// Derives the topic for a request path's optional parameters.
    ///
    /// No kind yields the root, a kind alone yields `[kind]` and a kind
    /// with an id yields `[kind, id]`. An id without a kind is ignored.
    #[must_use]
    pub fn from_path(kind: Option<EntityKind>, id: Option<u64>) -> Self {
        match (kind, id) {
            (Some(kind), Some(id)) => Self::for_entity(kind, id),
            (Some(kind), None) => Self::for_kind(kind),
            (None, _) => Self::root(),
        }
    }

    /// Returns a new topic with `segment` appended.
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// Returns the path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments (0 for the root).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for the root topic.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if `self` is `other` or one of its ancestors.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Iterates over every prefix of this topic, from the root up to and
    /// including the topic itself.
    pub fn prefixes(&self) -> impl Iterator<Item = &[String]> + '_ {
        (0..=self.0.len()).filter_map(move |len| self.0.get(..len))
    }
}

impl Borrow<[String]> for TopicKey {
    fn borrow(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0.join("/"))
    }
}

impl<S: Into<String>> FromIterator<S> for TopicKey {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}
