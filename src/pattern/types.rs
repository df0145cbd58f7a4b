//! Type definitions for action patterns.
//!
//! An **action pattern** is the unit of learning in AgentDB: a structured
//! record of one automation step (a form fill, a click, a CAPTCHA solve)
//! together with its outcome. Patterns are immutable once stored; repeating
//! an action stores a new pattern, and success rates emerge from the
//! accumulated history.
//!
//! # Type Hierarchy
//!
//! ```text
//! ActionPattern (caller-supplied record)
//!     ↓ AgentDB::store_action()
//! StoredEntry (id + pattern + embedding)
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Embedding, PatternId, Timestamp};

// ============================================================================
// ActionPattern: caller-supplied record
// ============================================================================

/// A structured record of one observed automation action.
///
/// Only `action` is required. Optional fields that are `None` contribute
/// nothing to the embedding.
///
/// # Example
///
/// ```rust
/// use agentdb::ActionPattern;
///
/// let pattern = ActionPattern::new("fill_form")
///     .with_selector("input[name=email]")
///     .with_url("https://example.com/signup")
///     .with_success(true)
///     .with_metadata("service", "example");
///
/// assert_eq!(pattern.action, "fill_form");
/// assert_eq!(pattern.metadata_value("service"), Some("example"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionPattern {
    /// Short label for what was done, e.g. `"click"` or `"solve_captcha"`.
    pub action: String,

    /// Target element in the automation driver's query syntax (opaque here).
    #[serde(default)]
    pub selector: Option<String>,

    /// Payload associated with the action, e.g. the text entered.
    #[serde(default)]
    pub value: Option<String>,

    /// Page the action occurred on.
    #[serde(default)]
    pub url: Option<String>,

    /// Outcome of the action. `None` means not evaluated.
    #[serde(default)]
    pub success: Option<bool>,

    /// Free-form string tags, e.g. `{service: "github", fieldType: "email"}`.
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, String>>,

    /// When the action happened. Assigned by the store when absent.
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

impl ActionPattern {
    /// Creates a pattern with the given action label and no other fields.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }

    /// Sets the target selector.
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Sets the value payload.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Sets the page URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the outcome.
    pub fn with_success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    /// Adds one metadata tag, creating the map if needed.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Sets an explicit timestamp.
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Returns `true` only when the outcome is known to be successful.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.success == Some(true)
    }

    /// Looks up a metadata tag.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(key))
            .map(String::as_str)
    }

    /// Returns `true` if every `(key, value)` in `filter` is present with an
    /// equal value in this pattern's metadata.
    ///
    /// Patterns without metadata never match a non-empty filter; an empty
    /// filter matches everything.
    pub fn matches_metadata(&self, filter: &BTreeMap<String, String>) -> bool {
        if filter.is_empty() {
            return true;
        }
        match &self.metadata {
            Some(metadata) => filter
                .iter()
                .all(|(key, value)| metadata.get(key) == Some(value)),
            None => false,
        }
    }
}

// ============================================================================
// StoredEntry: pattern as held by the store
// ============================================================================

/// An [`ActionPattern`] as held by the store.
///
/// The `embedding` is computed once at write time and is a pure function of
/// the pattern's `action`, `selector`, `value` and `url`.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredEntry {
    /// Store-assigned identifier.
    pub id: PatternId,

    /// The recorded pattern, with `timestamp` always set.
    pub pattern: ActionPattern,

    /// Feature-hashed embedding of the pattern.
    pub embedding: Embedding,
}
