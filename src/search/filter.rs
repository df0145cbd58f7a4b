//! Post-filters for similarity search.
//!
//! [`SearchOptions`] filters are applied after the HNSW index returns
//! candidates, so the store over-fetches and refetches to keep result counts
//! close to `k` when filters are selective.

use crate::pattern::ActionPattern;

/// Filter criteria for `find_similar`.
///
/// Fields left at their defaults do not filter.
///
/// # Example
///
/// ```rust
/// use agentdb::SearchOptions;
///
/// // Only successful actions recorded on signup pages
/// let options = SearchOptions {
///     success_only: true,
///     url_pattern: Some("/signup".into()),
///     ..SearchOptions::default()
/// };
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Drop patterns whose `success` is not `Some(true)`.
    pub success_only: bool,

    /// Drop patterns whose `url` does not contain this substring.
    ///
    /// Patterns without a URL never match.
    pub url_pattern: Option<String>,

    /// Drop patterns whose `action` differs from this label.
    pub action: Option<String>,
}

impl SearchOptions {
    /// Options that only keep successful patterns.
    pub fn successful() -> Self {
        Self {
            success_only: true,
            ..Self::default()
        }
    }

    /// Sets the URL substring filter.
    pub fn with_url_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.url_pattern = Some(pattern.into());
        self
    }

    /// Sets the exact action filter.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Returns `true` if no filter is set.
    pub fn is_unfiltered(&self) -> bool {
        !self.success_only && self.url_pattern.is_none() && self.action.is_none()
    }

    /// Returns `true` if the given pattern passes all filter criteria.
    pub fn matches(&self, pattern: &ActionPattern) -> bool {
        if self.success_only && !pattern.is_success() {
            return false;
        }

        if let Some(ref needle) = self.url_pattern {
            match pattern.url {
                Some(ref url) if url.contains(needle.as_str()) => {}
                _ => return false,
            }
        }

        if let Some(ref action) = self.action {
            if pattern.action != *action {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup_fill() -> ActionPattern {
        ActionPattern::new("fill_form")
            .with_selector("input[name=email]")
            .with_url("https://x.com/signup")
            .with_success(true)
    }

    #[test]
    fn test_default_matches_everything() {
        let options = SearchOptions::default();
        assert!(options.is_unfiltered());
        assert!(options.matches(&signup_fill()));
        assert!(options.matches(&ActionPattern::new("click")));
    }

    #[test]
    fn test_success_only() {
        let options = SearchOptions::successful();
        assert!(options.matches(&signup_fill()));
        assert!(!options.matches(&signup_fill().with_success(false)));

        // Unknown outcome does not count as success
        assert!(!options.matches(&ActionPattern::new("click")));
    }

    #[test]
    fn test_url_pattern() {
        let options = SearchOptions::default().with_url_pattern("x.com");
        assert!(options.matches(&signup_fill()));
        assert!(!options.matches(&signup_fill().with_url("https://y.com/register")));
        assert!(!options.matches(&ActionPattern::new("click")));
    }

    #[test]
    fn test_empty_url_pattern_matches_any_url() {
        let options = SearchOptions::default().with_url_pattern("");
        assert!(options.matches(&signup_fill()));
        assert!(!options.matches(&ActionPattern::new("click")));
    }

    #[test]
    fn test_action_filter() {
        let options = SearchOptions::default().with_action("fill_form");
        assert!(options.matches(&signup_fill()));
        assert!(!options.matches(&ActionPattern::new("click")));
    }

    #[test]
    fn test_combined_filters() {
        let options = SearchOptions::successful()
            .with_url_pattern("/signup")
            .with_action("fill_form");
        assert!(options.matches(&signup_fill()));
        assert!(!options.matches(&signup_fill().with_success(false)));
    }
}
