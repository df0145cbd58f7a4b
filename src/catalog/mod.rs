//! Pattern catalog: the source of truth for stored patterns.
//!
//! An ordered map from [`PatternId`] to [`StoredEntry`]. Ids are assigned in
//! increasing order, so key order is insertion order and [`PatternCatalog::all`]
//! iterates oldest first.
//!
//! Lookups other than by id are linear scans. Catalogs are expected to stay
//! in the thousands of entries.

use std::collections::BTreeMap;

use crate::pattern::{ActionPattern, StoredEntry};
use crate::types::PatternId;

/// Ordered catalog of stored patterns keyed by id.
#[derive(Clone, Debug, Default)]
pub struct PatternCatalog {
    entries: BTreeMap<PatternId, StoredEntry>,
}

impl PatternCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from loaded entries.
    pub fn from_entries(entries: impl IntoIterator<Item = StoredEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.id, e)).collect(),
        }
    }

    /// Inserts an entry under its id.
    ///
    /// Returns the previous entry if the id was already present. The store
    /// never reuses ids, so for entries written through `AgentDB` this is
    /// always `None`.
    pub fn put(&mut self, entry: StoredEntry) -> Option<StoredEntry> {
        self.entries.insert(entry.id, entry)
    }

    /// Looks up an entry by id.
    pub fn get(&self, id: PatternId) -> Option<&StoredEntry> {
        self.entries.get(&id)
    }

    /// Iterates all entries in id order.
    pub fn all(&self) -> impl Iterator<Item = &StoredEntry> + '_ {
        self.entries.values()
    }

    /// Iterates entries whose pattern satisfies `predicate`, in id order.
    pub fn filter<'a, F>(&'a self, mut predicate: F) -> impl Iterator<Item = &'a StoredEntry> + 'a
    where
        F: FnMut(&ActionPattern) -> bool + 'a,
    {
        self.entries.values().filter(move |e| predicate(&e.pattern))
    }

    /// Patterns whose metadata contains every `(key, value)` of `filter`.
    pub fn by_metadata(&self, filter: &BTreeMap<String, String>) -> Vec<ActionPattern> {
        self.filter(|p| p.matches_metadata(filter))
            .map(|e| e.pattern.clone())
            .collect()
    }

    /// First stored entry (smallest id).
    pub fn first(&self) -> Option<&StoredEntry> {
        self.entries.values().next()
    }

    /// Last stored entry (largest id).
    pub fn last(&self) -> Option<&StoredEntry> {
        self.entries.values().next_back()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u64, pattern: ActionPattern) -> StoredEntry {
        StoredEntry {
            id: PatternId::new(id),
            pattern,
            embedding: vec![1.0, 0.0],
        }
    }

    #[test]
    fn test_put_and_get() {
        let mut catalog = PatternCatalog::new();
        assert!(catalog.put(entry(0, ActionPattern::new("click"))).is_none());

        let got = catalog.get(PatternId::new(0)).unwrap();
        assert_eq!(got.pattern.action, "click");
        assert!(catalog.get(PatternId::new(1)).is_none());
    }

    #[test]
    fn test_all_is_in_id_order() {
        let mut catalog = PatternCatalog::new();
        catalog.put(entry(2, ActionPattern::new("c")));
        catalog.put(entry(0, ActionPattern::new("a")));
        catalog.put(entry(1, ActionPattern::new("b")));

        let actions: Vec<&str> = catalog.all().map(|e| e.pattern.action.as_str()).collect();
        assert_eq!(actions, vec!["a", "b", "c"]);
        assert_eq!(catalog.first().unwrap().id, PatternId::new(0));
        assert_eq!(catalog.last().unwrap().id, PatternId::new(2));
    }

    #[test]
    fn test_filter() {
        let mut catalog = PatternCatalog::new();
        catalog.put(entry(0, ActionPattern::new("click").with_success(true)));
        catalog.put(entry(1, ActionPattern::new("click").with_success(false)));
        catalog.put(entry(2, ActionPattern::new("click")));

        let ids: Vec<PatternId> = catalog.filter(|p| p.is_success()).map(|e| e.id).collect();
        assert_eq!(ids, vec![PatternId::new(0)]);
    }

    #[test]
    fn test_by_metadata() {
        let mut catalog = PatternCatalog::new();
        catalog.put(entry(
            0,
            ActionPattern::new("solve_captcha")
                .with_metadata("captchaType", "recaptcha")
                .with_metadata("service", "github"),
        ));
        catalog.put(entry(
            1,
            ActionPattern::new("solve_captcha").with_metadata("captchaType", "hcaptcha"),
        ));
        catalog.put(entry(2, ActionPattern::new("click")));

        let mut filter = BTreeMap::new();
        filter.insert("captchaType".to_string(), "recaptcha".to_string());
        let found = catalog.by_metadata(&filter);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].metadata_value("service"), Some("github"));

        filter.insert("service".to_string(), "gitlab".to_string());
        assert!(catalog.by_metadata(&filter).is_empty());

        // Empty filter matches everything, including entries without metadata
        assert_eq!(catalog.by_metadata(&BTreeMap::new()).len(), 3);
    }

    #[test]
    fn test_from_entries() {
        let catalog = PatternCatalog::from_entries(vec![
            entry(5, ActionPattern::new("x")),
            entry(3, ActionPattern::new("y")),
        ]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.first().unwrap().id, PatternId::new(3));
    }

    #[test]
    fn test_empty() {
        let catalog = PatternCatalog::new();
        assert!(catalog.is_empty());
        assert!(catalog.first().is_none());
        assert_eq!(catalog.all().count(), 0);
    }
}
