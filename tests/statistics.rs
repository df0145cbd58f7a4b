//! Integration tests for statistics, top patterns, success-rate learning
//! and metadata queries.

use std::collections::BTreeMap;

use agentdb::{ActionPattern, AgentDB, Config};
use tempfile::tempdir;

fn open_db() -> (AgentDB, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let db = AgentDB::open(dir.path(), Config::default()).unwrap();
    (db, dir)
}

fn filter(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ============================================================================
// Statistics
// ============================================================================

#[test]
fn test_empty_store_statistics() {
    let (db, _dir) = open_db();
    let stats = db.get_statistics();

    assert_eq!(stats.total_actions, 0);
    assert_eq!(stats.success_rate, 0.0);
    assert!(stats.action_types.is_empty());
    assert_eq!(stats.average_embedding_time_ms, 0.0);
    assert!(db.get_top_patterns(5).is_empty());
}

#[test]
fn test_statistics_track_writes() {
    let (mut db, _dir) = open_db();

    db.store_action(ActionPattern::new("click").with_success(true))
        .unwrap();
    db.store_action(ActionPattern::new("click").with_success(false))
        .unwrap();
    db.store_action(ActionPattern::new("navigate").with_success(true))
        .unwrap();
    // Unknown outcome counts toward the total but not as a success
    db.store_action(ActionPattern::new("extract")).unwrap();

    let stats = db.get_statistics();
    assert_eq!(stats.total_actions, 4);
    assert_eq!(stats.success_rate, 0.5);
    assert_eq!(stats.action_types.get("click"), Some(&2));
    assert_eq!(stats.action_types.get("navigate"), Some(&1));
    assert_eq!(stats.action_types.get("extract"), Some(&1));
    assert_eq!(
        stats.action_types.values().sum::<u64>(),
        stats.total_actions
    );
    assert!(stats.average_embedding_time_ms >= 0.0);
}

#[test]
fn test_rejected_writes_do_not_count() {
    let (mut db, _dir) = open_db();

    db.store_action(ActionPattern::new("click")).unwrap();
    assert!(db.store_action(ActionPattern::new("")).is_err());
    assert!(db
        .store_action(ActionPattern::new("x".repeat(10_000)))
        .is_err());

    assert_eq!(db.get_statistics().total_actions, 1);
}

#[test]
fn test_statistics_serialize_to_json() {
    let (mut db, _dir) = open_db();
    db.store_action(ActionPattern::new("click").with_success(true))
        .unwrap();

    let json = serde_json::to_value(db.get_statistics()).unwrap();
    assert_eq!(json["total_actions"], 1);
    assert_eq!(json["success_rate"], 1.0);
    assert_eq!(json["action_types"]["click"], 1);
}

// ============================================================================
// Top Patterns
// ============================================================================

#[test]
fn test_top_patterns_ordered_by_count() {
    let (mut db, _dir) = open_db();

    for _ in 0..3 {
        db.store_action(
            ActionPattern::new("click")
                .with_selector("#submit")
                .with_success(true),
        )
        .unwrap();
    }
    db.store_action(ActionPattern::new("click").with_selector("#cancel"))
        .unwrap();
    for success in [true, false] {
        db.store_action(
            ActionPattern::new("fill_form")
                .with_selector("#email")
                .with_success(success),
        )
        .unwrap();
    }

    let top = db.get_top_patterns(2);
    assert_eq!(top.len(), 2);

    assert_eq!(top[0].action, "click");
    assert_eq!(top[0].selector.as_deref(), Some("#submit"));
    assert_eq!(top[0].count, 3);
    assert_eq!(top[0].success_rate(), 1.0);

    assert_eq!(top[1].action, "fill_form");
    assert_eq!(top[1].count, 2);
    assert_eq!(top[1].success_count, 1);
    assert_eq!(top[1].success_rate(), 0.5);
}

#[test]
fn test_top_patterns_ties_keep_first_seen_order() {
    let (mut db, _dir) = open_db();

    db.store_action(ActionPattern::new("navigate")).unwrap();
    db.store_action(ActionPattern::new("click").with_selector("#a"))
        .unwrap();
    db.store_action(ActionPattern::new("extract").with_selector(".price"))
        .unwrap();

    let top = db.get_top_patterns(10);
    let actions: Vec<&str> = top.iter().map(|t| t.action.as_str()).collect();
    assert_eq!(actions, vec!["navigate", "click", "extract"]);
    assert!(top[0].selector.is_none());
}

#[test]
fn test_top_patterns_group_by_action_and_selector() {
    let (mut db, _dir) = open_db();

    db.store_action(ActionPattern::new("click").with_selector("#a"))
        .unwrap();
    db.store_action(ActionPattern::new("click").with_selector("#b"))
        .unwrap();
    db.store_action(ActionPattern::new("click")).unwrap();
    db.store_action(ActionPattern::new("click").with_selector("#a"))
        .unwrap();

    let top = db.get_top_patterns(10);
    assert_eq!(top.len(), 3);
    assert_eq!(top.iter().map(|t| t.count).sum::<u64>(), 4);
}

#[test]
fn test_top_patterns_zero() {
    let (mut db, _dir) = open_db();
    db.store_action(ActionPattern::new("click")).unwrap();
    assert!(db.get_top_patterns(0).is_empty());
}

// ============================================================================
// Success Rate Learning
// ============================================================================

#[test]
fn test_success_rate_for_action() {
    let (mut db, _dir) = open_db();

    for success in [true, true, false, true] {
        db.store_action(
            ActionPattern::new("solve_captcha")
                .with_metadata("captchaType", "recaptcha")
                .with_success(success),
        )
        .unwrap();
    }
    db.store_action(ActionPattern::new("click").with_success(false))
        .unwrap();

    assert_eq!(db.success_rate_for("solve_captcha"), Some(0.75));
    assert_eq!(db.success_rate_for("click"), Some(0.0));
    assert_eq!(db.success_rate_for("navigate"), None);
}

// ============================================================================
// Metadata Queries
// ============================================================================

#[test]
fn test_query_by_metadata_matches_all_pairs() {
    let (mut db, _dir) = open_db();

    db.store_action(
        ActionPattern::new("fill_form")
            .with_metadata("service", "github")
            .with_metadata("fieldType", "email"),
    )
    .unwrap();
    db.store_action(
        ActionPattern::new("fill_form")
            .with_metadata("service", "github")
            .with_metadata("fieldType", "password"),
    )
    .unwrap();
    db.store_action(ActionPattern::new("fill_form").with_metadata("service", "gitlab"))
        .unwrap();
    db.store_action(ActionPattern::new("click")).unwrap();

    let github = db.query_by_metadata(&filter(&[("service", "github")]));
    assert_eq!(github.len(), 2);

    let email = db.query_by_metadata(&filter(&[("service", "github"), ("fieldType", "email")]));
    assert_eq!(email.len(), 1);
    assert_eq!(email[0].metadata_value("fieldType"), Some("email"));

    let none = db.query_by_metadata(&filter(&[("service", "bitbucket")]));
    assert!(none.is_empty());
}

#[test]
fn test_query_by_metadata_empty_filter_returns_all_in_order() {
    let (mut db, _dir) = open_db();

    db.store_action(ActionPattern::new("navigate")).unwrap();
    db.store_action(ActionPattern::new("click").with_metadata("k", "v"))
        .unwrap();
    db.store_action(ActionPattern::new("extract")).unwrap();

    let all = db.query_by_metadata(&BTreeMap::new());
    let actions: Vec<&str> = all.iter().map(|p| p.action.as_str()).collect();
    assert_eq!(actions, vec!["navigate", "click", "extract"]);
}

#[test]
fn test_query_by_metadata_value_must_match_exactly() {
    let (mut db, _dir) = open_db();
    db.store_action(ActionPattern::new("click").with_metadata("service", "GitHub"))
        .unwrap();

    assert!(db
        .query_by_metadata(&filter(&[("service", "github")]))
        .is_empty());
}
