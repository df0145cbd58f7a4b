#![no_main]

use agentdb::{ActionPattern, AgentDB, Config, EmbeddingDimension};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let mut fields = text.split('\u{0}');

    let mut pattern = ActionPattern::new(fields.next().unwrap_or_default());
    if let Some(selector) = fields.next() {
        pattern = pattern.with_selector(selector);
    }
    if let Some(value) = fields.next() {
        pattern = pattern.with_value(value);
    }
    if let Some(url) = fields.next() {
        pattern = pattern.with_url(url);
    }
    if let (Some(key), Some(tag)) = (fields.next(), fields.next()) {
        pattern = pattern.with_metadata(key, tag);
    }

    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_dimension(EmbeddingDimension::Custom(32));
    let mut db = AgentDB::open(dir.path(), config).unwrap();

    // Valid input is stored and counted; invalid input is rejected cleanly
    match db.store_action(pattern) {
        Ok(_) => assert_eq!(db.get_statistics().total_actions, 1),
        Err(e) => {
            assert!(e.is_validation());
            assert!(db.is_empty());
        }
    }
});
