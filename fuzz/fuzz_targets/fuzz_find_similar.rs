#![no_main]

use agentdb::{ActionPattern, AgentDB, Config, EmbeddingDimension, SearchOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let k = data[0] as usize % 16;
    let success_only = data[1] & 1 == 1;
    let text = String::from_utf8_lossy(&data[2..]);
    let mut fields = text.split('\u{0}');

    let query = ActionPattern::new(fields.next().unwrap_or_default())
        .with_selector(fields.next().unwrap_or_default())
        .with_url(fields.next().unwrap_or_default());

    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_dimension(EmbeddingDimension::Custom(32));
    let mut db = AgentDB::open(dir.path(), config).unwrap();
    for (i, action) in ["click", "fill_form", "navigate"].iter().enumerate() {
        db.store_action(ActionPattern::new(*action).with_success(i % 2 == 0))
            .unwrap();
    }

    let mut options = SearchOptions::default();
    if success_only {
        options = SearchOptions::successful();
    }
    if let Some(url) = fields.next() {
        options = options.with_url_pattern(url);
    }

    if let Ok(results) = db.find_similar(&query, k, &options) {
        assert!(results.len() <= k);
        for w in results.windows(2) {
            assert!(w[0].similarity >= w[1].similarity);
        }
        for r in &results {
            assert!((0.0..=1.0).contains(&r.similarity));
            assert!(options.matches(&r.pattern));
        }
    }
});
