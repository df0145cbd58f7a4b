#![no_main]

use agentdb::{AgentDB, Config, EmbeddingDimension};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_dimension(EmbeddingDimension::Custom(32));
    let mut db = AgentDB::open(dir.path(), config).unwrap();

    match db.import_training_data(json) {
        Ok(ids) => assert_eq!(db.len(), ids.len()),
        Err(e) => {
            assert!(e.is_import());
            assert!(db.is_empty());
        }
    }
});
