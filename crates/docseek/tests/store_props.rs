//! Property tests for similarity index ordering, filtering and persistence

use std::collections::HashMap;

use docseek::retrieval::{or_filters, FragmentStore, Metadata};
use proptest::prelude::*;
use serde_json::json;

const DIM: usize = 12;

fn arb_embedding() -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, DIM)
        .prop_filter("non-zero embedding", |v| v.iter().any(|x| x.abs() > 1e-3))
}

fn arb_entries() -> impl Strategy<Value = HashMap<String, (Vec<f32>, String)>> {
    proptest::collection::hash_map("[a-z]{3,8}", (arb_embedding(), "doc[0-3]"), 1..20)
}

fn build(entries: &HashMap<String, (Vec<f32>, String)>) -> FragmentStore {
    let mut store = FragmentStore::in_memory("props");
    for (id, (embedding, doc)) in entries {
        let mut metadata = Metadata::new();
        metadata.insert("documento".into(), json!(doc));
        store.store(id.clone(), embedding.clone(), metadata).unwrap();
    }
    store
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn results_sorted_and_bounded(
        entries in arb_entries(),
        query in arb_embedding(),
        k in 1usize..25,
    ) {
        let store = build(&entries);
        let results = store.find_most_similar(&query, k, &[]).unwrap();

        prop_assert_eq!(results.len(), k.min(entries.len()));
        for pair in results.windows(2) {
            prop_assert!(pair[0].distance <= pair[1].distance);
        }
        for result in &results {
            prop_assert!(result.distance >= -1e-4 && result.distance <= 2.0 + 1e-4);
        }
    }

    #[test]
    fn filtered_results_match_a_clause(
        entries in arb_entries(),
        query in arb_embedding(),
        wanted in proptest::collection::vec("doc[0-3]", 1..3),
    ) {
        let store = build(&entries);
        let filters = or_filters("documento", wanted.iter().map(String::as_str));
        let results = store.find_most_similar(&query, entries.len(), &filters).unwrap();

        let expected = entries.values().filter(|(_, doc)| wanted.contains(doc)).count();
        prop_assert_eq!(results.len(), expected);
        for result in &results {
            let doc = result.metadata["documento"].as_str().unwrap().to_string();
            prop_assert!(wanted.contains(&doc));
        }
    }

    #[test]
    fn persisted_index_reloads_identically(entries in arb_entries()) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let mut store = FragmentStore::open("props", &path).unwrap();
        prop_assert!(store.is_empty());
        for entry in build(&entries).entries() {
            store
                .store(entry.unique_id.clone(), entry.embedding.clone(), entry.metadata.clone())
                .unwrap();
        }
        store.persist_to_disk().unwrap();

        let reopened = FragmentStore::open("props", &path).unwrap();
        prop_assert_eq!(reopened.len(), entries.len());
        prop_assert_eq!(reopened.dimensions(), Some(DIM));
        prop_assert!(!reopened.is_dirty());
        for (id, (embedding, doc)) in &entries {
            let entry = reopened.get(id).unwrap();
            prop_assert_eq!(entry.embedding.len(), embedding.len());
            for (a, b) in entry.embedding.iter().zip(embedding) {
                prop_assert!((a - b).abs() < 1e-6);
            }
            prop_assert_eq!(entry.metadata["documento"].as_str(), Some(doc.as_str()));
        }
    }
}
