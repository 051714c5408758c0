//! End-to-end scenarios across the three cores.

use serde::{Deserialize, Serialize};

use tessera::ehash::bucket::BLOCK_SIZE;
use tessera::ehash::directory::EhashStore;
use tessera::ehash::Record;
use tessera::inverted::index::InvertedIndex;
use tessera::inverted::pfor::PForDelta;
use tessera::inverted::query::QueryProcessor;
use tessera::inverted::skiplist::build_skip_pointers;
use tessera::inverted::storage::StorageManager;
use tessera::kdtree::point::Point;
use tessera::kdtree::tree::KdTree;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct KvRecord {
    key: String,
    payload: Vec<u8>,
}

impl Record for KvRecord {
    fn key(&self) -> Vec<u8> {
        self.key.as_bytes().to_vec()
    }
}

/// Extensible hashing: grow from a two-bucket directory under inserts that
/// overflow buckets, then verify structure and retrievability.
#[test]
fn ehash_split_scenario() {
    let dir = tempfile::tempdir().unwrap();
    // A 4KB bucket holds roughly three ~1.3KB records.
    let store: EhashStore<KvRecord> = EhashStore::open(dir.path(), BLOCK_SIZE, 1).unwrap();

    let mut inserted = Vec::new();
    for i in 0..10 {
        let record = KvRecord {
            key: format!("record-{:02}", i),
            payload: vec![i as u8; 1300],
        };
        let hash = store.insert(record.clone()).unwrap();
        inserted.push((hash, record));
    }

    assert!(store.global_depth() >= 2);
    assert_eq!(store.directory_size(), 1 << store.global_depth());
    store.verify().unwrap();

    for (hash, record) in inserted {
        assert_eq!(store.find(hash), Some(record));
    }
}

/// pForDelta canonical round trip.
#[test]
fn pfor_round_trip_scenario() {
    let doc_ids = vec![1, 3, 7, 15, 31, 63, 127];
    let compressed = PForDelta::encode(&doc_ids).unwrap();
    assert_eq!(PForDelta::decode(&compressed).unwrap(), doc_ids);
}

/// Boolean retrieval over three small documents.
#[test]
fn boolean_query_scenario() {
    let index = InvertedIndex::new();
    index.add_document(1, "hello world").unwrap();
    index.add_document(2, "hello again").unwrap();
    index.add_document(3, "world peace").unwrap();

    let processor = QueryProcessor::new(&index);
    assert_eq!(processor.execute("hello AND world").unwrap(), vec![1]);
    assert_eq!(processor.execute("hello OR world").unwrap(), vec![1, 2, 3]);
    assert_eq!(processor.execute("NOT hello").unwrap(), vec![3]);
}

/// Build over five documents, save, reload, compare term-by-term.
#[test]
fn persistence_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.dat");

    let index = InvertedIndex::new();
    let documents = [
        (1, "Hello, World! This is the first document."),
        (2, "The quick brown fox jumps over the lazy dog."),
        (3, "Rust is a powerful programming language."),
        (4, "Hello again! This document is the second one."),
        (5, "Testing the inverted index implementation."),
    ];
    for (doc_id, text) in documents {
        index.add_document(doc_id, text).unwrap();
    }

    StorageManager::save(&index, &path).unwrap();

    let restored = InvertedIndex::new();
    StorageManager::load(&restored, &path).unwrap();

    assert_eq!(index.terms(), restored.terms());
    for term in index.terms() {
        assert_eq!(index.posting_bytes(&term), restored.posting_bytes(&term));
        assert_eq!(index.skip_pointers(&term), restored.skip_pointers(&term));

        // Stored skip pointers are exactly what a rebuild derives.
        let bytes = restored.posting_bytes(&term).unwrap();
        assert_eq!(
            restored.skip_pointers(&term),
            build_skip_pointers(&bytes).unwrap()
        );
    }

    let processor = QueryProcessor::new(&restored);
    assert_eq!(processor.execute("hello AND document").unwrap(), vec![1, 4]);
}

/// k-NN over the canonical six-point set.
#[test]
fn kdtree_knn_scenario() {
    let points: Vec<Point> = [(2.0, 3.0), (5.0, 4.0), (9.0, 6.0), (4.0, 7.0), (8.0, 1.0), (7.0, 2.0)]
        .iter()
        .map(|&(x, y)| Point::new(vec![x, y]))
        .collect();
    let tree = KdTree::build(&points).unwrap();

    let result = tree
        .nearest_neighbors(&Point::new(vec![5.0, 5.0]), 2)
        .unwrap();
    assert_eq!(
        result,
        vec![Point::new(vec![5.0, 4.0]), Point::new(vec![4.0, 7.0])]
    );
}

/// Radius search over the same point set.
#[test]
fn kdtree_range_scenario() {
    let points: Vec<Point> = [(2.0, 3.0), (5.0, 4.0), (9.0, 6.0), (4.0, 7.0), (8.0, 1.0), (7.0, 2.0)]
        .iter()
        .map(|&(x, y)| Point::new(vec![x, y]))
        .collect();
    let tree = KdTree::build(&points).unwrap();

    let result = tree
        .range_search(&Point::new(vec![5.0, 5.0]), 3.0)
        .unwrap();
    assert!(result.contains(&Point::new(vec![5.0, 4.0])));
    assert!(result.contains(&Point::new(vec![4.0, 7.0])));
    assert!(!result.contains(&Point::new(vec![2.0, 3.0])));
}
