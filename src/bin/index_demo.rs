/// Inverted index demo: build a small index, persist it, reload it, and run
/// canned term lookups and boolean queries against the reloaded copy.
///
/// Exits 0 on success, 1 on any setup or I/O failure.
use tessera::inverted::index::InvertedIndex;
use tessera::inverted::query::QueryProcessor;
use tessera::inverted::storage::StorageManager;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let index = InvertedIndex::new();

    let documents = [
        (1, "Hello, World! This is the first document."),
        (2, "The quick brown fox jumps over the lazy dog."),
        (3, "Rust is a powerful programming language."),
        (4, "Hello again! This document is the second one."),
        (5, "Testing the inverted index implementation."),
    ];

    for (doc_id, text) in documents {
        index.add_document(doc_id, text)?;
    }
    println!("Indexed {} documents.", index.total_documents());

    let index_path = "index.dat";
    StorageManager::save(&index, index_path)?;
    println!("Index saved to '{}'.", index_path);

    let loaded = InvertedIndex::new();
    StorageManager::load(&loaded, index_path)?;
    println!("Index reloaded from '{}'.\n", index_path);

    for term in ["hello", "document", "rust", "quick", "missing"] {
        let postings = loaded.get_postings(term);
        if postings.is_empty() {
            println!("Term '{}' not found in any document.", term);
        } else {
            println!("Term '{}' found in documents {:?}.", term, postings);
        }
    }
    println!();

    let processor = QueryProcessor::new(&loaded);
    let queries = [
        "hello AND document",
        "quick OR lazy",
        "NOT hello",
        "( hello OR quick ) AND NOT second",
    ];

    for query in queries {
        match processor.execute(query) {
            Ok(result) => println!("Query '{}' -> {:?}", query, result),
            Err(e) => println!("Query '{}' failed: {}", query, e),
        }
    }

    Ok(())
}
