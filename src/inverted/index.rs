use std::collections::{HashMap, HashSet};

use log::{debug, error, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::types::DocId;
use crate::inverted::normalizer::TextNormalizer;
use crate::inverted::pfor::PForDelta;
use crate::inverted::skiplist::{SkipPointer, Skiplists};

/// Index statistics for monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_documents: u32,
    pub term_count: usize,
    pub posting_bytes: usize,
    pub skip_pointer_count: usize,
}

struct IndexInner {
    /// term → pForDelta-compressed posting bytes
    postings: HashMap<String, Vec<u8>>,
    /// term → one skip pointer per compressed block
    skips: Skiplists,
    /// doc ids ever successfully added; guards the counter against
    /// double-counting re-added documents
    documents: HashSet<DocId>,
    total_documents: u32,
}

/// Inverted index with compressed posting lists and per-block skip pointers.
///
/// Reads (`get_postings`, `contains`, `total_documents`) take the read side
/// of the lock; writes (`add_document`, `insert_term`, `insert_skips`) take
/// the write side.
pub struct InvertedIndex {
    inner: RwLock<IndexInner>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        InvertedIndex {
            inner: RwLock::new(IndexInner {
                postings: HashMap::new(),
                skips: Skiplists::new(),
                documents: HashSet::new(),
                total_documents: 0,
            }),
        }
    }

    /// Index one document: normalise, tokenise, and fold each token's doc id
    /// into its posting list (decode, sorted insert, re-encode, rebuild
    /// skip pointers).
    ///
    /// Re-adding a doc id re-indexes its tokens but never double-counts it
    /// in `total_documents`.
    pub fn add_document(&self, doc_id: DocId, text: &str) -> Result<()> {
        let normalized = TextNormalizer::normalize(text);
        if normalized.is_empty() {
            warn!("document {} has no valid terms after normalisation", doc_id);
            return Ok(());
        }

        let terms = TextNormalizer::tokenize(&normalized);
        let term_count = terms.len();

        let mut guard = self.inner.write();
        let inner = &mut *guard;

        for term in terms {
            if term.is_empty() {
                continue;
            }

            let compressed = inner.postings.entry(term.clone()).or_default();
            let mut posting_list = if compressed.is_empty() {
                Vec::new()
            } else {
                PForDelta::decode(compressed)?
            };

            match posting_list.binary_search(&doc_id) {
                Ok(_) => continue, // exact duplicate
                Err(pos) => posting_list.insert(pos, doc_id),
            }

            *compressed = PForDelta::encode(&posting_list)?;
            inner.skips.rebuild(&term, compressed)?;
        }

        if inner.documents.insert(doc_id) {
            inner.total_documents += 1;
        }

        debug!("indexed document {} ({} terms)", doc_id, term_count);
        Ok(())
    }

    /// Decoded posting list for a term; empty when the term is unknown.
    pub fn get_postings(&self, term: &str) -> Vec<DocId> {
        let inner = self.inner.read();
        match inner.postings.get(term) {
            Some(compressed) => match PForDelta::decode(compressed) {
                Ok(doc_ids) => doc_ids,
                Err(e) => {
                    error!("failed to decode posting list for '{}': {}", term, e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        }
    }

    pub fn contains(&self, term: &str) -> bool {
        self.inner.read().postings.contains_key(term)
    }

    pub fn total_documents(&self) -> u32 {
        self.inner.read().total_documents
    }

    pub fn term_count(&self) -> usize {
        self.inner.read().postings.len()
    }

    pub fn stats(&self) -> IndexStats {
        let inner = self.inner.read();
        IndexStats {
            total_documents: inner.total_documents,
            term_count: inner.postings.len(),
            posting_bytes: inner.postings.values().map(Vec::len).sum(),
            skip_pointer_count: inner.skips.pointer_count(),
        }
    }

    /// All indexed terms, sorted for deterministic iteration.
    pub fn terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = self.inner.read().postings.keys().cloned().collect();
        terms.sort();
        terms
    }

    /// Raw compressed posting bytes for a term.
    pub fn posting_bytes(&self, term: &str) -> Option<Vec<u8>> {
        self.inner.read().postings.get(term).cloned()
    }

    /// Skip pointers for a term; empty when the term has none.
    pub fn skip_pointers(&self, term: &str) -> Vec<SkipPointer> {
        self.inner.read().skips.get(term).to_vec()
    }

    /// Install a term's compressed posting bytes verbatim (loader path).
    pub fn insert_term(&self, term: &str, compressed: Vec<u8>) {
        self.inner.write().postings.insert(term.to_string(), compressed);
    }

    /// Install a term's skip pointers verbatim, replacing any existing set
    /// (loader path).
    pub fn insert_skips(&self, term: &str, skips: Vec<SkipPointer>) {
        self.inner.write().skips.insert(term, skips);
    }

    /// Restore the document counter after a load; the index file does not
    /// carry it, so the loader supplies the tightest universe it observed.
    pub(crate) fn set_total_documents(&self, total: u32) {
        let mut inner = self.inner.write();
        inner.total_documents = total;
        info!("restored document counter to {}", total);
    }
}

impl Default for InvertedIndex {
    fn default() -> Self {
        InvertedIndex::new()
    }
}
