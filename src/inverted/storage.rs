use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::{debug, info};

use crate::core::error::{Error, Result};
use crate::core::types::DocId;
use crate::inverted::index::InvertedIndex;
use crate::inverted::pfor::PForDelta;
use crate::inverted::skiplist::SkipPointer;

pub const MAGIC: [u8; 4] = *b"SAPJ";
pub const VERSION: u32 = 1;

/// Save/load of the index to a binary file.
///
/// Layout, all integers little-endian:
///
/// ```text
/// magic[4] = "SAPJ"
/// version  : u32
/// num_terms: u32
/// per term:
///   term_len: u32, term bytes
///   posting_len: u32, posting bytes
///   num_skips: u32
///   per skip: i32 doc_id, u64 byte_offset
/// ```
pub struct StorageManager;

impl StorageManager {
    /// Write the index to `path`. Terms go out in sorted order, so saving
    /// the same index twice produces identical bytes.
    pub fn save(index: &InvertedIndex, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut out = BufWriter::new(File::create(path)?);

        out.write_all(&MAGIC)?;
        out.write_all(&VERSION.to_le_bytes())?;

        let terms = index.terms();
        out.write_all(&(terms.len() as u32).to_le_bytes())?;

        for term in &terms {
            let compressed = index.posting_bytes(term).unwrap_or_default();
            let skips = index.skip_pointers(term);

            out.write_all(&(term.len() as u32).to_le_bytes())?;
            out.write_all(term.as_bytes())?;
            out.write_all(&(compressed.len() as u32).to_le_bytes())?;
            out.write_all(&compressed)?;
            out.write_all(&(skips.len() as u32).to_le_bytes())?;
            for skip in &skips {
                out.write_all(&(skip.doc_id as i32).to_le_bytes())?;
                out.write_all(&skip.byte_offset.to_le_bytes())?;
            }
            debug!(
                "saved term '{}': {} posting bytes, {} skip pointers",
                term,
                compressed.len(),
                skips.len()
            );
        }

        out.flush()?;
        info!("saved {} terms to {}", terms.len(), path.display());
        Ok(())
    }

    /// Load an index file into `index`.
    ///
    /// The whole file is parsed and validated before anything is installed;
    /// a corrupt file leaves the index untouched. The document counter is
    /// restored as the maximum doc id observed, the tightest universe that
    /// reproduces the saved index's complement behaviour.
    pub fn load(index: &InvertedIndex, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut input = BufReader::new(File::open(path)?);

        let mut magic = [0u8; 4];
        read_exact(&mut input, &mut magic)?;
        if magic != MAGIC {
            return Err(Error::corrupt(format!(
                "bad magic in {}: file format not recognised",
                path.display()
            )));
        }

        let version = read_u32(&mut input)?;
        if version != VERSION {
            return Err(Error::corrupt(format!(
                "unsupported index file version {}",
                version
            )));
        }

        let num_terms = read_u32(&mut input)?;
        let mut loaded: Vec<(String, Vec<u8>, Vec<SkipPointer>)> =
            Vec::with_capacity(num_terms as usize);
        let mut max_doc_id: DocId = 0;

        for _ in 0..num_terms {
            let term_len = read_u32(&mut input)? as usize;
            let mut term_bytes = vec![0u8; term_len];
            read_exact(&mut input, &mut term_bytes)?;
            let term = String::from_utf8(term_bytes)
                .map_err(|_| Error::corrupt("term is not valid UTF-8"))?;

            let posting_len = read_u32(&mut input)? as usize;
            let mut compressed = vec![0u8; posting_len];
            read_exact(&mut input, &mut compressed)?;

            // Validates the posting bytes up front; a bad stream rejects
            // the whole file instead of surfacing at query time.
            let doc_ids = PForDelta::decode(&compressed)?;
            if let Some(&last) = doc_ids.last() {
                max_doc_id = max_doc_id.max(last);
            }

            let num_skips = read_u32(&mut input)?;
            let mut skips = Vec::with_capacity(num_skips as usize);
            for _ in 0..num_skips {
                let doc_id = read_u32(&mut input)? as i32;
                let byte_offset = read_u64(&mut input)?;
                skips.push(SkipPointer {
                    doc_id: doc_id as DocId,
                    byte_offset,
                });
            }

            loaded.push((term, compressed, skips));
        }

        for (term, compressed, skips) in loaded {
            index.insert_term(&term, compressed);
            index.insert_skips(&term, skips);
        }
        index.set_total_documents(max_doc_id);

        info!("loaded {} terms from {}", num_terms, path.display());
        Ok(())
    }
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::corrupt("index file is truncated")
        } else {
            e.into()
        }
    })
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    read_exact(reader, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use std::fs;

    fn populated_index() -> InvertedIndex {
        let index = InvertedIndex::new();
        index.add_document(1, "hello world this is the first document").unwrap();
        index.add_document(2, "the quick brown fox").unwrap();
        index.add_document(3, "hello again from the third").unwrap();
        index
    }

    #[test]
    fn save_load_round_trip_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.dat");

        let index = populated_index();
        StorageManager::save(&index, &path).unwrap();

        let restored = InvertedIndex::new();
        StorageManager::load(&restored, &path).unwrap();

        assert_eq!(index.terms(), restored.terms());
        for term in index.terms() {
            assert_eq!(
                index.posting_bytes(&term),
                restored.posting_bytes(&term),
                "posting bytes for '{}'",
                term
            );
            assert_eq!(
                index.skip_pointers(&term),
                restored.skip_pointers(&term),
                "skip pointers for '{}'",
                term
            );
        }
        assert_eq!(restored.total_documents(), 3);
    }

    #[test]
    fn saving_twice_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.dat");
        let b = dir.path().join("b.dat");

        let index = populated_index();
        StorageManager::save(&index, &a).unwrap();
        StorageManager::save(&index, &b).unwrap();

        assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.dat");
        fs::write(&path, b"NOPE\x01\x00\x00\x00\x00\x00\x00\x00").unwrap();

        let index = InvertedIndex::new();
        let err = StorageManager::load(&index, &path).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Corrupt);
        assert_eq!(index.term_count(), 0);
    }

    #[test]
    fn wrong_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.dat");
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        fs::write(&path, bytes).unwrap();

        let index = InvertedIndex::new();
        let err = StorageManager::load(&index, &path).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Corrupt);
    }

    #[test]
    fn truncated_file_is_rejected_without_partial_population() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.dat");

        let index = populated_index();
        StorageManager::save(&index, &path).unwrap();

        let full = fs::read(&path).unwrap();
        fs::write(&path, &full[..full.len() - 5]).unwrap();

        let restored = InvertedIndex::new();
        let err = StorageManager::load(&restored, &path).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Corrupt);
        assert_eq!(restored.term_count(), 0);
    }

    #[test]
    fn loaded_index_answers_queries_like_the_original() {
        use crate::inverted::query::QueryProcessor;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.dat");

        let index = populated_index();
        StorageManager::save(&index, &path).unwrap();

        let restored = InvertedIndex::new();
        StorageManager::load(&restored, &path).unwrap();

        let original = QueryProcessor::new(&index);
        let reloaded = QueryProcessor::new(&restored);
        for query in ["hello", "hello AND the", "quick OR hello", "NOT hello"] {
            assert_eq!(
                original.execute(query).unwrap(),
                reloaded.execute(query).unwrap(),
                "query: {}",
                query
            );
        }
    }
}
