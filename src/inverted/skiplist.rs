use log::debug;

use crate::core::error::{Error, Result};
use crate::core::types::DocId;

/// One pointer per compressed block: the first doc id decoded from the
/// block and the byte offset of the block's `(p, n)` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipPointer {
    pub doc_id: DocId,
    pub byte_offset: u64,
}

/// Derive skip pointers from a compressed posting stream.
///
/// Pure re-parse of the bytes: walks every block header, accumulates gaps
/// to track the running doc id, and records the first absolute doc id of
/// each block. Rebuilding is idempotent because nothing but the input bytes
/// feeds the result.
pub fn build_skip_pointers(data: &[u8]) -> Result<Vec<SkipPointer>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let mut skips = Vec::new();
    let mut current = 0usize;
    let mut current_doc_id = 0u32;

    while current < data.len() {
        if current + 2 > data.len() {
            return Err(Error::corrupt("truncated block header"));
        }
        let block_offset = current as u64;
        let p = data[current];
        let n = data[current + 1] as usize;
        current += 2;

        if p == 0 || p > 32 {
            return Err(Error::corrupt(format!("invalid bit width {}", p)));
        }
        if n == 0 {
            // The encoder never emits an empty block; skip it if one shows up.
            continue;
        }

        let total_bits = p as usize * n;
        let bytes_needed = total_bits.div_ceil(8);
        if current + bytes_needed > data.len() {
            return Err(Error::corrupt("truncated block payload"));
        }

        let mut buffer = 0u64;
        let mut bits_in_buffer = 0u8;
        let mut bytes_read = 0usize;
        for i in 0..n {
            while bits_in_buffer < p && bytes_read < bytes_needed {
                buffer |= (data[current + bytes_read] as u64) << bits_in_buffer;
                bits_in_buffer += 8;
                bytes_read += 1;
            }
            if bits_in_buffer < p {
                return Err(Error::corrupt("insufficient bits in block payload"));
            }

            let gap = (buffer & ((1u64 << p) - 1)) as u32;
            buffer >>= p;
            bits_in_buffer -= p;

            current_doc_id = current_doc_id
                .checked_add(gap)
                .ok_or_else(|| Error::corrupt("doc id overflow while summing gaps"))?;
            if i == 0 {
                skips.push(SkipPointer {
                    doc_id: current_doc_id,
                    byte_offset: block_offset,
                });
            }
        }

        current += bytes_needed;
    }

    debug!("built {} skip pointers from {} bytes", skips.len(), data.len());
    Ok(skips)
}

/// Per-term skip pointer registry.
#[derive(Default)]
pub struct Skiplists {
    skip_map: std::collections::HashMap<String, Vec<SkipPointer>>,
}

impl Skiplists {
    pub fn new() -> Self {
        Skiplists::default()
    }

    /// Derive and store the pointers for a term from its compressed bytes,
    /// replacing any previous set.
    pub fn rebuild(&mut self, term: &str, data: &[u8]) -> Result<()> {
        let pointers = build_skip_pointers(data)?;
        self.skip_map.insert(term.to_string(), pointers);
        Ok(())
    }

    /// Install a term's pointers verbatim, replacing any previous set.
    pub fn insert(&mut self, term: &str, skips: Vec<SkipPointer>) {
        self.skip_map.insert(term.to_string(), skips);
    }

    pub fn get(&self, term: &str) -> &[SkipPointer] {
        self.skip_map.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, term: &str) -> bool {
        self.skip_map.contains_key(term)
    }

    /// Total pointers across every term.
    pub fn pointer_count(&self) -> usize {
        self.skip_map.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.skip_map.clear();
    }
}

/// Index of the last block whose first doc id is at or below `target`.
///
/// `None` means the target precedes every block, so a scan must start at
/// block zero anyway.
pub fn find_block(skips: &[SkipPointer], target: DocId) -> Option<usize> {
    let idx = skips.partition_point(|skip| skip.doc_id <= target);
    idx.checked_sub(1)
}

/// Decode only from the block that may contain `target` onward.
///
/// The skip pointer supplies the block's absolute first doc id, so the
/// block-initial gap (which is relative to the previous block) is replaced
/// instead of summed. The result equals the suffix of a full decode
/// beginning at that block.
pub fn decode_from(data: &[u8], skips: &[SkipPointer], target: DocId) -> Result<Vec<DocId>> {
    let Some(block) = find_block(skips, target) else {
        return crate::inverted::pfor::PForDelta::decode(data);
    };

    let skip = skips[block];
    let offset = skip.byte_offset as usize;
    if offset >= data.len() {
        return Err(Error::corrupt("skip pointer past end of posting bytes"));
    }

    let suffix_gaps = crate::inverted::pfor::PForDelta::decode(&data[offset..])?;
    // The suffix decodes as if its first gap were absolute; re-anchor it.
    let mut doc_ids = Vec::with_capacity(suffix_gaps.len());
    let mut previous = skip.doc_id;
    for (i, &value) in suffix_gaps.iter().enumerate() {
        let doc_id = if i == 0 {
            skip.doc_id
        } else {
            // decode() already prefix-summed from the wrong base; recover
            // the gap before re-anchoring.
            let gap = value - suffix_gaps[i - 1];
            previous
                .checked_add(gap)
                .ok_or_else(|| Error::corrupt("doc id overflow while summing gaps"))?
        };
        doc_ids.push(doc_id);
        previous = doc_id;
    }

    Ok(doc_ids)
}
