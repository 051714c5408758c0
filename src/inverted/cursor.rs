use crate::core::error::{Error, Result};
use crate::core::types::DocId;
use crate::inverted::skiplist::SkipPointer;

/// Forward cursor over a compressed posting list.
///
/// Decodes one block at a time and jumps between blocks through the skip
/// pointers, so advancing to a far-away doc id never touches the blocks in
/// between.
pub struct PostingCursor<'a> {
    data: &'a [u8],
    skips: &'a [SkipPointer],
    current_block: usize,
    block_doc_ids: Vec<DocId>,
    pos_in_block: usize,
    exhausted: bool,
}

impl<'a> PostingCursor<'a> {
    /// Position a cursor at the first posting. `skips` must be the pointers
    /// derived from `data`.
    pub fn new(data: &'a [u8], skips: &'a [SkipPointer]) -> Result<Self> {
        let mut cursor = PostingCursor {
            data,
            skips,
            current_block: 0,
            block_doc_ids: Vec::new(),
            pos_in_block: 0,
            exhausted: data.is_empty() || skips.is_empty(),
        };
        if !cursor.exhausted {
            cursor.decode_current_block()?;
        }
        Ok(cursor)
    }

    /// Decode the block `current_block` points at, anchored on its skip
    /// pointer's absolute doc id.
    fn decode_current_block(&mut self) -> Result<()> {
        let skip = self.skips[self.current_block];
        let offset = skip.byte_offset as usize;
        if offset + 2 > self.data.len() {
            return Err(Error::corrupt("skip pointer past end of posting bytes"));
        }

        let p = self.data[offset];
        let n = self.data[offset + 1] as usize;
        if p == 0 || p > 32 {
            return Err(Error::corrupt(format!("invalid bit width {}", p)));
        }

        let payload = offset + 2;
        let bytes_needed = (p as usize * n).div_ceil(8);
        if payload + bytes_needed > self.data.len() {
            return Err(Error::corrupt("truncated block payload"));
        }

        self.block_doc_ids.clear();
        let mut buffer = 0u64;
        let mut bits_in_buffer = 0u8;
        let mut bytes_read = 0usize;
        let mut previous = 0u32;
        for i in 0..n {
            while bits_in_buffer < p && bytes_read < bytes_needed {
                buffer |= (self.data[payload + bytes_read] as u64) << bits_in_buffer;
                bits_in_buffer += 8;
                bytes_read += 1;
            }
            if bits_in_buffer < p {
                return Err(Error::corrupt("insufficient bits in block payload"));
            }

            let gap = (buffer & ((1u64 << p) - 1)) as u32;
            buffer >>= p;
            bits_in_buffer -= p;

            // The block-initial gap is relative to the previous block; the
            // skip pointer already carries the absolute value.
            let doc_id = if i == 0 {
                skip.doc_id
            } else {
                previous
                    .checked_add(gap)
                    .ok_or_else(|| Error::corrupt("doc id overflow while summing gaps"))?
            };
            self.block_doc_ids.push(doc_id);
            previous = doc_id;
        }

        self.pos_in_block = 0;
        Ok(())
    }

    /// Current doc id, or None once the cursor ran off the end.
    pub fn doc(&self) -> Option<DocId> {
        if self.exhausted {
            None
        } else {
            self.block_doc_ids.get(self.pos_in_block).copied()
        }
    }

    /// Step to the next posting.
    pub fn advance(&mut self) -> Result<Option<DocId>> {
        if self.exhausted {
            return Ok(None);
        }

        self.pos_in_block += 1;
        if self.pos_in_block >= self.block_doc_ids.len() {
            self.current_block += 1;
            if self.current_block >= self.skips.len() {
                self.exhausted = true;
                return Ok(None);
            }
            self.decode_current_block()?;
        }

        Ok(self.doc())
    }

    /// Move forward to the first posting at or above `target`.
    pub fn seek(&mut self, target: DocId) -> Result<Option<DocId>> {
        if self.exhausted {
            return Ok(None);
        }

        // Block-level jump: last not-yet-passed block starting at or below
        // the target.
        let ahead = &self.skips[self.current_block..];
        let rel = ahead.partition_point(|skip| skip.doc_id <= target);
        if rel > 1 {
            self.current_block += rel - 1;
            self.decode_current_block()?;
        }

        // Within the block, binary search from the current position.
        let in_block = self.block_doc_ids[self.pos_in_block..].partition_point(|&d| d < target);
        self.pos_in_block += in_block;

        if self.pos_in_block >= self.block_doc_ids.len() {
            // Target falls in the gap before the next block.
            self.current_block += 1;
            if self.current_block >= self.skips.len() {
                self.exhausted = true;
                return Ok(None);
            }
            self.decode_current_block()?;
        }

        Ok(self.doc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inverted::pfor::{PForDelta, BLOCK_SIZE};
    use crate::inverted::skiplist::build_skip_pointers;

    fn cursor_setup(doc_ids: &[DocId]) -> (Vec<u8>, Vec<SkipPointer>) {
        let compressed = PForDelta::encode(doc_ids).unwrap();
        let skips = build_skip_pointers(&compressed).unwrap();
        (compressed, skips)
    }

    #[test]
    fn iterates_every_posting() {
        let doc_ids: Vec<DocId> = (0..BLOCK_SIZE as u32 * 2 + 31).map(|i| i * 3 + 2).collect();
        let (compressed, skips) = cursor_setup(&doc_ids);

        let mut cursor = PostingCursor::new(&compressed, &skips).unwrap();
        let mut seen = Vec::new();
        while let Some(doc) = cursor.doc() {
            seen.push(doc);
            cursor.advance().unwrap();
        }
        assert_eq!(seen, doc_ids);
    }

    #[test]
    fn seek_lands_on_first_at_or_above() {
        let doc_ids: Vec<DocId> = vec![10, 20, 30, 100, 200, 300, 1000, 2000];
        let (compressed, skips) = cursor_setup(&doc_ids);
        let mut cursor = PostingCursor::new(&compressed, &skips).unwrap();

        assert_eq!(cursor.seek(25).unwrap(), Some(30));
        assert_eq!(cursor.seek(100).unwrap(), Some(100));
        assert_eq!(cursor.seek(500).unwrap(), Some(1000));
        assert_eq!(cursor.seek(3000).unwrap(), None);
        assert_eq!(cursor.doc(), None);
    }

    #[test]
    fn seek_skips_whole_blocks() {
        let doc_ids: Vec<DocId> = (0..BLOCK_SIZE as u32 * 4).map(|i| i * 2 + 1).collect();
        let (compressed, skips) = cursor_setup(&doc_ids);
        let mut cursor = PostingCursor::new(&compressed, &skips).unwrap();

        // Jump straight into the last block.
        let target = doc_ids[3 * BLOCK_SIZE + 5];
        assert_eq!(cursor.seek(target).unwrap(), Some(target));

        // A target in the gap between two doc ids resolves to the next one.
        assert_eq!(cursor.seek(target + 1).unwrap(), Some(target + 2));
    }

    #[test]
    fn seek_against_brute_force() {
        let doc_ids: Vec<DocId> = (0..700).map(|i| i * 7 + 3).collect();
        let (compressed, skips) = cursor_setup(&doc_ids);

        for target in [0u32, 3, 4, 350, 2400, 2402, 4893, 4894] {
            let mut cursor = PostingCursor::new(&compressed, &skips).unwrap();
            let expected = doc_ids.iter().copied().find(|&d| d >= target);
            assert_eq!(cursor.seek(target).unwrap(), expected, "target {}", target);
        }
    }

    #[test]
    fn seek_never_moves_backwards() {
        let doc_ids: Vec<DocId> = (0..400).map(|i| i * 5 + 10).collect();
        let (compressed, skips) = cursor_setup(&doc_ids);
        let mut cursor = PostingCursor::new(&compressed, &skips).unwrap();

        let landed = cursor.seek(1000).unwrap().unwrap();
        assert_eq!(landed, 1010);
        // A smaller target keeps the cursor where it is.
        assert_eq!(cursor.seek(10).unwrap(), Some(1010));
    }

    #[test]
    fn empty_posting_is_immediately_exhausted() {
        let cursor = PostingCursor::new(&[], &[]).unwrap();
        assert_eq!(cursor.doc(), None);
    }
}
