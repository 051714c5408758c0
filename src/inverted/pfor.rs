use log::debug;

use crate::core::error::{Error, Result};
use crate::core::types::DocId;

/// Gaps per block; every block is headed by one byte of bit width `p` and
/// one byte of gap count `n`, then `n` gaps packed little-endian at `p`
/// bits each.
pub const BLOCK_SIZE: usize = 128;

/// Bits needed to represent `max_gap`; at least one so empty-width blocks
/// cannot occur.
fn bits_needed(max_gap: u32) -> u8 {
    if max_gap == 0 {
        1
    } else {
        (32 - max_gap.leading_zeros()) as u8
    }
}

/// pForDelta codec over strictly-increasing doc-id sequences.
pub struct PForDelta;

impl PForDelta {
    /// Gap-encode and bit-pack a sorted, strictly-increasing sequence.
    ///
    /// The first gap is the absolute first doc id; every later gap is the
    /// difference to its predecessor, across block boundaries too.
    pub fn encode(doc_ids: &[DocId]) -> Result<Vec<u8>> {
        if doc_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut gaps: Vec<u32> = Vec::with_capacity(doc_ids.len());
        gaps.push(doc_ids[0]);
        for i in 1..doc_ids.len() {
            if doc_ids[i] <= doc_ids[i - 1] {
                return Err(Error::invalid_input(format!(
                    "doc ids are not strictly increasing at position {} ({} after {})",
                    i,
                    doc_ids[i],
                    doc_ids[i - 1]
                )));
            }
            gaps.push(doc_ids[i] - doc_ids[i - 1]);
        }

        let mut compressed = Vec::new();
        for block in gaps.chunks(BLOCK_SIZE) {
            let max_gap = block.iter().copied().max().unwrap_or(0);
            let p = bits_needed(max_gap);

            compressed.push(p);
            compressed.push(block.len() as u8);

            let mut buffer = 0u64;
            let mut bits_filled = 0u8;
            for &gap in block {
                buffer |= (gap as u64) << bits_filled;
                bits_filled += p;
                while bits_filled >= 8 {
                    compressed.push((buffer & 0xFF) as u8);
                    buffer >>= 8;
                    bits_filled -= 8;
                }
            }
            if bits_filled > 0 {
                compressed.push((buffer & 0xFF) as u8);
            }
        }

        debug!(
            "encoded {} doc ids into {} bytes",
            doc_ids.len(),
            compressed.len()
        );
        Ok(compressed)
    }

    /// Decode a compressed stream back into absolute doc ids.
    pub fn decode(data: &[u8]) -> Result<Vec<DocId>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let mut gaps: Vec<u32> = Vec::new();
        let mut current = 0usize;

        while current < data.len() {
            if current + 2 > data.len() {
                return Err(Error::corrupt("truncated block header"));
            }
            let p = data[current];
            let n = data[current + 1] as usize;
            current += 2;

            if p == 0 || p > 32 {
                return Err(Error::corrupt(format!("invalid bit width {}", p)));
            }

            let total_bits = p as usize * n;
            let bytes_needed = total_bits.div_ceil(8);
            if current + bytes_needed > data.len() {
                return Err(Error::corrupt("truncated block payload"));
            }

            let mut buffer = 0u64;
            let mut bits_in_buffer = 0u8;
            let mut bytes_read = 0usize;
            for _ in 0..n {
                while bits_in_buffer < p && bytes_read < bytes_needed {
                    buffer |= (data[current + bytes_read] as u64) << bits_in_buffer;
                    bits_in_buffer += 8;
                    bytes_read += 1;
                }
                if bits_in_buffer < p {
                    return Err(Error::corrupt("insufficient bits in block payload"));
                }

                gaps.push((buffer & ((1u64 << p) - 1)) as u32);
                buffer >>= p;
                bits_in_buffer -= p;
            }

            current += bytes_needed;
        }

        let mut doc_ids: Vec<DocId> = Vec::with_capacity(gaps.len());
        let mut previous = 0u32;
        for (i, &gap) in gaps.iter().enumerate() {
            let doc_id = if i == 0 {
                gap
            } else {
                previous
                    .checked_add(gap)
                    .ok_or_else(|| Error::corrupt("doc id overflow while summing gaps"))?
            };
            doc_ids.push(doc_id);
            previous = doc_id;
        }

        Ok(doc_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    fn round_trip(doc_ids: &[DocId]) {
        let compressed = PForDelta::encode(doc_ids).unwrap();
        let decoded = PForDelta::decode(&compressed).unwrap();
        assert_eq!(decoded, doc_ids);
    }

    #[test]
    fn empty_list() {
        round_trip(&[]);
    }

    #[test]
    fn single_element() {
        round_trip(&[100]);
    }

    #[test]
    fn power_of_two_boundaries() {
        round_trip(&[1, 3, 7, 15, 31, 63, 127]);
    }

    #[test]
    fn zero_is_a_valid_first_doc_id() {
        round_trip(&[0]);
        round_trip(&[0, 1, 2, 3]);
    }

    #[test]
    fn large_gaps() {
        round_trip(&[10, 1_000, 100_000, 10_000_000, u32::MAX]);
    }

    #[test]
    fn consecutive_ids_across_blocks() {
        let doc_ids: Vec<DocId> = (1..=1000).collect();
        round_trip(&doc_ids);
    }

    #[test]
    fn exact_block_boundary() {
        let doc_ids: Vec<DocId> = (0..BLOCK_SIZE as u32).map(|i| i * 3 + 1).collect();
        round_trip(&doc_ids);
        let doc_ids: Vec<DocId> = (0..BLOCK_SIZE as u32 + 1).map(|i| i * 3 + 1).collect();
        round_trip(&doc_ids);
    }

    #[test]
    fn sparse_and_dense_mix() {
        round_trip(&[1, 2, 3, 5_000, 5_001, 90_000, 90_001, 90_002]);
    }

    #[test]
    fn deterministic_large_sequence_round_trip() {
        // Linear congruential gaps; deterministic, spans many block shapes.
        let mut state = 0x2545F491_u64;
        let mut doc_ids = Vec::with_capacity(100_000);
        let mut current = 0u32;
        for _ in 0..100_000 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let gap = ((state >> 33) % 1000) as u32 + 1;
            current += gap;
            doc_ids.push(current);
        }
        round_trip(&doc_ids);
    }

    #[test]
    fn all_unit_gaps_pack_to_one_bit() {
        let doc_ids: Vec<DocId> = (1..=256).collect();
        let compressed = PForDelta::encode(&doc_ids).unwrap();
        // Two full blocks: 2-byte header + 128 one-bit gaps = 16 bytes each.
        assert_eq!(compressed.len(), 2 * (2 + 16));
        assert_eq!(PForDelta::decode(&compressed).unwrap(), doc_ids);
    }

    #[test]
    fn rejects_unsorted_input() {
        let err = PForDelta::encode(&[5, 3]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        let err = PForDelta::encode(&[5, 5]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
    }

    #[test]
    fn rejects_zero_bit_width() {
        let err = PForDelta::decode(&[0, 255, 255]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Corrupt);
    }

    #[test]
    fn rejects_oversized_bit_width() {
        let err = PForDelta::decode(&[40, 1, 0, 0, 0, 0, 0]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Corrupt);
    }

    #[test]
    fn rejects_truncated_payload() {
        // p = 4, n = 4 needs two payload bytes; only one follows.
        let err = PForDelta::decode(&[4, 4, 0xAB]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Corrupt);
    }

    #[test]
    fn rejects_truncated_header() {
        let valid = PForDelta::encode(&[1, 2, 3]).unwrap();
        let mut data = valid.clone();
        data.push(7); // dangling p byte with no count
        let err = PForDelta::decode(&data).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Corrupt);
    }
}
