//! File chunking: fixed-size blocks out, byte-exact file back in.
//!
//! Blocks are numbered 0..N-1 with N = ceil(len / payload_size).  The final
//! block is zero-padded to the full payload size and remembers its true
//! length.  An empty file still produces exactly one (all-padding) block so
//! that every archive has at least one shard group.

/// One unit of original file data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Global 0-based block number.
    pub index: u64,
    /// Exactly `payload_size` bytes, zero-padded past `actual_length`.
    pub payload: Vec<u8>,
    /// Bytes of real data; equals `payload.len()` except in the final block.
    pub actual_length: usize,
}

/// Number of blocks a file of `file_length` bytes occupies.
pub fn block_count(file_length: u64, payload_size: usize) -> u64 {
    if file_length == 0 {
        return 1;
    }
    file_length.div_ceil(payload_size as u64)
}

/// Split `data` into `payload_size`-byte blocks.
///
/// `payload_size` must be nonzero; callers validate it as part of their
/// encode-parameter checks before chunking.
pub fn split(data: &[u8], payload_size: usize) -> Vec<Block> {
    if data.is_empty() {
        return vec![Block {
            index:         0,
            payload:       vec![0u8; payload_size],
            actual_length: 0,
        }];
    }

    data.chunks(payload_size)
        .enumerate()
        .map(|(i, chunk)| {
            let mut payload = chunk.to_vec();
            payload.resize(payload_size, 0);
            Block {
                index:         i as u64,
                payload,
                actual_length: chunk.len(),
            }
        })
        .collect()
}

/// Concatenate block payloads (ordered by index) and truncate to
/// `file_length`.
///
/// The file length, not per-block metadata, decides where the final block's
/// padding starts: a block rebuilt from parity has no surviving header, but
/// its real extent is still known.
pub fn join(payloads: Vec<Vec<u8>>, file_length: u64) -> Vec<u8> {
    let mut out: Vec<u8> = payloads.into_iter().flatten().collect();
    out.truncate(file_length as usize);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_with_padded_tail() {
        let data = vec![7u8; 257];
        let blocks = split(&data, 100);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].actual_length, 100);
        assert_eq!(blocks[1].actual_length, 100);
        assert_eq!(blocks[2].actual_length, 57);
        assert_eq!(blocks[2].payload.len(), 100);
        assert!(blocks[2].payload[57..].iter().all(|&b| b == 0));
        assert_eq!(blocks[2].index, 2);
    }

    #[test]
    fn exact_multiple_has_no_padding() {
        let data = vec![1u8; 200];
        let blocks = split(&data, 100);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].actual_length, 100);
    }

    #[test]
    fn empty_file_is_one_empty_block() {
        let blocks = split(&[], 100);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].actual_length, 0);
        assert_eq!(blocks[0].payload, vec![0u8; 100]);
        assert_eq!(block_count(0, 100), 1);
    }

    #[test]
    fn join_inverts_split() {
        let data: Vec<u8> = (0u8..=255).cycle().take(1037).collect();
        let blocks = split(&data, 128);
        let payloads = blocks.into_iter().map(|b| b.payload).collect();
        assert_eq!(join(payloads, data.len() as u64), data);
    }

    #[test]
    fn join_of_empty_file_yields_zero_bytes() {
        let blocks = split(&[], 64);
        let payloads: Vec<Vec<u8>> = blocks.into_iter().map(|b| b.payload).collect();
        assert_eq!(join(payloads, 0), Vec::<u8>::new());
    }

    #[test]
    fn block_count_matches_split() {
        for len in [0u64, 1, 99, 100, 101, 257, 1000] {
            let data = vec![0u8; len as usize];
            assert_eq!(block_count(len, 100), split(&data, 100).len() as u64, "len={len}");
        }
    }
}
