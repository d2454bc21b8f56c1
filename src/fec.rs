//! Redundancy engine: systematic Reed–Solomon over GF(2^8).
//!
//! A shard group is k data blocks plus m parity shards computed over them.
//! The invariant the rest of the codec leans on: **any** k of the k+m shards,
//! data or parity in any combination, reconstruct all k data blocks exactly.
//!
//! The algorithm lives behind `encode_group`/`decode_group` only; nothing
//! else in the crate touches the finite-field math, so the code could be
//! swapped for any other systematic MDS code without disturbing framing or
//! reassembly.

use reed_solomon_erasure::galois_8::ReedSolomon;
use thiserror::Error;

/// GF(2^8) codeword limit: k + m shards per group.
pub const MAX_TOTAL_SHARDS: usize = 256;

#[derive(Error, Debug)]
pub enum FecError {
    #[error("invalid shard geometry k={k} m={m}: need k >= 1, m >= 1, k+m <= {MAX_TOTAL_SHARDS}")]
    InvalidGeometry { k: u16, m: u16 },
    #[error("group {group}: {have} of {need} required shards present, cannot reconstruct")]
    InsufficientShards { group: u32, have: usize, need: usize },
    #[error("erasure backend: {0}")]
    Backend(#[from] reed_solomon_erasure::Error),
}

/// Check a (k, m) pair against the GF(2^8) constraints.
pub fn validate_geometry(k: u16, m: u16) -> Result<(), FecError> {
    if k == 0 || m == 0 || k as usize + m as usize > MAX_TOTAL_SHARDS {
        return Err(FecError::InvalidGeometry { k, m });
    }
    Ok(())
}

/// Compute `parity_shards` parity shards over `data` (one `Vec<u8>` per data
/// block, all the same length).  Returns only the parity tail; the data
/// shards are unchanged (the code is systematic).
pub fn encode_group(data: &[Vec<u8>], parity_shards: u16) -> Result<Vec<Vec<u8>>, FecError> {
    let k = data.len() as u16;
    validate_geometry(k, parity_shards)?;

    let shard_len = data[0].len();
    let mut shards: Vec<Vec<u8>> = data.to_vec();
    shards.resize(data.len() + parity_shards as usize, vec![0u8; shard_len]);

    let rs = ReedSolomon::new(k as usize, parity_shards as usize)?;
    rs.encode(&mut shards)?;
    Ok(shards.split_off(k as usize))
}

/// Reconstruct the k data blocks of group `group` from whichever shards
/// survived.
///
/// `shards` must have exactly k+m slots, indexed by shard number, with `None`
/// in every missing position.  Fewer than k present shards is a hard limit,
/// not a retryable condition: missing physical media does not come back.
pub fn decode_group(
    group:  u32,
    mut shards: Vec<Option<Vec<u8>>>,
    k: u16,
    m: u16,
) -> Result<Vec<Vec<u8>>, FecError> {
    validate_geometry(k, m)?;
    debug_assert_eq!(shards.len(), k as usize + m as usize);

    let have = shards.iter().filter(|s| s.is_some()).count();
    if have < k as usize {
        return Err(FecError::InsufficientShards { group, have, need: k as usize });
    }

    let rs = ReedSolomon::new(k as usize, m as usize)?;
    rs.reconstruct_data(&mut shards)?;

    // After reconstruct_data every data slot is Some.
    Ok(shards
        .into_iter()
        .take(k as usize)
        .map(|s| s.unwrap_or_default())
        .collect())
}
