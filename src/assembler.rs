//! Encode pipeline: file bytes in, descriptor plus ordered frame strings out.
//!
//! The emitted order (descriptor frame, then k+m frames per group in
//! shard-index order, then a second descriptor frame) has no bearing on
//! decoding.  It exists so the page-layout collaborator gets a deterministic,
//! human-followable sequence, and so the archive metadata sits at both ends
//! of the printed document.
//!
//! # Parallelism
//!
//! Per-group parity computations are independent: with the `parallel`
//! feature each group is encoded on a Rayon worker that owns its group's
//! data, and results are merged back in group order.  Without the feature
//! the same loop runs sequentially.

use chrono::Utc;
use thiserror::Error;

use crate::chunker;
use crate::descriptor::ArchiveDescriptor;
use crate::fec::{self, FecError};
use crate::frame::{Frame, DESCRIPTOR_GROUP};

/// Archive-level encoding configuration.
///
/// Defaults: 512-byte payloads (one frame fits a mid-size QR symbol with
/// margin), 10 data + 4 parity shards per group, i.e. any 4 of every 14
/// printed symbols may be lost.
#[derive(Debug, Clone)]
pub struct EncodeParams {
    pub payload_size:  u16,
    pub data_shards:   u16,
    pub parity_shards: u16,
}

impl Default for EncodeParams {
    fn default() -> Self {
        Self {
            payload_size:  512,
            data_shards:   10,
            parity_shards: 4,
        }
    }
}

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("invalid encode parameters: {0}")]
    InputSizeInvalid(String),
    #[error("descriptor needs {needed} bytes but the payload size is {payload_size}")]
    DescriptorOverflow { needed: usize, payload_size: u16 },
    #[error(transparent)]
    Fec(FecError),
}

/// Split, group, and erasure-code `data` into the full ordered frame
/// sequence for one archive.
pub fn assemble(
    data:   &[u8],
    params: &EncodeParams,
) -> Result<(ArchiveDescriptor, Vec<Vec<u8>>), EncodeError> {
    let payload_size = params.payload_size as usize;
    let k = params.data_shards;
    let m = params.parity_shards;

    if payload_size == 0 {
        return Err(EncodeError::InputSizeInvalid(
            "payload_size must be at least 1".into(),
        ));
    }
    fec::validate_geometry(k, m)
        .map_err(|e| EncodeError::InputSizeInvalid(e.to_string()))?;

    let descriptor = ArchiveDescriptor {
        file_digest:   blake3::hash(data).into(),
        file_length:   data.len() as u64,
        payload_size:  params.payload_size,
        data_shards:   k,
        parity_shards: m,
        total_blocks:  chunker::block_count(data.len() as u64, payload_size),
        created_unix:  Utc::now().timestamp(),
    };
    let archive_id = descriptor.archive_id();

    let descriptor_wire = descriptor.to_bytes();
    if descriptor_wire.len() > payload_size {
        return Err(EncodeError::DescriptorOverflow {
            needed:       descriptor_wire.len(),
            payload_size: params.payload_size,
        });
    }

    // Chunk, then partition into groups of exactly k payloads.  The last
    // group is topped up with zero filler blocks; the descriptor's
    // total_blocks lets the decoder discard them after reconstruction.
    let blocks = chunker::split(data, payload_size);
    let mut groups: Vec<Vec<Vec<u8>>> = Vec::new();
    for chunk in blocks.chunks(k as usize) {
        let mut group: Vec<Vec<u8>> = chunk.iter().map(|b| b.payload.clone()).collect();
        group.resize(k as usize, vec![0u8; payload_size]);
        groups.push(group);
    }

    let parities = encode_groups(&groups, m).map_err(EncodeError::Fec)?;

    // Emit frames: descriptor, every group in shard-index order, descriptor.
    let mut frames: Vec<Vec<u8>> =
        Vec::with_capacity(groups.len() * (k as usize + m as usize) + 2);
    frames.push(descriptor_frame(&descriptor, &descriptor_wire, payload_size));

    for (g, (group, parity)) in groups.iter().zip(&parities).enumerate() {
        let group_index = g as u32;
        for (s, payload) in group.iter().enumerate() {
            let global = group_index as u64 * k as u64 + s as u64;
            frames.push(
                Frame {
                    archive_id,
                    group_index,
                    shard_index:    s as u16,
                    data_shards:    k,
                    parity_shards:  m,
                    payload_length: descriptor.block_length(global) as u16,
                    payload:        payload.clone(),
                }
                .to_bytes(),
            );
        }
        for (p, payload) in parity.iter().enumerate() {
            frames.push(
                Frame {
                    archive_id,
                    group_index,
                    shard_index:    k + p as u16,
                    data_shards:    k,
                    parity_shards:  m,
                    payload_length: params.payload_size,
                    payload:        payload.clone(),
                }
                .to_bytes(),
            );
        }
    }

    frames.push(descriptor_frame(&descriptor, &descriptor_wire, payload_size));
    Ok((descriptor, frames))
}

fn descriptor_frame(
    descriptor:   &ArchiveDescriptor,
    wire:         &[u8],
    payload_size: usize,
) -> Vec<u8> {
    let mut payload = wire.to_vec();
    payload.resize(payload_size, 0);
    Frame {
        archive_id:     descriptor.archive_id(),
        group_index:    DESCRIPTOR_GROUP,
        shard_index:    0,
        data_shards:    descriptor.data_shards,
        parity_shards:  descriptor.parity_shards,
        payload_length: wire.len() as u16,
        payload,
    }
    .to_bytes()
}

fn encode_groups(groups: &[Vec<Vec<u8>>], m: u16) -> Result<Vec<Vec<Vec<u8>>>, FecError> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        groups
            .par_iter()
            .map(|group| fec::encode_group(group, m))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        groups
            .iter()
            .map(|group| fec::encode_group(group, m))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameKind;

    fn params(payload_size: u16, k: u16, m: u16) -> EncodeParams {
        EncodeParams { payload_size, data_shards: k, parity_shards: m }
    }

    #[test]
    fn concrete_257_byte_scenario() {
        // 257 bytes at payload 100 with (3, 1): 3 data blocks, 1 group,
        // 1 parity shard, 4 shard frames plus 2 descriptor frames.
        let data = vec![9u8; 257];
        let (descriptor, frames) = assemble(&data, &params(100, 3, 1)).unwrap();
        assert_eq!(descriptor.total_blocks, 3);
        assert_eq!(descriptor.group_count(), 1);
        assert_eq!(frames.len(), 6);

        let parsed: Vec<Frame> = frames.iter().map(|f| Frame::from_bytes(f).unwrap()).collect();
        assert_eq!(parsed[0].kind(), FrameKind::Descriptor);
        assert_eq!(parsed[5].kind(), FrameKind::Descriptor);
        assert_eq!(parsed[1].kind(), FrameKind::Data);
        assert_eq!(parsed[3].payload_length, 57);
        assert_eq!(parsed[4].kind(), FrameKind::Parity);
        assert_eq!(parsed[4].payload_length, 100);
    }

    #[test]
    fn short_last_group_is_padded_with_filler() {
        // 4 blocks over k=3: second group holds 1 real block + 2 fillers.
        let data = vec![1u8; 310];
        let (descriptor, frames) = assemble(&data, &params(100, 3, 1)).unwrap();
        assert_eq!(descriptor.total_blocks, 4);
        assert_eq!(descriptor.group_count(), 2);
        // 2 groups x 4 shards + 2 descriptors.
        assert_eq!(frames.len(), 10);

        let filler = Frame::from_bytes(&frames[6]).unwrap();
        assert_eq!(filler.group_index, 1);
        assert_eq!(filler.shard_index, 1);
        assert_eq!(filler.payload_length, 0);
        assert!(filler.payload.iter().all(|&b| b == 0));
    }

    #[test]
    fn empty_file_still_produces_one_group() {
        let (descriptor, frames) = assemble(&[], &params(100, 3, 1)).unwrap();
        assert_eq!(descriptor.total_blocks, 1);
        assert_eq!(descriptor.file_length, 0);
        assert_eq!(frames.len(), 6);
    }

    #[test]
    fn rejects_unusable_parameters() {
        assert!(matches!(
            assemble(b"x", &params(0, 3, 1)),
            Err(EncodeError::InputSizeInvalid(_))
        ));
        assert!(matches!(
            assemble(b"x", &params(100, 0, 1)),
            Err(EncodeError::InputSizeInvalid(_))
        ));
        assert!(matches!(
            assemble(b"x", &params(100, 3, 0)),
            Err(EncodeError::InputSizeInvalid(_))
        ));
        // Descriptor JSON cannot fit an 8-byte payload.
        assert!(matches!(
            assemble(b"x", &params(8, 3, 1)),
            Err(EncodeError::DescriptorOverflow { .. })
        ));
    }

    #[test]
    fn frames_are_uniform_wire_length() {
        let (_, frames) = assemble(&vec![3u8; 1000], &params(128, 4, 2)).unwrap();
        assert!(frames.iter().all(|f| f.len() == Frame::wire_len(128)));
    }
}
