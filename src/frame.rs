//! Wire frame codec: the self-describing unit that survives print and scan.
//!
//! One frame carries exactly one shard (a data block, a parity shard, or the
//! archive descriptor) plus enough metadata to place it without any external
//! ordering.  Every integer is big-endian.
//!
//! # Wire layout
//!
//! | field          | size | meaning                                      |
//! |----------------|------|----------------------------------------------|
//! | magic          | 4    | `b"PSHD"`                                    |
//! | version        | 1    | format version (currently 1)                 |
//! | archive_id     | 8    | truncated file digest                        |
//! | group_index    | 4    | shard-group number                           |
//! | shard_index    | 2    | `0..k` data, `k..k+m` parity                 |
//! | data_shards    | 2    | k, data shards per group                     |
//! | parity_shards  | 2    | m, parity shards per group                   |
//! | payload_length | 2    | bytes of payload actually meaningful         |
//! | payload        | *    | shard content (fixed `payload_size` bytes)   |
//! | crc            | 4    | CRC-32 over everything before it             |
//!
//! The payload area is not length-prefixed: one scanned symbol yields exactly
//! one frame string, so the payload size is the input length minus the fixed
//! 29-byte overhead.  The trailing CRC covers magic through payload, so any
//! single corrupted byte fails the frame deterministically instead of being
//! accepted as data.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;
use std::io::Cursor;
use thiserror::Error;

pub const FRAME_MAGIC: &[u8; 4] = b"PSHD";
pub const FRAME_VERSION: u8 = 1;

/// Fixed bytes before the payload.
pub const FRAME_HEADER_SIZE: usize = 25;
/// Fixed bytes after the payload (the CRC).
pub const FRAME_TRAILER_SIZE: usize = 4;
/// Total non-payload bytes per frame.
pub const FRAME_OVERHEAD: usize = FRAME_HEADER_SIZE + FRAME_TRAILER_SIZE;

/// Reserved group number marking a frame that carries the archive descriptor
/// rather than a shard.
pub const DESCRIPTOR_GROUP: u32 = 0xFFFF_FFFF;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("frame truncated: {len} bytes, need at least {}", FRAME_OVERHEAD + 1)]
    Truncated { len: usize },
    #[error("bad magic")]
    BadMagic,
    #[error("unsupported frame version: {0}")]
    UnsupportedVersion(u8),
    #[error("checksum mismatch: stored {stored:08x}, computed {computed:08x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
    #[error("invalid shard geometry k={k} m={m}")]
    ShardCountInvalid { k: u16, m: u16 },
    #[error("shard index {shard} out of range for k+m={total}")]
    ShardIndexOutOfRange { shard: u16, total: u16 },
    #[error("payload_length {declared} exceeds payload area of {available} bytes")]
    PayloadLengthOutOfRange { declared: u16, available: usize },
}

/// What role a frame plays, derived from its indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Carries one block of original file data.
    Data,
    /// Carries a derived parity shard.
    Parity,
    /// Carries the serialized [`ArchiveDescriptor`](crate::descriptor::ArchiveDescriptor).
    Descriptor,
}

/// One decoded frame.  Immutable once produced; the payload is always the
/// archive's full `payload_size` bytes, zero-padded past `payload_length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub archive_id:     u64,
    pub group_index:    u32,
    pub shard_index:    u16,
    pub data_shards:    u16,
    pub parity_shards:  u16,
    pub payload_length: u16,
    pub payload:        Vec<u8>,
}

impl Frame {
    pub fn kind(&self) -> FrameKind {
        if self.group_index == DESCRIPTOR_GROUP {
            FrameKind::Descriptor
        } else if self.shard_index < self.data_shards {
            FrameKind::Data
        } else {
            FrameKind::Parity
        }
    }

    /// Pool key: frames with equal slots describe the same physical symbol.
    pub fn slot(&self) -> (u64, u32, u16) {
        (self.archive_id, self.group_index, self.shard_index)
    }

    /// Total wire length of a frame for a given payload size.
    pub fn wire_len(payload_size: usize) -> usize {
        FRAME_OVERHEAD + payload_size
    }

    /// Serialize to the wire layout, computing the trailing CRC.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::wire_len(self.payload.len()));
        buf.extend_from_slice(FRAME_MAGIC);
        buf.push(FRAME_VERSION);
        // Vec<u8> is an infallible writer.
        buf.write_u64::<BigEndian>(self.archive_id).unwrap();
        buf.write_u32::<BigEndian>(self.group_index).unwrap();
        buf.write_u16::<BigEndian>(self.shard_index).unwrap();
        buf.write_u16::<BigEndian>(self.data_shards).unwrap();
        buf.write_u16::<BigEndian>(self.parity_shards).unwrap();
        buf.write_u16::<BigEndian>(self.payload_length).unwrap();
        buf.extend_from_slice(&self.payload);

        let mut hasher = Hasher::new();
        hasher.update(&buf);
        let crc = hasher.finalize();
        buf.write_u32::<BigEndian>(crc).unwrap();
        buf
    }

    /// Parse and verify one wire frame.
    ///
    /// Every failure here is `MalformedFrame`-category: the caller counts the
    /// input as unusable and moves on, it never aborts a decode run.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() <= FRAME_OVERHEAD {
            return Err(FrameError::Truncated { len: buf.len() });
        }
        if &buf[0..4] != FRAME_MAGIC {
            return Err(FrameError::BadMagic);
        }
        if buf[4] != FRAME_VERSION {
            return Err(FrameError::UnsupportedVersion(buf[4]));
        }

        let crc_offset = buf.len() - FRAME_TRAILER_SIZE;
        let mut hasher = Hasher::new();
        hasher.update(&buf[..crc_offset]);
        let computed = hasher.finalize();
        let stored = Cursor::new(&buf[crc_offset..]).read_u32::<BigEndian>()
            .map_err(|_| FrameError::Truncated { len: buf.len() })?;
        if stored != computed {
            return Err(FrameError::ChecksumMismatch { stored, computed });
        }

        let mut cur = Cursor::new(&buf[5..FRAME_HEADER_SIZE]);
        let archive_id     = cur.read_u64::<BigEndian>().unwrap();
        let group_index    = cur.read_u32::<BigEndian>().unwrap();
        let shard_index    = cur.read_u16::<BigEndian>().unwrap();
        let data_shards    = cur.read_u16::<BigEndian>().unwrap();
        let parity_shards  = cur.read_u16::<BigEndian>().unwrap();
        let payload_length = cur.read_u16::<BigEndian>().unwrap();

        if data_shards == 0 {
            return Err(FrameError::ShardCountInvalid { k: data_shards, m: parity_shards });
        }
        let total = data_shards.saturating_add(parity_shards);
        if group_index != DESCRIPTOR_GROUP && shard_index >= total {
            return Err(FrameError::ShardIndexOutOfRange { shard: shard_index, total });
        }

        let available = crc_offset - FRAME_HEADER_SIZE;
        if payload_length as usize > available {
            return Err(FrameError::PayloadLengthOutOfRange {
                declared:  payload_length,
                available,
            });
        }

        Ok(Frame {
            archive_id,
            group_index,
            shard_index,
            data_shards,
            parity_shards,
            payload_length,
            payload: buf[FRAME_HEADER_SIZE..crc_offset].to_vec(),
        })
    }
}
