//! Archive-level descriptor: everything the decoder needs to know when
//! reconstruction is complete.
//!
//! Created once at encode start and immutable thereafter.  The descriptor
//! rides inside reserved frames (see [`crate::frame::DESCRIPTOR_GROUP`]) so
//! it survives the same print/scan channel as the shards; the assembler
//! emits it first and last in the frame sequence so losing either end of a
//! printed document still leaves one copy.
//!
//! The wire form is a fixed 62-byte big-endian layout rather than anything
//! self-describing: it must fit inside a single frame payload even at the
//! smallest payload sizes worth printing.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor};
use thiserror::Error;

/// Serialized descriptor length: digest + length + geometry + blocks + time.
pub const DESCRIPTOR_WIRE_SIZE: usize = 32 + 8 + 2 + 2 + 2 + 8 + 8;

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("descriptor payload is {0} bytes, expected {DESCRIPTOR_WIRE_SIZE}")]
    WrongLength(usize),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Immutable per-archive metadata carried by descriptor frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveDescriptor {
    /// BLAKE3 of the whole original file.
    pub file_digest:   [u8; 32],
    /// Original file length in bytes.
    pub file_length:   u64,
    /// Bytes per data block, fixed for the archive.
    pub payload_size:  u16,
    /// k: data shards per group.
    pub data_shards:   u16,
    /// m: parity shards per group.
    pub parity_shards: u16,
    /// Real (non-filler) data blocks in the archive.
    pub total_blocks:  u64,
    /// Encode wall-clock time, Unix seconds.  Informational only.
    pub created_unix:  i64,
}

impl ArchiveDescriptor {
    /// Truncated digest used to disambiguate mixed scans: the first 8 digest
    /// bytes, big-endian.
    pub fn archive_id(&self) -> u64 {
        u64::from_be_bytes(self.file_digest[..8].try_into().unwrap())
    }

    /// Number of shard groups (the last one padded with filler blocks).
    pub fn group_count(&self) -> u32 {
        self.total_blocks.div_ceil(self.data_shards as u64) as u32
    }

    /// True if the data slot at `global_index` is deterministic filler
    /// rather than file content.
    pub fn is_filler(&self, global_index: u64) -> bool {
        global_index >= self.total_blocks
    }

    /// Real bytes in the block at `global_index`.
    pub fn block_length(&self, global_index: u64) -> usize {
        if self.is_filler(global_index) {
            return 0;
        }
        if global_index + 1 < self.total_blocks {
            return self.payload_size as usize;
        }
        // Final block: whatever the file length leaves over.
        let full = (self.total_blocks - 1) * self.payload_size as u64;
        (self.file_length - full) as usize
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.file_digest)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(DESCRIPTOR_WIRE_SIZE);
        buf.extend_from_slice(&self.file_digest);
        // Vec<u8> is an infallible writer.
        buf.write_u64::<BigEndian>(self.file_length).unwrap();
        buf.write_u16::<BigEndian>(self.payload_size).unwrap();
        buf.write_u16::<BigEndian>(self.data_shards).unwrap();
        buf.write_u16::<BigEndian>(self.parity_shards).unwrap();
        buf.write_u64::<BigEndian>(self.total_blocks).unwrap();
        buf.write_i64::<BigEndian>(self.created_unix).unwrap();
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DescriptorError> {
        if bytes.len() != DESCRIPTOR_WIRE_SIZE {
            return Err(DescriptorError::WrongLength(bytes.len()));
        }
        let mut file_digest = [0u8; 32];
        file_digest.copy_from_slice(&bytes[..32]);
        let mut cur = Cursor::new(&bytes[32..]);
        Ok(Self {
            file_digest,
            file_length:   cur.read_u64::<BigEndian>()?,
            payload_size:  cur.read_u16::<BigEndian>()?,
            data_shards:   cur.read_u16::<BigEndian>()?,
            parity_shards: cur.read_u16::<BigEndian>()?,
            total_blocks:  cur.read_u64::<BigEndian>()?,
            created_unix:  cur.read_i64::<BigEndian>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ArchiveDescriptor {
        ArchiveDescriptor {
            file_digest:   blake3::hash(b"sample").into(),
            file_length:   257,
            payload_size:  100,
            data_shards:   3,
            parity_shards: 1,
            total_blocks:  3,
            created_unix:  1_700_000_000,
        }
    }

    #[test]
    fn archive_id_is_leading_digest_bytes() {
        let d = descriptor();
        let expected = u64::from_be_bytes(d.file_digest[..8].try_into().unwrap());
        assert_eq!(d.archive_id(), expected);
    }

    #[test]
    fn group_and_filler_accounting() {
        let mut d = descriptor();
        assert_eq!(d.group_count(), 1);
        assert!(!d.is_filler(2));
        assert!(d.is_filler(3));

        // 4 blocks over k=3 needs a second, mostly-filler group.
        d.file_length = 310;
        d.total_blocks = 4;
        assert_eq!(d.group_count(), 2);
        assert!(d.is_filler(4));
        assert!(d.is_filler(5));
    }

    #[test]
    fn block_lengths() {
        let d = descriptor();
        assert_eq!(d.block_length(0), 100);
        assert_eq!(d.block_length(1), 100);
        assert_eq!(d.block_length(2), 57);
        assert_eq!(d.block_length(3), 0); // filler

        // Empty file: one block, zero real bytes.
        let empty = ArchiveDescriptor {
            file_digest:   blake3::hash(b"").into(),
            file_length:   0,
            payload_size:  100,
            data_shards:   3,
            parity_shards: 1,
            total_blocks:  1,
            created_unix:  0,
        };
        assert_eq!(empty.block_length(0), 0);
    }

    #[test]
    fn wire_roundtrip() {
        let d = descriptor();
        let wire = d.to_bytes();
        assert_eq!(wire.len(), DESCRIPTOR_WIRE_SIZE);
        assert_eq!(ArchiveDescriptor::from_bytes(&wire).unwrap(), d);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let wire = descriptor().to_bytes();
        assert!(matches!(
            ArchiveDescriptor::from_bytes(&wire[..DESCRIPTOR_WIRE_SIZE - 1]),
            Err(DescriptorError::WrongLength(_))
        ));
        assert!(matches!(
            ArchiveDescriptor::from_bytes(&[]),
            Err(DescriptorError::WrongLength(0))
        ));
    }
}
