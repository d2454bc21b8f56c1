//! Decode pipeline: an unordered, lossy, possibly-duplicated bag of scanned
//! frame strings in, the original file (or a precise failure report) out.
//!
//! The pipeline is a pure reduction over the input multiset. Ordering never
//! matters: frames land in a [`FramePool`] keyed by slot, groups reconstruct
//! independently, and the final assembly walks groups in index order.  The
//! whole run can be abandoned at any point with nothing to clean up beyond
//! in-memory state.
//!
//! # States
//!
//! | state | meaning |
//! |-------|---------|
//! | `Recovered` | every group reconstructed, whole-file digest verified |
//! | `PartiallyRecovered` | some groups lost; recovered byte ranges reported, no partial file emitted |
//! | `Failed` | descriptor missing/conflicting, digest mismatch, or nothing recovered |

pub mod pool;

pub use pool::{FramePool, InsertOutcome, SlotKey};

use serde::Serialize;
use std::ops::Range;
use thiserror::Error;

use crate::chunker;
use crate::descriptor::ArchiveDescriptor;
use crate::fec::{self, FecError};
use crate::frame::{Frame, FrameKind};

/// Why a decode run ended without a verified file.
#[derive(Error, Debug)]
pub enum FailureReason {
    #[error("no descriptor frame was recovered; archive parameters unknown")]
    DescriptorMissing,
    #[error("conflicting descriptor frames for archive {archive_id:016x}")]
    DescriptorConflict { archive_id: u64 },
    #[error("reassembled digest {actual} does not match descriptor digest {expected}")]
    ArchiveHashMismatch { expected: String, actual: String },
    #[error("none of the {total} shard groups could be reconstructed")]
    NoGroupsRecovered { total: u32 },
}

/// Aggregate accounting for one decode run.  Always produced, whatever the
/// outcome; serializable for tooling that scripts around paper recovery.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DecodeReport {
    /// Raw byte-strings handed in.
    pub inputs:       usize,
    /// Inputs discarded: framing/checksum failures, unparseable descriptor
    /// payloads, and frames whose geometry contradicts the descriptor.
    pub malformed:    usize,
    /// Re-scans: byte-identical frame for an already-filled slot.
    pub duplicates:   usize,
    /// Conflicting frame for an already-filled slot (kept the first).
    pub mismatches:   usize,
    /// Valid frames belonging to a different archive.
    pub foreign:      usize,
    /// Shard groups the descriptor says exist.
    pub groups_total:     u32,
    pub groups_recovered: u32,
    /// Group indices that fell below k available shards.
    pub unrecoverable_groups: Vec<u32>,
}

impl DecodeReport {
    /// One-line human summary for CLI output.
    pub fn summary(&self) -> String {
        format!(
            "{}/{} groups recovered, {} input(s): {} malformed, {} duplicate(s), \
             {} mismatch(es), {} foreign",
            self.groups_recovered,
            self.groups_total,
            self.inputs,
            self.malformed,
            self.duplicates,
            self.mismatches,
            self.foreign,
        )
    }
}

/// Terminal state of a decode run.
#[derive(Debug)]
pub enum DecodeOutcome {
    /// Byte-identical reconstruction, digest verified.
    Recovered { data: Vec<u8>, report: DecodeReport },
    /// Some groups reconstructed, some lost.  `recovered_ranges` are the
    /// byte ranges of the original file that the surviving groups cover;
    /// the caller decides whether a partial result is worth keeping.
    PartiallyRecovered {
        recovered_ranges: Vec<Range<u64>>,
        report:           DecodeReport,
    },
    /// Nothing trustworthy could be produced.
    Failed { reason: FailureReason, report: DecodeReport },
}

impl DecodeOutcome {
    pub fn report(&self) -> &DecodeReport {
        match self {
            DecodeOutcome::Recovered { report, .. }
            | DecodeOutcome::PartiallyRecovered { report, .. }
            | DecodeOutcome::Failed { report, .. } => report,
        }
    }

    pub fn is_recovered(&self) -> bool {
        matches!(self, DecodeOutcome::Recovered { .. })
    }
}

/// Collects scanned frame strings and reconstructs the archive.
///
/// The pool is explicit state with documented insert semantics, so tests can
/// drive reconstruction by building pools directly; `ingest` is merely
/// parse-then-insert.
#[derive(Debug, Default)]
pub struct Reassembler {
    pool:       FramePool,
    descriptor: Option<ArchiveDescriptor>,
    conflict:   bool,
    inputs:     usize,
    malformed:  usize,
    duplicates: usize,
    mismatches: usize,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a known descriptor (e.g. retained from encode).  In-stream
    /// descriptor frames must then agree with it.
    pub fn with_descriptor(descriptor: ArchiveDescriptor) -> Self {
        Self { descriptor: Some(descriptor), ..Self::default() }
    }

    /// Adopt a pre-built pool, for driving reconstruction directly in tests.
    pub fn from_pool(pool: FramePool, descriptor: ArchiveDescriptor) -> Self {
        Self { pool, descriptor: Some(descriptor), ..Self::default() }
    }

    pub fn descriptor(&self) -> Option<&ArchiveDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn pool(&self) -> &FramePool {
        &self.pool
    }

    /// Parse one raw scanned byte-string and pool it.  Malformed input is
    /// counted and dropped, never an error: one unreadable symbol must not
    /// abort the run.
    pub fn ingest(&mut self, raw: &[u8]) {
        self.inputs += 1;
        let parsed = Frame::from_bytes(raw);
        self.absorb(parsed);
    }

    /// Ingest a batch.  With the `parallel` feature, frame parsing and
    /// checksum verification run on Rayon workers; pooling stays a single
    /// sequential merge point with first-writer-wins slots.
    pub fn ingest_all(&mut self, inputs: &[Vec<u8>]) {
        self.inputs += inputs.len();

        #[cfg(feature = "parallel")]
        let parsed: Vec<_> = {
            use rayon::prelude::*;
            inputs.par_iter().map(|raw| Frame::from_bytes(raw)).collect()
        };

        #[cfg(not(feature = "parallel"))]
        let parsed: Vec<_> = inputs.iter().map(|raw| Frame::from_bytes(raw)).collect();

        for result in parsed {
            self.absorb(result);
        }
    }

    fn absorb(&mut self, parsed: Result<Frame, crate::frame::FrameError>) {
        let frame = match parsed {
            Ok(frame) => frame,
            Err(_) => {
                self.malformed += 1;
                return;
            }
        };

        if frame.kind() == FrameKind::Descriptor {
            match ArchiveDescriptor::from_bytes(&frame.payload[..frame.payload_length as usize]) {
                Ok(incoming) => match &self.descriptor {
                    None => self.descriptor = Some(incoming),
                    Some(known) if *known == incoming => {}
                    Some(known) => {
                        // A different descriptor for the same archive is an
                        // inconsistency; one for another archive is just a
                        // mixed-in scan and stays pooled as foreign.
                        if known.archive_id() == incoming.archive_id() {
                            self.conflict = true;
                        }
                    }
                },
                Err(_) => {
                    self.malformed += 1;
                    return;
                }
            }
        }

        match self.pool.insert(frame) {
            InsertOutcome::Inserted => {}
            InsertOutcome::Duplicate => self.duplicates += 1,
            InsertOutcome::Mismatch => self.mismatches += 1,
        }
    }

    /// Run per-group reconstruction and final assembly.
    pub fn finish(self) -> DecodeOutcome {
        let mut report = DecodeReport {
            inputs:     self.inputs,
            malformed:  self.malformed,
            duplicates: self.duplicates,
            mismatches: self.mismatches,
            ..DecodeReport::default()
        };

        let descriptor = match self.descriptor {
            Some(d) => d,
            None => {
                return DecodeOutcome::Failed {
                    reason: FailureReason::DescriptorMissing,
                    report,
                }
            }
        };
        let archive_id = descriptor.archive_id();

        if self.conflict {
            return DecodeOutcome::Failed {
                reason: FailureReason::DescriptorConflict { archive_id },
                report,
            };
        }

        report.groups_total = descriptor.group_count();
        report.foreign = self
            .pool
            .frames()
            .filter(|f| f.archive_id != archive_id)
            .count();

        // Frames of this archive claiming groups past the end cannot be
        // placed; count them with the malformed inputs.
        report.malformed += self
            .pool
            .frames()
            .filter(|f| {
                f.archive_id == archive_id
                    && f.kind() != FrameKind::Descriptor
                    && f.group_index >= report.groups_total
            })
            .count();

        // Per-group reconstruction: independent across groups once the pool
        // is stable, so groups fan out across Rayon workers when available.
        let groups = reconstruct_groups(&self.pool, &descriptor);

        let mut recovered: Vec<(u32, Vec<Vec<u8>>)> = Vec::new();
        for outcome in groups {
            report.malformed += outcome.rejected;
            match outcome.result {
                Ok(blocks) => recovered.push((outcome.group, blocks)),
                Err(_) => report.unrecoverable_groups.push(outcome.group),
            }
        }
        report.groups_recovered = recovered.len() as u32;

        if report.unrecoverable_groups.is_empty() {
            // Full assembly: groups are already in index order; drop filler
            // slots and truncate to the real file length.
            let k = descriptor.data_shards as u64;
            let payloads: Vec<Vec<u8>> = recovered
                .into_iter()
                .flat_map(|(g, blocks)| {
                    let base = g as u64 * k;
                    blocks
                        .into_iter()
                        .enumerate()
                        .map(move |(s, payload)| (base + s as u64, payload))
                })
                .filter(|(global, _)| !descriptor.is_filler(*global))
                .map(|(_, payload)| payload)
                .collect();

            let data = chunker::join(payloads, descriptor.file_length);
            let actual: [u8; 32] = blake3::hash(&data).into();
            if actual == descriptor.file_digest {
                return DecodeOutcome::Recovered { data, report };
            }
            return DecodeOutcome::Failed {
                reason: FailureReason::ArchiveHashMismatch {
                    expected: descriptor.digest_hex(),
                    actual:   hex::encode(actual),
                },
                report,
            };
        }

        if report.groups_recovered == 0 {
            return DecodeOutcome::Failed {
                reason: FailureReason::NoGroupsRecovered { total: report.groups_total },
                report,
            };
        }

        let ranges = recovered_ranges(
            recovered.iter().map(|(g, _)| *g),
            &descriptor,
        );
        DecodeOutcome::PartiallyRecovered { recovered_ranges: ranges, report }
    }
}

// ── Per-group reconstruction ─────────────────────────────────────────────────

struct GroupOutcome {
    group:    u32,
    /// Frames rejected for contradicting the descriptor's geometry.
    rejected: usize,
    result:   Result<Vec<Vec<u8>>, FecError>,
}

fn reconstruct_groups(pool: &FramePool, descriptor: &ArchiveDescriptor) -> Vec<GroupOutcome> {
    let total = descriptor.group_count();

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        (0..total)
            .into_par_iter()
            .map(|g| reconstruct_one(pool, descriptor, g))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        (0..total)
            .map(|g| reconstruct_one(pool, descriptor, g))
            .collect()
    }
}

fn reconstruct_one(pool: &FramePool, descriptor: &ArchiveDescriptor, group: u32) -> GroupOutcome {
    let k = descriptor.data_shards;
    let m = descriptor.parity_shards;
    let total = k + m;

    let mut rejected = 0usize;
    let shards: Vec<Option<Vec<u8>>> = pool
        .group_slots(descriptor.archive_id(), group, total)
        .into_iter()
        .map(|slot| {
            let frame = slot?;
            // The archive, not the frame, owns the group geometry: a frame
            // disagreeing on (k, m) or shard size is treated as malformed.
            if frame.data_shards != k
                || frame.parity_shards != m
                || frame.payload.len() != descriptor.payload_size as usize
            {
                rejected += 1;
                return None;
            }
            Some(frame.payload.clone())
        })
        .collect();

    GroupOutcome {
        group,
        rejected,
        result: fec::decode_group(group, shards, k, m),
    }
}

/// Byte ranges of the original file covered by the recovered groups, with
/// adjacent ranges merged.
fn recovered_ranges(
    groups: impl Iterator<Item = u32>,
    descriptor: &ArchiveDescriptor,
) -> Vec<Range<u64>> {
    let span = descriptor.data_shards as u64 * descriptor.payload_size as u64;
    let mut ranges: Vec<Range<u64>> = Vec::new();

    let mut sorted: Vec<u32> = groups.collect();
    sorted.sort_unstable();

    for g in sorted {
        let start = (g as u64 * span).min(descriptor.file_length);
        let end = ((g as u64 + 1) * span).min(descriptor.file_length);
        if start >= end {
            continue;
        }
        match ranges.last_mut() {
            Some(last) if last.end == start => last.end = end,
            _ => ranges.push(start..end),
        }
    }
    ranges
}
