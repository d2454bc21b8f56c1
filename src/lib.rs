pub mod assembler;
pub mod chunker;
pub mod descriptor;
pub mod fec;
pub mod frame;
pub mod recover;

pub use assembler::{assemble, EncodeError, EncodeParams};
pub use descriptor::ArchiveDescriptor;
pub use frame::{Frame, FrameError, FrameKind};
pub use recover::{DecodeOutcome, DecodeReport, FailureReason, FramePool, Reassembler};
