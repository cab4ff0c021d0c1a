//! Overlapping the read and write halves of a stream copy.
//!
//! # Design
//!
//! A [`Relay`] runs two stages on background threads: one reads the
//! origin and feeds a [`BoundedPipe`], the other drains the pipe into
//! the destination. The pipe holds at most [`PIPE_CAPACITY`] bytes, so
//! a fast reader never outruns a slow writer by more than that.
//!
//! The calling thread waits for both stages to report back before it
//! returns, and failures of either stage are handed back together in a
//! single [`RelayError`].
//!
//! [`copy_sequential`] does the same job on the current thread and
//! serves as a baseline.

#![deny(rust_2018_idioms, rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Size of the chunk buffer each copy loop reads into.
pub const CHUNK_SIZE: usize = 0x10000;

mod copy;
pub use copy::*;

mod pipe;
pub use pipe::*;

mod relay;
pub use relay::*;
