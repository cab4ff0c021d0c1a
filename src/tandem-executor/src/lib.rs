//! Striped worker fan-out for index-parallel computations.
//!
//! # Motivation
//!
//! Elementwise array work splits naturally across processor cores as
//! long as no two workers ever touch the same cell. This crate provides
//! the machinery for exactly that and nothing more.
//!
//! # Design
//!
//! The calling thread acts as the coordinator. It allocates the result
//! container, deals its cells into one stripe per worker (index `i` goes
//! to worker `i % n`) and spawns a thread per stripe. Every worker holds
//! a [`Completion`] guard for a shared [`JoinBarrier`], and the
//! coordinator only hands the container back once the barrier has seen
//! all of them.
//!
//! Since every stripe is a set of exclusive `&mut` borrows, the result
//! container is never locked.

#![deny(rust_2018_idioms, rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod barrier;
pub use barrier::*;

mod executor;
pub use executor::*;
