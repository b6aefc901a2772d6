//! # Strata GC
//!
//! The collector-facing contracts used by the rest of the runtime:
//!
//! - **Tracing**: [`Trace`] / [`Tracer`], the edge-reporting protocol
//! - **Barriers**: [`WriteBarrier`] pre-write hooks and the SATB capture
//!   buffers behind [`SatbBarrier`]
//!
//! Allocation and reclamation belong to whoever owns the heap; this crate
//! only fixes how holders report and release edges.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod barrier;
pub mod trace;

pub use barrier::{CountingBarrier, NoBarrier, SatbBarrier, WriteBarrier};
pub use trace::{CellRef, CodeId, EdgeCollector, Trace, Tracer};
