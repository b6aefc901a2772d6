//! Baseline-tier inline-cache runtime for Strata.
//!
//! Per-callsite stub chains with:
//! - Forward-only attachment state (Specialized → Megamorphic → Generic)
//! - Fallback dispatch that always runs the generic operation
//! - Deferred add-slot attachment for property writes
//! - Barriered unlink and precise tracing of stubs and templates
//! - Process-wide fallback trampolines and telemetry counters
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod ic;

pub use ic::{
    AttachDecision, FallbackKind, IcConfig, IcEntry, IcInputs, IcMode, IcRuntime, IcScript,
    IcSite, IcState, Op,
};
