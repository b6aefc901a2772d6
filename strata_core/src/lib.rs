//! # Strata Core
//!
//! Core types shared by every Strata crate:
//!
//! - **Values**: the tagged [`Value`] enum, object handles and property keys
//! - **Interning**: atoms for property names with O(1) equality
//! - **Shapes**: opaque [`ShapeId`] identities compared by inline caches
//! - **Errors**: language-level exceptions ([`StrataError`])

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod intern;
pub mod shape;
pub mod value;

pub use error::{ErrorKind, StrataError, StrataResult};
pub use intern::{InternedString, StringInterner, intern, intern_owned};
pub use shape::ShapeId;
pub use value::{ObjectRef, PropertyKey, Symbol, Value};

/// Strata runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
