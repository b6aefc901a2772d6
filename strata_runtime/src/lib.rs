//! # Strata Runtime
//!
//! The reference object model behind the inline-cache layer:
//!
//! - **Shapes**: a transition tree ([`ShapeTable`]) shared by all objects
//! - **Objects**: slot-vector objects, dense arrays, native functions and scopes
//! - **Heap**: an index arena with a mark/sweep collector driven by [`strata_gc::Trace`]
//! - **Generic operations**: [`ObjectOps`], the always-correct slow path,
//!   implemented by [`Realm`]

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod convert;
pub mod heap;
pub mod object;
pub mod ops;
pub mod realm;
pub mod shape;

pub use heap::{CollectStats, ObjectHeap};
pub use object::{FunctionData, JsObject, NativeFn, ObjectKind};
pub use ops::{BinaryOp, CompareOp, InitialHeap, JsType, ObjectOps, PrivateFieldCheck, UnaryOp};
pub use realm::Realm;

#[doc(hidden)]
pub use strata_core as __core;
pub use shape::{ObjectClass, PropertyDescriptor, PropertyFlags, Shape, ShapeTable};
