//! The runtime handle threaded through dispatch.

use super::generator::{GeneratorRegistry, StubCompiler};
use strata_gc::WriteBarrier;
use strata_runtime::ObjectOps;

/// Object model plus the IC collaborators.
///
/// The same `&mut dyn IcRuntime` is handed to every nested dispatch, so a
/// generic operation that re-enters an IC needs no second handle.
pub trait IcRuntime: ObjectOps {
    /// Description generators.
    fn generators(&self) -> &GeneratorRegistry;

    /// Stub compiler.
    fn compiler(&mut self) -> &mut dyn StubCompiler;

    /// Barrier run before chain edges are removed.
    fn write_barrier(&mut self) -> &mut dyn WriteBarrier;
}
