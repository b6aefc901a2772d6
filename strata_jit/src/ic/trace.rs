//! GC tracing for IC tables.

use super::entry::IcScript;
use super::stub::StubRef;
use strata_gc::{Trace, Tracer};

/// Safety: every owned edge is reachable from an entry's chain, its fallback
/// payload or the retired part of the stub arena; all three are walked.
unsafe impl Trace for IcScript {
    fn trace(&self, tracer: &mut dyn Tracer) {
        let space = self.space();
        for entry in self.entries() {
            let mut cursor = entry.first_stub();
            while let StubRef::Specialized(id) = cursor {
                // A slot freed mid-unlink ends the walk.
                let Some(stub) = space.get(id) else {
                    break;
                };
                stub.trace(tracer);
                cursor = stub.next();
            }
            entry.fallback_stub().trace(tracer);
        }
        space.trace(tracer);
    }

    fn size_of(&self) -> usize {
        std::mem::size_of::<Self>() + self.space().capacity() * std::mem::size_of::<super::SpecializedStub>()
    }
}
