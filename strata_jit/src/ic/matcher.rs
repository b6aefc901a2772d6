//! Hot path: run the chain, then the fallback.

use super::entry::{IcEntry, IcScript};
use super::fallback::dispatch;
use super::generator::IcInputs;
use super::runtime::IcRuntime;
use super::stub::{JitCode, StubData, StubId, StubOutcome, StubRef};
use super::telemetry::global_ic_telemetry;
use std::rc::Rc;
use strata_core::{StrataResult, Value};

/// Execute `entry` on `inputs`.
///
/// Each specialized stub is tried in chain order; the first hit wins. When
/// every stub misses, the entry's fallback handler runs. No borrow of the
/// stub arena is held while stub code runs, so stubs may re-enter.
///
/// # Panics
///
/// Panics when the walk reaches a poisoned stub.
pub fn run(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    let telemetry = global_ic_telemetry();
    let mut cursor = entry.first_stub();
    while let StubRef::Specialized(id) = cursor {
        let (code, data, next) = snapshot(script, id);
        match code.invoke(&data, inputs, rt)? {
            StubOutcome::Hit(value) => {
                telemetry.record_chain_hit();
                return Ok(value);
            }
            StubOutcome::Miss => {
                telemetry.record_chain_miss();
                cursor = next;
            }
        }
    }
    dispatch(script, entry, inputs, rt)
}

fn snapshot(script: &IcScript, id: StubId) -> (Rc<JitCode>, Rc<StubData>, StubRef) {
    let space = script.space();
    let Some(stub) = space.get(id) else {
        panic!("chain references free stub slot {id:?}");
    };
    let Some(code) = stub.code() else {
        panic!("chain reached poisoned stub {id:?} ({})", stub.template());
    };
    (Rc::clone(code), Rc::clone(&stub.data), stub.next())
}
