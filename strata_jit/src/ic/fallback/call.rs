//! Call handlers.
//!
//! Regular calls take `[callee, this, new_target]` plus the argument list.
//! Spread calls take `[callee, this, array, new_target]`.

use super::{attach_before, enter, expect_kind, link_pending};
use crate::ic::entry::{IcEntry, IcScript};
use crate::ic::generator::IcInputs;
use crate::ic::kind::FallbackKind;
use crate::ic::op::Op;
use crate::ic::runtime::IcRuntime;
use strata_core::{StrataError, StrataResult, Value};

pub(super) fn do_call(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::Call, FallbackKind::CallConstructing]);
    enter(script, entry, rt);

    let op = entry.op();
    let callee = inputs.operand(0)?.clone();
    let this = inputs.operand(1)?.clone();
    let new_target = inputs.operand(2)?.clone();
    let args = inputs.args().to_vec();

    let pending = attach_before(script, entry, inputs, rt);

    let result = if op.is_constructing() {
        rt.construct(&callee, &args, &new_target)?
    } else if op.is_eval() && rt.is_eval_function(&callee) {
        let source = args.first().cloned().unwrap_or(Value::Undefined);
        rt.direct_eval(&source, op.is_strict())?
    } else {
        if op == Op::CallIter && callee.is_primitive() {
            return Err(StrataError::type_error(format!(
                "{} is not iterable",
                callee.tag_name()
            )));
        }
        rt.call(&callee, &this, &args)?
    };

    link_pending(script, entry, pending, rt);
    Ok(result)
}

pub(super) fn do_spread_call(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(
        entry,
        &[FallbackKind::SpreadCall, FallbackKind::SpreadCallConstructing],
    );
    enter(script, entry, rt);

    let op = entry.op();
    let callee = inputs.operand(0)?.clone();
    let this = inputs.operand(1)?.clone();
    let Value::Object(array) = *inputs.operand(2)? else {
        return Err(StrataError::internal("spread arguments must be an array"));
    };
    let new_target = inputs.operand(3)?.clone();
    let args = rt.dense_elements(array)?;

    // Spread evals never attach.
    let pending = if op.is_eval() {
        None
    } else {
        attach_before(script, entry, inputs, rt)
    };

    let result = if op.is_constructing() {
        rt.construct(&callee, &args, &new_target)?
    } else if op.is_eval() && rt.is_eval_function(&callee) {
        let source = args.first().cloned().unwrap_or(Value::Undefined);
        rt.direct_eval(&source, op.is_strict())?
    } else {
        rt.call(&callee, &this, &args)?
    };

    link_pending(script, entry, pending, rt);
    Ok(result)
}
