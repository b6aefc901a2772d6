//! Operators. The result is computed first so the generator can specialize
//! on the observed output type.

use super::{attach_after, enter, expect_kind};
use crate::ic::entry::{IcEntry, IcScript};
use crate::ic::generator::IcInputs;
use crate::ic::kind::FallbackKind;
use crate::ic::runtime::IcRuntime;
use strata_core::{StrataResult, Value};

/// `[value]`
pub(super) fn do_unary_arith(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::UnaryArith]);
    enter(script, entry, rt);

    let Some(op) = entry.op().unary_op() else {
        unreachable!("{} is not a unary operator", entry.op());
    };
    let value = inputs.operand(0)?.clone();
    let result = rt.unary_arith(op, &value)?;

    attach_after(script, entry, inputs, &result, rt);
    Ok(result)
}

/// `[lhs, rhs]`
pub(super) fn do_binary_arith(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::BinaryArith]);
    enter(script, entry, rt);

    let Some(op) = entry.op().binary_op() else {
        unreachable!("{} is not a binary operator", entry.op());
    };
    let lhs = inputs.operand(0)?.clone();
    let rhs = inputs.operand(1)?.clone();
    let result = rt.binary_arith(op, &lhs, &rhs)?;

    attach_after(script, entry, inputs, &result, rt);
    Ok(result)
}

/// `[lhs, rhs]`
pub(super) fn do_compare(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::Compare]);
    enter(script, entry, rt);

    let Some(op) = entry.op().compare_op() else {
        unreachable!("{} is not a comparison", entry.op());
    };
    let lhs = inputs.operand(0)?.clone();
    let rhs = inputs.operand(1)?.clone();
    let result = Value::Bool(rt.compare(op, &lhs, &rhs)?);

    attach_after(script, entry, inputs, &result, rt);
    Ok(result)
}
