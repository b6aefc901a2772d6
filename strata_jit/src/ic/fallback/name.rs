//! Scope lookups. `GetName` and `BindName` take `[env]`; `GetIntrinsic`
//! takes nothing.

use super::{
    attach_after, attach_before, enter, expect_kind, link_pending, name_operand, object_operand,
};
use crate::ic::entry::{IcEntry, IcScript};
use crate::ic::generator::IcInputs;
use crate::ic::kind::FallbackKind;
use crate::ic::runtime::IcRuntime;
use strata_core::{StrataResult, Value};

pub(super) fn do_get_name(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::GetName]);
    enter(script, entry, rt);

    let name = name_operand(entry)?;
    let env = object_operand(inputs.operand(0)?, "environment")?;
    let pending = attach_before(script, entry, inputs, rt);

    let result = rt.get_name(env, &name)?;

    link_pending(script, entry, pending, rt);
    Ok(result)
}

pub(super) fn do_bind_name(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::BindName]);
    enter(script, entry, rt);

    let name = name_operand(entry)?;
    let env = object_operand(inputs.operand(0)?, "environment")?;
    let pending = attach_before(script, entry, inputs, rt);

    let scope = rt.bind_name(env, &name)?;

    link_pending(script, entry, pending, rt);
    Ok(Value::Object(scope))
}

pub(super) fn do_get_intrinsic(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::GetIntrinsic]);
    enter(script, entry, rt);

    let name = name_operand(entry)?;
    let result = rt.get_intrinsic(&name)?;

    attach_after(script, entry, inputs, &result, rt);
    Ok(result)
}
