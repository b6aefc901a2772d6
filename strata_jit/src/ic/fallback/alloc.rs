//! Allocation sites. These own a template object in the fallback payload.

use super::{attach_after, enter, expect_kind};
use crate::ic::entry::{IcEntry, IcScript};
use crate::ic::generator::IcInputs;
use crate::ic::kind::FallbackKind;
use crate::ic::op::Operand;
use crate::ic::runtime::IcRuntime;
use crate::ic::stub::FallbackPayload;
use strata_core::{StrataError, StrataResult, Value};
use strata_runtime::InitialHeap;

/// No inputs; the length comes from the operand. Never attaches.
pub(super) fn do_new_array(
    script: &IcScript,
    entry: &IcEntry,
    _inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::NewArray]);
    enter(script, entry, rt);

    let Operand::Length(length) = *entry.operand() else {
        return Err(StrataError::internal("NewArray without a length operand"));
    };
    let fallback = entry.fallback_stub();
    if fallback.payload().template().is_none() {
        let template = rt.new_array(length, InitialHeap::Tenured)?;
        fallback.set_payload(FallbackPayload::NewArray {
            template: Some(template),
        });
    }

    Ok(Value::Object(rt.new_array(length, InitialHeap::Default)?))
}

/// No inputs. The generator sees `[template]`.
pub(super) fn do_new_object(
    script: &IcScript,
    entry: &IcEntry,
    _inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::NewObject]);
    enter(script, entry, rt);

    let fallback = entry.fallback_stub();
    if let Some(template) = fallback.payload().template() {
        return Ok(Value::Object(
            rt.new_object_from_template(template, InitialHeap::Default)?,
        ));
    }

    let obj = rt.new_plain_object(InitialHeap::Default)?;
    let template = rt.new_object_from_template(obj, InitialHeap::Tenured)?;
    let result = Value::Object(obj);
    attach_after(script, entry, &IcInputs::unary(Value::Object(template)), &result, rt);
    fallback.set_payload(FallbackPayload::NewObject {
        template: Some(template),
    });

    Ok(result)
}

/// Argument list only. Never attaches; the template made at script creation
/// stays in place.
pub(super) fn do_rest(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::Rest]);
    enter(script, entry, rt);

    let Operand::Formals(formals) = *entry.operand() else {
        return Err(StrataError::internal("Rest without a formals operand"));
    };
    let rest = inputs.args().get(usize::from(formals)..).unwrap_or(&[]);
    Ok(Value::Object(rt.new_dense_array(rest)?))
}
