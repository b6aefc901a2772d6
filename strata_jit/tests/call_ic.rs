//! End-to-end tests for call and allocation caches.
//!
//! Coverage:
//! - Callee-identity stubs for calls and constructor calls
//! - Direct eval, spread calls and iterator calls on primitives
//! - Rest arrays, array literals and object literal templates

mod support;

use std::cell::Cell;
use std::rc::Rc;
use strata_core::{StrataResult, Value};
use strata_jit::ic::{
    AttachDecision, AttachRequest, CacheKind, FallbackPayload, IcInputs, IcRuntime, IcSite, Op,
};
use strata_runtime::{ObjectOps, Realm};
use support::{
    CALL_IDENTITY, FnGenerator, SPREAD_CALL_IDENTITY, TestRuntime, chain_templates,
    reference_generators,
};

fn sum(_realm: &mut Realm, _this: &Value, args: &[Value]) -> StrataResult<Value> {
    Ok(Value::Int32(args.iter().filter_map(Value::as_int32).sum()))
}

// =============================================================================
// Calls
// =============================================================================

#[test]
fn test_call_attaches_on_callee_identity() {
    let mut rt = TestRuntime::new();
    let script = rt.script(&[IcSite::call(0, Op::Call, 2)]);
    let f = rt.realm.new_function("sum", sum);
    let inputs = IcInputs::call(
        Value::Object(f),
        Value::Undefined,
        vec![Value::Int32(1), Value::Int32(2)],
    );

    assert_eq!(rt.run(&script, 0, &inputs).unwrap(), Value::Int32(3));
    assert_eq!(chain_templates(&script, 0), vec![CALL_IDENTITY]);
    assert_eq!(rt.run(&script, 0, &inputs).unwrap(), Value::Int32(3));
    assert_eq!(script.entries()[0].fallback_stub().entered_count(), 1);

    let g = rt.realm.new_function("sum2", sum);
    let other = IcInputs::call(Value::Object(g), Value::Undefined, vec![Value::Int32(5)]);
    assert_eq!(rt.run(&script, 0, &other).unwrap(), Value::Int32(5));
    assert_eq!(script.chain_len(&script.entries()[0]), 2);
}

#[test]
fn test_call_stub_not_poisoned_on_unlink() {
    let mut rt = TestRuntime::new();
    let script = rt.script(&[IcSite::call(0, Op::Call, 0)]);
    let f = rt.realm.new_function("sum", sum);
    rt.run(
        &script,
        0,
        &IcInputs::call(Value::Object(f), Value::Undefined, Vec::new()),
    )
    .unwrap();
    let ids = script.stub_ids(&script.entries()[0]);
    script.reset(&mut rt.barrier);

    let space = script.space();
    let stub = space.get(ids[0]).expect("retired stub kept until purge");
    assert!(space.is_retired(ids[0]));
    assert!(stub.makes_gc_calls());
    assert!(!stub.is_poisoned());
}

#[test]
fn test_construct_uses_new_target_prototype() {
    let mut rt = TestRuntime::new();
    let script = rt.script(&[IcSite::call(0, Op::New, 0)]);
    let ctor = rt.realm.new_constructor("Point", |realm, this, _| {
        if let Some(obj) = this.as_object() {
            realm.put(obj, "x", Value::Int32(1));
        }
        Ok(Value::Undefined)
    });
    let inputs = IcInputs::construct(Value::Object(ctor), Vec::new(), Value::Object(ctor));

    let result = rt.run(&script, 0, &inputs).unwrap();
    let obj = result.as_object().expect("constructed object");
    assert_eq!(rt.realm.get(obj, "x").unwrap(), Value::Int32(1));
    assert!(rt.realm.instance_of(&result, ctor).unwrap());
    assert_eq!(chain_templates(&script, 0), vec![CALL_IDENTITY]);

    let second = rt.run(&script, 0, &inputs).unwrap();
    assert_ne!(second, result);
    assert_eq!(script.entries()[0].fallback_stub().entered_count(), 1);
}

#[test]
fn test_direct_eval_never_attaches() {
    let mut rt = TestRuntime::new();
    let script = rt.script(&[IcSite::call(0, Op::Eval, 1)]);
    let global = rt.realm.global();
    let eval = rt.realm.get(global, "eval").unwrap();
    let inputs = IcInputs::call(eval, Value::Undefined, vec![Value::string("42")]);

    let result = rt.run(&script, 0, &inputs).unwrap();
    assert_eq!(result.as_number(), Some(42.0));
    assert_eq!(script.chain_len(&script.entries()[0]), 0);
}

#[test]
fn test_eval_op_with_other_callee_is_plain_call() {
    let mut rt = TestRuntime::new();
    let script = rt.script(&[IcSite::call(0, Op::Eval, 1)]);
    let f = rt.realm.new_function("sum", sum);
    let inputs = IcInputs::call(Value::Object(f), Value::Undefined, vec![Value::Int32(8)]);
    assert_eq!(rt.run(&script, 0, &inputs).unwrap(), Value::Int32(8));
}

#[test]
fn test_call_iter_on_primitive_is_type_error() {
    let mut rt = TestRuntime::new();
    let script = rt.script(&[IcSite::call(0, Op::CallIter, 0)]);
    let err = rt
        .run(
            &script,
            0,
            &IcInputs::call(Value::Int32(1), Value::Undefined, Vec::new()),
        )
        .unwrap_err();
    assert!(err.is_type_error());
    assert!(err.to_string().contains("is not iterable"));
}

#[test]
fn test_call_non_callable_throws() {
    let mut rt = TestRuntime::new();
    let script = rt.script(&[IcSite::call(0, Op::Call, 0)]);
    let obj = rt.object(&[]);
    let err = rt
        .run(
            &script,
            0,
            &IcInputs::call(Value::Object(obj), Value::Undefined, Vec::new()),
        )
        .unwrap_err();
    assert!(err.is_type_error());
    assert_eq!(script.chain_len(&script.entries()[0]), 0);
}

// =============================================================================
// Spread Calls
// =============================================================================

#[test]
fn test_spread_call_passes_array_elements() {
    let mut rt = TestRuntime::new();
    let script = rt.script(&[IcSite::new(0, Op::SpreadCall)]);
    let f = rt.realm.new_function("sum", sum);
    let array = rt.realm.new_array_from(&[Value::Int32(4), Value::Int32(6)]);
    let inputs = IcInputs::spread(
        Value::Object(f),
        Value::Undefined,
        Value::Object(array),
        Value::Undefined,
    );
    assert_eq!(rt.run(&script, 0, &inputs).unwrap(), Value::Int32(10));
}

#[test]
fn test_spread_call_attaches_then_hits() {
    let mut rt = TestRuntime::new();
    let script = rt.script(&[IcSite::new(0, Op::SpreadCall)]);
    let f = rt.realm.new_function("sum", sum);
    let array = rt.realm.new_array_from(&[Value::Int32(1), Value::Int32(2)]);
    let inputs = IcInputs::spread(
        Value::Object(f),
        Value::Undefined,
        Value::Object(array),
        Value::Undefined,
    );

    assert_eq!(rt.run(&script, 0, &inputs).unwrap(), Value::Int32(3));
    assert_eq!(chain_templates(&script, 0), vec![SPREAD_CALL_IDENTITY]);

    let longer = rt.realm.new_array_from(&[Value::Int32(1), Value::Int32(2), Value::Int32(4)]);
    let inputs = IcInputs::spread(
        Value::Object(f),
        Value::Undefined,
        Value::Object(longer),
        Value::Undefined,
    );
    assert_eq!(rt.run(&script, 0, &inputs).unwrap(), Value::Int32(7));
    assert_eq!(script.entries()[0].fallback_stub().entered_count(), 1);
}

#[test]
fn test_spread_construct_uses_new_target_and_elements() {
    let mut rt = TestRuntime::new();
    let script = rt.script(&[IcSite::new(0, Op::SpreadNew), IcSite::new(1, Op::SpreadSuperCall)]);
    let ctor = rt.realm.new_constructor("Pair", |realm, this, args| {
        if let Some(obj) = this.as_object() {
            realm.put(obj, "a", args.first().cloned().unwrap_or(Value::Undefined));
            realm.put(obj, "b", args.get(1).cloned().unwrap_or(Value::Undefined));
        }
        Ok(Value::Undefined)
    });
    let array = rt.realm.new_array_from(&[Value::Int32(5), Value::Int32(6)]);
    // `this` is ignored when constructing.
    let other = rt.object(&[]);
    let inputs = IcInputs::spread(
        Value::Object(ctor),
        Value::Object(other),
        Value::Object(array),
        Value::Object(ctor),
    );

    for index in 0..2 {
        let first = rt.run(&script, index, &inputs).unwrap();
        let obj = first.as_object().expect("constructed object");
        assert_ne!(obj, other);
        assert_eq!(rt.realm.get(obj, "a").unwrap(), Value::Int32(5));
        assert_eq!(rt.realm.get(obj, "b").unwrap(), Value::Int32(6));
        assert!(rt.realm.instance_of(&first, ctor).unwrap());
        assert_eq!(chain_templates(&script, index), vec![SPREAD_CALL_IDENTITY]);

        let second = rt.run(&script, index, &inputs).unwrap();
        assert_ne!(second, first);
        assert!(rt.realm.instance_of(&second, ctor).unwrap());
        assert_eq!(script.entries()[index].fallback_stub().entered_count(), 1);
    }
}

#[test]
fn test_spread_construct_non_constructor_throws() {
    let mut rt = TestRuntime::new();
    let script = rt.script(&[IcSite::new(0, Op::SpreadNew)]);
    let obj = rt.object(&[]);
    let array = rt.realm.new_array_from(&[]);
    let err = rt
        .run(
            &script,
            0,
            &IcInputs::spread(
                Value::Object(obj),
                Value::Undefined,
                Value::Object(array),
                Value::Object(obj),
            ),
        )
        .unwrap_err();
    assert!(err.is_type_error());
    assert_eq!(script.chain_len(&script.entries()[0]), 0);
}

#[test]
fn test_spread_eval_skips_generator() {
    let asked = Rc::new(Cell::new(0));
    let counter = Rc::clone(&asked);
    let mut registry = reference_generators();
    registry.register(
        CacheKind::Call,
        FnGenerator(move |_: &AttachRequest, _: &dyn IcRuntime| {
            counter.set(counter.get() + 1);
            AttachDecision::NoAction
        }),
    );
    let mut rt = TestRuntime::with_generators(registry);
    let script = rt.script(&[IcSite::new(0, Op::SpreadEval), IcSite::new(1, Op::SpreadCall)]);
    let f = rt.realm.new_function("sum", sum);
    let array = rt.realm.new_array_from(&[Value::Int32(2)]);
    let inputs = IcInputs::spread(
        Value::Object(f),
        Value::Undefined,
        Value::Object(array),
        Value::Undefined,
    );

    assert_eq!(rt.run(&script, 0, &inputs).unwrap(), Value::Int32(2));
    assert_eq!(asked.get(), 0);
    assert!(!script.entries()[0].state().has_failures());

    assert_eq!(rt.run(&script, 1, &inputs).unwrap(), Value::Int32(2));
    assert_eq!(asked.get(), 1);
}

// =============================================================================
// Allocation
// =============================================================================

#[test]
fn test_rest_collects_trailing_arguments() {
    let mut rt = TestRuntime::new();
    let script = rt.script(&[IcSite::rest(0, 1)]);
    let args = vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)];

    let rest = rt.run(&script, 0, &IcInputs::with_args(args)).unwrap();
    let rest = rest.as_object().expect("rest array");
    assert_eq!(
        rt.realm.dense_elements(rest).unwrap(),
        vec![Value::Int32(2), Value::Int32(3)]
    );

    let empty = rt
        .run(&script, 0, &IcInputs::with_args(vec![Value::Int32(1)]))
        .unwrap();
    let empty = empty.as_object().expect("rest array");
    assert!(rt.realm.dense_elements(empty).unwrap().is_empty());
    assert_eq!(script.chain_len(&script.entries()[0]), 0);
}

#[test]
fn test_new_array_creates_tenured_template_once() {
    let mut rt = TestRuntime::new();
    let script = rt.script(&[IcSite::new_array(0, 3)]);
    assert!(script.entries()[0].fallback_stub().payload().template().is_none());

    let first = rt.run(&script, 0, &IcInputs::none()).unwrap();
    let template = script.entries()[0]
        .fallback_stub()
        .payload()
        .template()
        .expect("template after first run");
    assert!(rt.realm.object(template).unwrap().tenured);
    assert_ne!(first.as_object(), Some(template));
    let array = first.as_object().expect("array");
    assert_eq!(rt.realm.dense_elements(array).unwrap().len(), 3);

    rt.run(&script, 0, &IcInputs::none()).unwrap();
    assert_eq!(
        script.entries()[0].fallback_stub().payload().template(),
        Some(template)
    );
}

#[test]
fn test_new_object_asks_generator_once_with_template() {
    let seen = Rc::new(Cell::new(0));
    let counter = Rc::clone(&seen);
    let mut registry = reference_generators();
    registry.register(
        CacheKind::NewObject,
        FnGenerator(move |request: &AttachRequest, _: &dyn IcRuntime| {
            counter.set(counter.get() + 1);
            assert!(request.result.as_ref().is_some_and(Value::is_object));
            assert!(request.inputs.operand(0).is_ok_and(|template| template.is_object()));
            AttachDecision::NoAction
        }),
    );
    let mut rt = TestRuntime::with_generators(registry);
    let script = rt.script(&[IcSite::new(0, Op::NewObject)]);

    let first = rt.run(&script, 0, &IcInputs::none()).unwrap();
    let payload = script.entries()[0].fallback_stub().payload();
    let Some(template) = payload.template() else {
        panic!("no template after first run");
    };
    assert!(matches!(payload, FallbackPayload::NewObject { .. }));
    assert_ne!(first.as_object(), Some(template));

    let second = rt.run(&script, 0, &IcInputs::none()).unwrap();
    assert!(second.is_object());
    assert_ne!(second, first);
    assert_eq!(seen.get(), 1);
}
