//! Shared harness for IC integration tests.
//!
//! Provides a runtime over [`Realm`] with optional re-entrancy hooks, a set
//! of small reference generators and a compiler that turns their
//! descriptions into closures.

#![allow(dead_code)]

use std::rc::Rc;
use strata_core::{
    InternedString, ObjectRef, PropertyKey, ShapeId, StrataResult, Value,
};
use strata_gc::{CodeId, CountingBarrier, WriteBarrier};
use strata_jit::ic::{
    AttachDecision, AttachRequest, CacheKind, FallbackKind, GeneratorRegistry, IcConfig,
    IcInputs, IcRuntime, IcScript, IcSite, JitCode, Op, StubCompiler, StubData,
    StubDescription, StubEntry, StubField, StubGenerator, StubOutcome, init_trampolines,
};
use strata_runtime::{
    BinaryOp, CompareOp, InitialHeap, JsType, ObjectOps, PrivateFieldCheck, PropertyDescriptor,
    PropertyFlags, Realm, UnaryOp,
};

/// Install logging and the trampoline table.
pub fn setup() {
    let _ = env_logger::builder().is_test(true).try_init();
    init_trampolines();
}

// =============================================================================
// Runtime
// =============================================================================

/// Callback run inside a generic operation, with the operation's object.
pub type Hook = Rc<dyn Fn(&mut TestRuntime, &Value) -> StrataResult<()>>;

/// [`IcRuntime`] over a [`Realm`].
pub struct TestRuntime {
    pub realm: Realm,
    pub generators: GeneratorRegistry,
    pub compiler: ReferenceCompiler,
    pub barrier: CountingBarrier,
    /// Runs at the start of every generic property read.
    pub on_get: Option<Hook>,
    /// Runs at the start of every generic property write.
    pub on_set: Option<Hook>,
}

impl TestRuntime {
    /// Runtime with every reference generator registered.
    pub fn new() -> Self {
        Self::with_generators(reference_generators())
    }

    /// Runtime with no generators: every attach attempt declines.
    pub fn bare() -> Self {
        Self::with_generators(GeneratorRegistry::new())
    }

    pub fn with_generators(generators: GeneratorRegistry) -> Self {
        setup();
        Self {
            realm: Realm::new(),
            generators,
            compiler: ReferenceCompiler::new(),
            barrier: CountingBarrier::new(),
            on_get: None,
            on_set: None,
        }
    }

    /// Script with the default configuration.
    pub fn script(&mut self, sites: &[IcSite]) -> IcScript {
        IcScript::new(sites, &mut self.realm).expect("valid IC sites")
    }

    pub fn script_with(&mut self, sites: &[IcSite], config: IcConfig) -> IcScript {
        IcScript::with_config(sites, config, &mut self.realm).expect("valid IC sites")
    }

    /// Plain object with `props` defined in order.
    pub fn object(&mut self, props: &[(&str, Value)]) -> ObjectRef {
        let obj = self.realm.new_object();
        for (name, value) in props {
            self.realm.put(obj, name, value.clone());
        }
        obj
    }

    /// Object whose shape differs from every other `distinct_object(i)`.
    pub fn distinct_object(&mut self, i: usize, x: Value) -> ObjectRef {
        let obj = self.realm.new_object();
        self.realm.put(obj, &format!("p{i}"), Value::Int32(i as i32));
        self.realm.put(obj, "x", x);
        obj
    }

    /// Run entry `index` through its chain.
    pub fn run(&mut self, script: &IcScript, index: usize, inputs: &IcInputs) -> StrataResult<Value> {
        strata_jit::ic::run(script, &script.entries()[index], inputs, self)
    }

    fn fire(&mut self, hook: &Option<Hook>, value: &Value) -> StrataResult<()> {
        match hook.clone() {
            Some(hook) => hook(self, value),
            None => Ok(()),
        }
    }
}

impl IcRuntime for TestRuntime {
    fn generators(&self) -> &GeneratorRegistry {
        &self.generators
    }

    fn compiler(&mut self) -> &mut dyn StubCompiler {
        &mut self.compiler
    }

    fn write_barrier(&mut self) -> &mut dyn WriteBarrier {
        &mut self.barrier
    }
}

impl ObjectOps for TestRuntime {
    fn to_boolean(&self, value: &Value) -> bool {
        self.realm.to_boolean(value)
    }
    fn to_object_for_property_access(&mut self, value: &Value, key: &PropertyKey) -> StrataResult<ObjectRef> {
        self.realm.to_object_for_property_access(value, key)
    }
    fn to_property_key(&mut self, value: &Value) -> StrataResult<Value> {
        self.realm.to_property_key(value)
    }
    fn to_key(&mut self, value: &Value) -> StrataResult<PropertyKey> {
        self.realm.to_key(value)
    }
    fn type_of(&self, value: &Value) -> JsType {
        self.realm.type_of(value)
    }
    fn is_callable(&self, value: &Value) -> bool {
        self.realm.is_callable(value)
    }
    fn shape_of(&self, obj: ObjectRef) -> ShapeId {
        self.realm.shape_of(obj)
    }
    fn lookup_own(&self, shape: ShapeId, key: &PropertyKey) -> Option<PropertyDescriptor> {
        self.realm.lookup_own(shape, key)
    }
    fn shape_proto(&self, shape: ShapeId) -> Option<ObjectRef> {
        self.realm.shape_proto(shape)
    }
    fn load_slot(&self, obj: ObjectRef, slot: u32) -> StrataResult<Value> {
        self.realm.load_slot(obj, slot)
    }
    fn store_slot(&mut self, obj: ObjectRef, slot: u32, value: Value) -> StrataResult<()> {
        self.realm.store_slot(obj, slot, value)
    }
    fn add_slot(&mut self, obj: ObjectRef, new_shape: ShapeId, value: Value) -> StrataResult<()> {
        self.realm.add_slot(obj, new_shape, value)
    }
    fn dense_elements(&self, array: ObjectRef) -> StrataResult<Vec<Value>> {
        self.realm.dense_elements(array)
    }
    fn get_property(&mut self, receiver: &Value, key: &PropertyKey) -> StrataResult<Value> {
        let hook = self.on_get.clone();
        self.fire(&hook, receiver)?;
        self.realm.get_property(receiver, key)
    }
    fn get_property_super(&mut self, home: ObjectRef, receiver: &Value, key: &PropertyKey) -> StrataResult<Value> {
        self.realm.get_property_super(home, receiver, key)
    }
    fn set_property(
        &mut self,
        obj: ObjectRef,
        key: &PropertyKey,
        rhs: &Value,
        receiver: &Value,
        strict: bool,
    ) -> StrataResult<()> {
        let hook = self.on_set.clone();
        self.fire(&hook, &Value::Object(obj))?;
        self.realm.set_property(obj, key, rhs, receiver, strict)
    }
    fn define_property(&mut self, obj: ObjectRef, key: &PropertyKey, rhs: &Value, flags: PropertyFlags) -> StrataResult<()> {
        self.realm.define_property(obj, key, rhs, flags)
    }
    fn init_element_inc(&mut self, array: ObjectRef, index: i32, rhs: &Value) -> StrataResult<()> {
        self.realm.init_element_inc(array, index, rhs)
    }
    fn has_property(&mut self, obj: ObjectRef, key: &PropertyKey) -> StrataResult<bool> {
        self.realm.has_property(obj, key)
    }
    fn has_own_property(&mut self, value: &Value, key: &Value) -> StrataResult<bool> {
        self.realm.has_own_property(value, key)
    }
    fn check_private_field(&mut self, value: &Value, key: &Value, check: PrivateFieldCheck) -> StrataResult<bool> {
        self.realm.check_private_field(value, key, check)
    }
    fn get_name(&mut self, env: ObjectRef, name: &InternedString) -> StrataResult<Value> {
        self.realm.get_name(env, name)
    }
    fn bind_name(&mut self, env: ObjectRef, name: &InternedString) -> StrataResult<ObjectRef> {
        self.realm.bind_name(env, name)
    }
    fn set_name(&mut self, env: ObjectRef, name: &InternedString, rhs: &Value, strict: bool) -> StrataResult<()> {
        self.realm.set_name(env, name, rhs, strict)
    }
    fn init_global_lexical(&mut self, name: &InternedString, rhs: &Value) -> StrataResult<()> {
        self.realm.init_global_lexical(name, rhs)
    }
    fn global_lexical(&self) -> ObjectRef {
        ObjectOps::global_lexical(&self.realm)
    }
    fn get_intrinsic(&mut self, name: &InternedString) -> StrataResult<Value> {
        self.realm.get_intrinsic(name)
    }
    fn call(&mut self, callee: &Value, this: &Value, args: &[Value]) -> StrataResult<Value> {
        self.realm.call(callee, this, args)
    }
    fn construct(&mut self, callee: &Value, args: &[Value], new_target: &Value) -> StrataResult<Value> {
        self.realm.construct(callee, args, new_target)
    }
    fn is_eval_function(&self, callee: &Value) -> bool {
        self.realm.is_eval_function(callee)
    }
    fn direct_eval(&mut self, source: &Value, strict: bool) -> StrataResult<Value> {
        self.realm.direct_eval(source, strict)
    }
    fn optimize_spread_call(&mut self, value: &Value) -> StrataResult<bool> {
        self.realm.optimize_spread_call(value)
    }
    fn get_iterator(&mut self, value: &Value) -> StrataResult<Value> {
        self.realm.get_iterator(value)
    }
    fn unary_arith(&mut self, op: UnaryOp, value: &Value) -> StrataResult<Value> {
        self.realm.unary_arith(op, value)
    }
    fn binary_arith(&mut self, op: BinaryOp, lhs: &Value, rhs: &Value) -> StrataResult<Value> {
        self.realm.binary_arith(op, lhs, rhs)
    }
    fn compare(&mut self, op: CompareOp, lhs: &Value, rhs: &Value) -> StrataResult<bool> {
        self.realm.compare(op, lhs, rhs)
    }
    fn instance_of(&mut self, lhs: &Value, rhs: ObjectRef) -> StrataResult<bool> {
        self.realm.instance_of(lhs, rhs)
    }
    fn new_array(&mut self, length: u32, heap: InitialHeap) -> StrataResult<ObjectRef> {
        self.realm.new_array(length, heap)
    }
    fn new_dense_array(&mut self, elements: &[Value]) -> StrataResult<ObjectRef> {
        self.realm.new_dense_array(elements)
    }
    fn new_plain_object(&mut self, heap: InitialHeap) -> StrataResult<ObjectRef> {
        self.realm.new_plain_object(heap)
    }
    fn new_object_from_template(&mut self, template: ObjectRef, heap: InitialHeap) -> StrataResult<ObjectRef> {
        self.realm.new_object_from_template(template, heap)
    }
}

// =============================================================================
// Templates
// =============================================================================

pub const GET_PROP_SLOT: &str = "GetProp.Slot";
pub const GET_PROP_MEGAMORPHIC: &str = "GetProp.Megamorphic";
pub const SET_PROP_SLOT: &str = "SetProp.Slot";
pub const SET_PROP_ADD_SLOT: &str = "SetProp.AddSlot";
pub const ARITH_INT32: &str = "BinaryArith.Int32";
pub const COMPARE_INT32: &str = "Compare.Int32";
pub const TYPE_OF_TAG: &str = "TypeOf.Tag";
pub const GET_ELEM_SUPER_SLOT: &str = "GetElemSuper.ProtoSlot";
pub const CALL_IDENTITY: &str = "Call.Identity";
pub const SPREAD_CALL_IDENTITY: &str = "SpreadCall.Identity";
pub const TO_BOOL_BOOL: &str = "ToBool.Bool";
pub const TO_BOOL_INT32: &str = "ToBool.Int32";
/// Always misses. Data is free-form.
pub const TEST_MISS: &str = "Test.Miss";
/// Hits with the value in data field 0.
pub const TEST_HIT: &str = "Test.Hit";

const ARITH_OPS: [BinaryOp; 6] = [
    BinaryOp::Add,
    BinaryOp::Sub,
    BinaryOp::Mul,
    BinaryOp::BitAnd,
    BinaryOp::BitOr,
    BinaryOp::BitXor,
];

const COMPARE_OPS: [CompareOp; 8] = [
    CompareOp::Eq,
    CompareOp::Ne,
    CompareOp::Lt,
    CompareOp::Le,
    CompareOp::Gt,
    CompareOp::Ge,
    CompareOp::StrictEq,
    CompareOp::StrictNe,
];

fn int32_arith(op: BinaryOp, a: i32, b: i32) -> Option<i32> {
    match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        // -0 is not an int32.
        BinaryOp::Mul => a.checked_mul(b).filter(|r| *r != 0 || (a >= 0 && b >= 0)),
        BinaryOp::BitAnd => Some(a & b),
        BinaryOp::BitOr => Some(a | b),
        BinaryOp::BitXor => Some(a ^ b),
        _ => None,
    }
}

fn int32_compare(op: CompareOp, a: i32, b: i32) -> bool {
    match op {
        CompareOp::Eq | CompareOp::StrictEq => a == b,
        CompareOp::Ne | CompareOp::StrictNe => a != b,
        CompareOp::Lt => a < b,
        CompareOp::Le => a <= b,
        CompareOp::Gt => a > b,
        CompareOp::Ge => a >= b,
    }
}

fn primitive_tag(value: &Value) -> Option<u64> {
    Some(match value {
        Value::Undefined => 0,
        Value::Null => 1,
        Value::Bool(_) => 2,
        Value::Int32(_) => 3,
        Value::Double(_) => 4,
        Value::String(_) => 5,
        Value::Symbol(_) => 6,
        Value::Object(_) => return None,
    })
}

fn guarded_object(inputs: &IcInputs, rt: &dyn IcRuntime, shape: ShapeId) -> Option<ObjectRef> {
    let obj = inputs.operands().first()?.as_object()?;
    (rt.shape_of(obj) == shape).then_some(obj)
}

fn missing(what: &str) -> strata_core::StrataError {
    strata_core::StrataError::internal(format!("stub data missing {what}"))
}

/// Compiled body for `template`.
pub fn stub_body(template: &str) -> Option<StubEntry> {
    let body: StubEntry = match template {
        GET_PROP_SLOT => Rc::new(|data: &StubData, inputs: &IcInputs, rt: &mut dyn IcRuntime| {
            let shape = data.shape(0).ok_or_else(|| missing("shape"))?;
            let slot = data.slot(1).ok_or_else(|| missing("slot"))?;
            let Some(obj) = guarded_object(inputs, &*rt, shape) else {
                return Ok(StubOutcome::Miss);
            };
            Ok(StubOutcome::Hit(rt.load_slot(obj, slot)?))
        }),
        GET_PROP_MEGAMORPHIC => Rc::new(|data: &StubData, inputs: &IcInputs, rt: &mut dyn IcRuntime| {
            let key = data.key(0).ok_or_else(|| missing("key"))?.clone();
            let receiver = inputs.operand(0)?.clone();
            if !receiver.is_object() {
                return Ok(StubOutcome::Miss);
            }
            Ok(StubOutcome::Hit(rt.get_property(&receiver, &key)?))
        }),
        GET_ELEM_SUPER_SLOT => Rc::new(|data: &StubData, inputs: &IcInputs, rt: &mut dyn IcRuntime| {
            let home_shape = data.shape(0).ok_or_else(|| missing("home shape"))?;
            let key = data.value(1).ok_or_else(|| missing("key"))?;
            let proto_shape = data.shape(2).ok_or_else(|| missing("proto shape"))?;
            let slot = data.slot(3).ok_or_else(|| missing("slot"))?;
            let Some(home) = inputs.operand(2)?.as_object() else {
                return Ok(StubOutcome::Miss);
            };
            if rt.shape_of(home) != home_shape || inputs.operand(1)? != key {
                return Ok(StubOutcome::Miss);
            }
            let Some(proto) = rt.shape_proto(home_shape) else {
                return Ok(StubOutcome::Miss);
            };
            if rt.shape_of(proto) != proto_shape {
                return Ok(StubOutcome::Miss);
            }
            Ok(StubOutcome::Hit(rt.load_slot(proto, slot)?))
        }),
        SET_PROP_SLOT => Rc::new(|data: &StubData, inputs: &IcInputs, rt: &mut dyn IcRuntime| {
            let shape = data.shape(0).ok_or_else(|| missing("shape"))?;
            let slot = data.slot(1).ok_or_else(|| missing("slot"))?;
            let Some(obj) = guarded_object(inputs, &*rt, shape) else {
                return Ok(StubOutcome::Miss);
            };
            let rhs = inputs.operand(1)?.clone();
            rt.store_slot(obj, slot, rhs.clone())?;
            Ok(StubOutcome::Hit(rhs))
        }),
        SET_PROP_ADD_SLOT => Rc::new(|data: &StubData, inputs: &IcInputs, rt: &mut dyn IcRuntime| {
            let old_shape = data.shape(0).ok_or_else(|| missing("old shape"))?;
            let new_shape = data.shape(1).ok_or_else(|| missing("new shape"))?;
            let Some(obj) = guarded_object(inputs, &*rt, old_shape) else {
                return Ok(StubOutcome::Miss);
            };
            let rhs = inputs.operand(1)?.clone();
            rt.add_slot(obj, new_shape, rhs.clone())?;
            Ok(StubOutcome::Hit(rhs))
        }),
        ARITH_INT32 => Rc::new(|data: &StubData, inputs: &IcInputs, _rt: &mut dyn IcRuntime| {
            let op = ARITH_OPS[data.word(0).ok_or_else(|| missing("op"))? as usize];
            let (Some(a), Some(b)) = (inputs.operand(0)?.as_int32(), inputs.operand(1)?.as_int32()) else {
                return Ok(StubOutcome::Miss);
            };
            Ok(int32_arith(op, a, b).map_or(StubOutcome::Miss, |r| StubOutcome::Hit(Value::Int32(r))))
        }),
        COMPARE_INT32 => Rc::new(|data: &StubData, inputs: &IcInputs, _rt: &mut dyn IcRuntime| {
            let op = COMPARE_OPS[data.word(0).ok_or_else(|| missing("op"))? as usize];
            let (Some(a), Some(b)) = (inputs.operand(0)?.as_int32(), inputs.operand(1)?.as_int32()) else {
                return Ok(StubOutcome::Miss);
            };
            Ok(StubOutcome::Hit(Value::Bool(int32_compare(op, a, b))))
        }),
        TYPE_OF_TAG => Rc::new(|data: &StubData, inputs: &IcInputs, _rt: &mut dyn IcRuntime| {
            let tag = data.word(0).ok_or_else(|| missing("tag"))?;
            if primitive_tag(inputs.operand(0)?) != Some(tag) {
                return Ok(StubOutcome::Miss);
            }
            Ok(StubOutcome::Hit(data.value(1).ok_or_else(|| missing("name"))?.clone()))
        }),
        CALL_IDENTITY => Rc::new(|data: &StubData, inputs: &IcInputs, rt: &mut dyn IcRuntime| {
            let callee = data.object(0).ok_or_else(|| missing("callee"))?;
            let constructing = data.word(1).ok_or_else(|| missing("mode"))? != 0;
            if inputs.operand(0)?.as_object() != Some(callee) {
                return Ok(StubOutcome::Miss);
            }
            let callee = Value::Object(callee);
            let result = if constructing {
                rt.construct(&callee, inputs.args(), inputs.operand(2)?)?
            } else {
                rt.call(&callee, inputs.operand(1)?, inputs.args())?
            };
            Ok(StubOutcome::Hit(result))
        }),
        SPREAD_CALL_IDENTITY => Rc::new(|data: &StubData, inputs: &IcInputs, rt: &mut dyn IcRuntime| {
            let callee = data.object(0).ok_or_else(|| missing("callee"))?;
            let constructing = data.word(1).ok_or_else(|| missing("mode"))? != 0;
            if inputs.operand(0)?.as_object() != Some(callee) {
                return Ok(StubOutcome::Miss);
            }
            let Some(array) = inputs.operand(2)?.as_object() else {
                return Ok(StubOutcome::Miss);
            };
            let args = rt.dense_elements(array)?;
            let callee = Value::Object(callee);
            let result = if constructing {
                rt.construct(&callee, &args, inputs.operand(3)?)?
            } else {
                rt.call(&callee, inputs.operand(1)?, &args)?
            };
            Ok(StubOutcome::Hit(result))
        }),
        TO_BOOL_BOOL => Rc::new(|_data: &StubData, inputs: &IcInputs, _rt: &mut dyn IcRuntime| {
            Ok(match inputs.operand(0)? {
                Value::Bool(b) => StubOutcome::Hit(Value::Bool(*b)),
                _ => StubOutcome::Miss,
            })
        }),
        TO_BOOL_INT32 => Rc::new(|_data: &StubData, inputs: &IcInputs, _rt: &mut dyn IcRuntime| {
            Ok(match inputs.operand(0)? {
                Value::Int32(n) => StubOutcome::Hit(Value::Bool(*n != 0)),
                _ => StubOutcome::Miss,
            })
        }),
        TEST_MISS => Rc::new(|_data: &StubData, _inputs: &IcInputs, _rt: &mut dyn IcRuntime| Ok(StubOutcome::Miss)),
        TEST_HIT => Rc::new(|data: &StubData, _inputs: &IcInputs, _rt: &mut dyn IcRuntime| {
            Ok(StubOutcome::Hit(data.value(0).cloned().unwrap_or(Value::Undefined)))
        }),
        _ => return None,
    };
    Some(body)
}

// =============================================================================
// Compiler
// =============================================================================

/// Compiles reference templates. A budget simulates code-space exhaustion.
#[derive(Debug, Default)]
pub struct ReferenceCompiler {
    pub budget: Option<usize>,
    pub compiled: usize,
    next_code: u64,
}

impl ReferenceCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget(budget: usize) -> Self {
        Self {
            budget: Some(budget),
            ..Self::default()
        }
    }
}

impl StubCompiler for ReferenceCompiler {
    fn compile(&mut self, description: &StubDescription) -> Option<JitCode> {
        if self.budget.is_some_and(|budget| self.compiled >= budget) {
            return None;
        }
        let body = stub_body(description.template)?;
        self.compiled += 1;
        self.next_code += 1;
        Some(JitCode::new(
            CodeId(self.next_code),
            description.cache_kind,
            description.template,
            description.makes_gc_calls,
            body,
        ))
    }
}

// =============================================================================
// Generators
// =============================================================================

/// Every reference generator.
pub fn reference_generators() -> GeneratorRegistry {
    let mut registry = GeneratorRegistry::new();
    registry.register(CacheKind::GetProp, GetPropGenerator { megamorphic: true });
    registry.register(CacheKind::GetElemSuper, GetElemSuperGenerator);
    registry.register(CacheKind::SetProp, SetPropGenerator);
    registry.register(CacheKind::BinaryArith, ArithGenerator);
    registry.register(CacheKind::Compare, CompareGenerator);
    registry.register(CacheKind::TypeOf, TypeOfGenerator);
    registry.register(CacheKind::Call, CallGenerator);
    registry.register(CacheKind::ToBool, ToBoolGenerator);
    registry
}

fn name_key(request: &AttachRequest) -> Option<PropertyKey> {
    request.operand.name().cloned().map(PropertyKey::from_atom)
}

/// Own data property reads guarded on shape; a key-only lookup once the
/// entry is megamorphic.
pub struct GetPropGenerator {
    pub megamorphic: bool,
}

impl StubGenerator for GetPropGenerator {
    fn try_attach(&self, request: &AttachRequest, rt: &dyn IcRuntime) -> AttachDecision {
        let Some(key) = name_key(request) else {
            return AttachDecision::NoAction;
        };
        let Some(obj) = request.inputs.operands().first().and_then(Value::as_object) else {
            return AttachDecision::NoAction;
        };
        if request.mode == strata_jit::ic::IcMode::Megamorphic {
            if !self.megamorphic {
                return AttachDecision::NoAction;
            }
            let data = StubData::new().with(StubField::Key(key));
            return AttachDecision::Attach(
                StubDescription::new(CacheKind::GetProp, GET_PROP_MEGAMORPHIC, data).with_gc_calls(),
            );
        }
        let shape = rt.shape_of(obj);
        let Some(desc) = rt.lookup_own(shape, &key) else {
            return AttachDecision::NoAction;
        };
        let data = StubData::new()
            .with(StubField::Shape(shape))
            .with(StubField::Slot(desc.slot));
        AttachDecision::Attach(StubDescription::new(CacheKind::GetProp, GET_PROP_SLOT, data))
    }
}

/// Super element reads of a string key found on the home object's prototype.
pub struct GetElemSuperGenerator;

impl StubGenerator for GetElemSuperGenerator {
    fn try_attach(&self, request: &AttachRequest, rt: &dyn IcRuntime) -> AttachDecision {
        let [_, key @ Value::String(atom), Value::Object(home)] = request.inputs.operands() else {
            return AttachDecision::NoAction;
        };
        let home_shape = rt.shape_of(*home);
        let Some(proto) = rt.shape_proto(home_shape) else {
            return AttachDecision::NoAction;
        };
        let proto_shape = rt.shape_of(proto);
        let Some(desc) = rt.lookup_own(proto_shape, &PropertyKey::from_atom(atom.clone())) else {
            return AttachDecision::NoAction;
        };
        let data = StubData::new()
            .with(StubField::Shape(home_shape))
            .with(StubField::Value(key.clone()))
            .with(StubField::Shape(proto_shape))
            .with(StubField::Slot(desc.slot));
        AttachDecision::Attach(StubDescription::new(CacheKind::GetElemSuper, GET_ELEM_SUPER_SLOT, data))
    }
}

/// Writable own slot stores; add-slot stores after a deferred decision.
pub struct SetPropGenerator;

impl SetPropGenerator {
    fn target(request: &AttachRequest) -> Option<(ObjectRef, PropertyKey)> {
        if !matches!(request.op, Op::SetProp | Op::StrictSetProp | Op::InitProp) {
            return None;
        }
        let obj = request.inputs.operands().first()?.as_object()?;
        Some((obj, name_key(request)?))
    }

    fn found_on_protos(rt: &dyn IcRuntime, shape: ShapeId, key: &PropertyKey) -> bool {
        let mut proto = rt.shape_proto(shape);
        while let Some(obj) = proto {
            let proto_shape = rt.shape_of(obj);
            if rt.lookup_own(proto_shape, key).is_some() {
                return true;
            }
            proto = rt.shape_proto(proto_shape);
        }
        false
    }
}

impl StubGenerator for SetPropGenerator {
    fn try_attach(&self, request: &AttachRequest, rt: &dyn IcRuntime) -> AttachDecision {
        let Some((obj, key)) = Self::target(request) else {
            return AttachDecision::NoAction;
        };
        let shape = rt.shape_of(obj);
        match rt.lookup_own(shape, &key) {
            Some(desc) if desc.is_writable() => {
                let data = StubData::new()
                    .with(StubField::Shape(shape))
                    .with(StubField::Slot(desc.slot));
                AttachDecision::Attach(StubDescription::new(CacheKind::SetProp, SET_PROP_SLOT, data))
            }
            Some(_) => AttachDecision::NoAction,
            None if Self::found_on_protos(rt, shape, &key) => AttachDecision::NoAction,
            None => AttachDecision::Deferred,
        }
    }

    fn try_attach_add_slot(
        &self,
        request: &AttachRequest,
        old_shape: ShapeId,
        rt: &dyn IcRuntime,
    ) -> AttachDecision {
        let Some((obj, key)) = Self::target(request) else {
            return AttachDecision::NoAction;
        };
        let new_shape = rt.shape_of(obj);
        if rt.lookup_own(old_shape, &key).is_some() || rt.shape_proto(old_shape) != rt.shape_proto(new_shape) {
            return AttachDecision::NoAction;
        }
        let Some(desc) = rt.lookup_own(new_shape, &key) else {
            return AttachDecision::NoAction;
        };
        let data = StubData::new()
            .with(StubField::Shape(old_shape))
            .with(StubField::Shape(new_shape))
            .with(StubField::Slot(desc.slot));
        AttachDecision::Attach(StubDescription::new(CacheKind::SetProp, SET_PROP_ADD_SLOT, data))
    }
}

/// Int32 arithmetic with an int32 result.
pub struct ArithGenerator;

impl StubGenerator for ArithGenerator {
    fn try_attach(&self, request: &AttachRequest, _rt: &dyn IcRuntime) -> AttachDecision {
        let Some(op) = request.op.binary_op() else {
            return AttachDecision::NoAction;
        };
        let Some(index) = ARITH_OPS.iter().position(|o| *o == op) else {
            return AttachDecision::NoAction;
        };
        let operands = request.inputs.operands();
        let all_int32 = operands.len() == 2
            && operands.iter().all(|v| v.as_int32().is_some())
            && matches!(request.result, Some(Value::Int32(_)));
        if !all_int32 {
            return AttachDecision::NoAction;
        }
        let data = StubData::new().with(StubField::Word(index as u64));
        AttachDecision::Attach(StubDescription::new(CacheKind::BinaryArith, ARITH_INT32, data))
    }
}

/// Int32 comparisons.
pub struct CompareGenerator;

impl StubGenerator for CompareGenerator {
    fn try_attach(&self, request: &AttachRequest, _rt: &dyn IcRuntime) -> AttachDecision {
        let Some(op) = request.op.compare_op() else {
            return AttachDecision::NoAction;
        };
        let Some(index) = COMPARE_OPS.iter().position(|o| *o == op) else {
            return AttachDecision::NoAction;
        };
        let operands = request.inputs.operands();
        if operands.len() != 2 || !operands.iter().all(|v| v.as_int32().is_some()) {
            return AttachDecision::NoAction;
        }
        let data = StubData::new().with(StubField::Word(index as u64));
        AttachDecision::Attach(StubDescription::new(CacheKind::Compare, COMPARE_INT32, data))
    }
}

/// `typeof` on primitives, keyed by value tag.
pub struct TypeOfGenerator;

impl StubGenerator for TypeOfGenerator {
    fn try_attach(&self, request: &AttachRequest, rt: &dyn IcRuntime) -> AttachDecision {
        let Some(value) = request.inputs.operands().first() else {
            return AttachDecision::NoAction;
        };
        let Some(tag) = primitive_tag(value) else {
            return AttachDecision::NoAction;
        };
        let data = StubData::new()
            .with(StubField::Word(tag))
            .with(StubField::Value(Value::string(rt.type_of(value).name())));
        AttachDecision::Attach(StubDescription::new(CacheKind::TypeOf, TYPE_OF_TAG, data))
    }
}

/// Calls and spread calls guarded on callee identity.
pub struct CallGenerator;

impl StubGenerator for CallGenerator {
    fn try_attach(&self, request: &AttachRequest, rt: &dyn IcRuntime) -> AttachDecision {
        let template = match request.kind {
            FallbackKind::Call | FallbackKind::CallConstructing => CALL_IDENTITY,
            FallbackKind::SpreadCall | FallbackKind::SpreadCallConstructing => SPREAD_CALL_IDENTITY,
            _ => return AttachDecision::NoAction,
        };
        if request.op.is_eval() || request.op == Op::CallIter {
            return AttachDecision::NoAction;
        }
        let Some(callee) = request.inputs.operands().first() else {
            return AttachDecision::NoAction;
        };
        let Some(obj) = callee.as_object() else {
            return AttachDecision::NoAction;
        };
        if !rt.is_callable(callee) {
            return AttachDecision::NoAction;
        }
        let data = StubData::new()
            .with(StubField::Object(obj))
            .with(StubField::Word(u64::from(request.op.is_constructing())));
        AttachDecision::Attach(StubDescription::new(CacheKind::Call, template, data).with_gc_calls())
    }
}

/// Truthiness of booleans and int32s.
pub struct ToBoolGenerator;

impl StubGenerator for ToBoolGenerator {
    fn try_attach(&self, request: &AttachRequest, _rt: &dyn IcRuntime) -> AttachDecision {
        let template = match request.inputs.operands().first() {
            Some(Value::Bool(_)) => TO_BOOL_BOOL,
            Some(Value::Int32(_)) => TO_BOOL_INT32,
            _ => return AttachDecision::NoAction,
        };
        AttachDecision::Attach(StubDescription::new(CacheKind::ToBool, template, StubData::new()))
    }
}

/// Generator backed by a closure.
pub struct FnGenerator<F>(pub F);

impl<F> StubGenerator for FnGenerator<F>
where
    F: Fn(&AttachRequest, &dyn IcRuntime) -> AttachDecision,
{
    fn try_attach(&self, request: &AttachRequest, rt: &dyn IcRuntime) -> AttachDecision {
        (self.0)(request, rt)
    }
}

/// Description of a [`TEST_MISS`] stub made unique by `n`.
pub fn unique_miss(kind: CacheKind, n: u64) -> StubDescription {
    StubDescription::new(kind, TEST_MISS, StubData::new().with(StubField::Word(n)))
}

/// Templates of the specialized stubs on entry `index`, head first.
pub fn chain_templates(script: &IcScript, index: usize) -> Vec<&'static str> {
    let entry = &script.entries()[index];
    let space = script.space();
    script
        .stub_ids(entry)
        .into_iter()
        .filter_map(|id| space.get(id).map(|stub| stub.template()))
        .collect()
}
