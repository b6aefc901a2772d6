//! The reference realm.
//!
//! [`Realm`] owns the object heap, the shape table and the well-known
//! objects, and implements [`ObjectOps`] with simplified but complete
//! script semantics: coercions through `valueOf` / `toString`, prototype
//! chains, scope chains, native functions, dense arrays and array
//! iterators. Accessor properties and proxies are not modeled.

use crate::convert::{number_to_string, string_to_number, to_int32, to_uint32};
use crate::heap::{CollectStats, ObjectHeap};
use crate::object::{FunctionData, JsObject, NativeFn, ObjectKind};
use crate::ops::{
    BinaryOp, CompareOp, InitialHeap, JsType, ObjectOps, PrivateFieldCheck, UnaryOp,
};
use crate::shape::{ObjectClass, PropertyDescriptor, PropertyFlags, ShapeTable};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::rc::Rc;
use strata_core::{
    intern, intern_owned, InternedString, ObjectRef, PropertyKey, ShapeId, StrataError,
    StrataResult, Symbol, Value,
};
use strata_gc::{CellRef, Trace, Tracer};

/// Conversion hint for ToPrimitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hint {
    Default,
    Number,
    String,
}

/// A self-contained script realm.
pub struct Realm {
    heap: ObjectHeap,
    shapes: ShapeTable,
    object_prototype: ObjectRef,
    function_prototype: ObjectRef,
    array_prototype: ObjectRef,
    iterator_prototype: ObjectRef,
    global: ObjectRef,
    global_lexical: ObjectRef,
    eval_function: ObjectRef,
    intrinsics: FxHashMap<InternedString, Value>,
    next_symbol: u32,
    has_instance: Symbol,
}

impl std::fmt::Debug for Realm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Realm")
            .field("live_objects", &self.heap.live_count())
            .field("shapes", &self.shapes.len())
            .finish_non_exhaustive()
    }
}

impl Default for Realm {
    fn default() -> Self {
        Self::new()
    }
}

impl Realm {
    /// Create a realm with its prototypes, global scopes and `eval`.
    #[must_use]
    pub fn new() -> Self {
        let mut heap = ObjectHeap::new();
        let mut shapes = ShapeTable::new();

        let mut bare = |heap: &mut ObjectHeap, proto: Option<ObjectRef>, kind: ObjectKind| {
            let shape = shapes.root(proto, kind.class());
            heap.allocate(JsObject {
                shape,
                proto,
                slots: SmallVec::new(),
                elements: Vec::new(),
                sparse: None,
                kind,
                tenured: true,
            })
        };

        let object_prototype = bare(&mut heap, None, ObjectKind::Plain);
        let function_prototype = bare(&mut heap, Some(object_prototype), ObjectKind::Plain);
        let array_prototype = bare(&mut heap, Some(object_prototype), ObjectKind::Plain);
        let iterator_prototype = bare(&mut heap, Some(object_prototype), ObjectKind::Plain);
        let global = bare(&mut heap, Some(object_prototype), ObjectKind::Environment { parent: None });
        let global_lexical = bare(
            &mut heap,
            None,
            ObjectKind::Environment {
                parent: Some(global),
            },
        );

        let mut realm = Self {
            heap,
            shapes,
            object_prototype,
            function_prototype,
            array_prototype,
            iterator_prototype,
            global,
            global_lexical,
            eval_function: global,
            intrinsics: FxHashMap::default(),
            next_symbol: 1,
            has_instance: Symbol::new(0),
        };
        realm.install_builtins();
        realm
    }

    fn install_builtins(&mut self) {
        let to_string = self.new_function("toString", |realm, this, _| {
            let text = match this.as_object().and_then(|o| realm.heap.get(o)) {
                Some(obj) if obj.is_array() => {
                    let elements = obj
                        .copy_elements()
                        .ok_or_else(|| StrataError::range("array too long to join"))?;
                    let mut parts = Vec::with_capacity(elements.len());
                    for element in &elements {
                        if element.is_nullish() {
                            parts.push(String::new());
                        } else {
                            parts.push(realm.to_string(element)?.as_str().to_owned());
                        }
                    }
                    parts.join(",")
                }
                Some(obj) => match obj.as_function() {
                    Some(f) => format!("function {}() {{ [native code] }}", f.name),
                    None => "[object Object]".to_owned(),
                },
                None => "[object Undefined]".to_owned(),
            };
            Ok(Value::String(intern_owned(text)))
        });
        let value_of = self.new_function("valueOf", |_, this, _| Ok(this.clone()));
        self.put(self.object_prototype, "toString", Value::Object(to_string));
        self.put(self.object_prototype, "valueOf", Value::Object(value_of));

        let next = self.new_function("next", |realm, this, _| realm.iterator_next(this));
        self.put(self.iterator_prototype, "next", Value::Object(next));

        let eval = self.new_function("eval", |realm, _, args| {
            let source = args.first().cloned().unwrap_or_default();
            realm.direct_eval(&source, false)
        });
        self.eval_function = eval;
        self.put(self.global, "eval", Value::Object(eval));

        self.has_instance = self.new_symbol();

        self.define_intrinsic("ObjectPrototype", Value::Object(self.object_prototype));
        self.define_intrinsic("ArrayPrototype", Value::Object(self.array_prototype));
        self.define_intrinsic("FunctionPrototype", Value::Object(self.function_prototype));
        self.define_intrinsic("eval", Value::Object(eval));
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The object heap.
    #[inline]
    pub fn heap(&self) -> &ObjectHeap {
        &self.heap
    }

    /// The shape table.
    #[inline]
    pub fn shapes(&self) -> &ShapeTable {
        &self.shapes
    }

    /// The global object (outermost scope).
    #[inline]
    pub fn global(&self) -> ObjectRef {
        self.global
    }

    /// `Object.prototype`.
    #[inline]
    pub fn object_prototype(&self) -> ObjectRef {
        self.object_prototype
    }

    /// `Array.prototype`.
    #[inline]
    pub fn array_prototype(&self) -> ObjectRef {
        self.array_prototype
    }

    /// `Symbol.hasInstance`.
    #[inline]
    pub fn has_instance_symbol(&self) -> Symbol {
        self.has_instance
    }

    /// Borrow a live object.
    pub fn object(&self, obj: ObjectRef) -> StrataResult<&JsObject> {
        self.heap
            .get(obj)
            .ok_or_else(|| StrataError::internal(format!("dangling object handle {}", obj.index())))
    }

    fn object_mut(&mut self, obj: ObjectRef) -> StrataResult<&mut JsObject> {
        self.heap
            .get_mut(obj)
            .ok_or_else(|| StrataError::internal(format!("dangling object handle {}", obj.index())))
    }

    // =========================================================================
    // Builders
    // =========================================================================

    fn allocate(&mut self, proto: Option<ObjectRef>, kind: ObjectKind, heap: InitialHeap) -> ObjectRef {
        let shape = self.shapes.root(proto, kind.class());
        self.heap.allocate(JsObject {
            shape,
            proto,
            slots: SmallVec::new(),
            elements: Vec::new(),
            sparse: None,
            kind,
            tenured: heap == InitialHeap::Tenured,
        })
    }

    /// New plain object inheriting from `Object.prototype`.
    pub fn new_object(&mut self) -> ObjectRef {
        self.allocate(Some(self.object_prototype), ObjectKind::Plain, InitialHeap::Default)
    }

    /// New plain object with an explicit prototype.
    pub fn new_object_with_proto(&mut self, proto: Option<ObjectRef>) -> ObjectRef {
        self.allocate(proto, ObjectKind::Plain, InitialHeap::Default)
    }

    /// New scope object enclosed by `parent`.
    pub fn new_environment(&mut self, parent: ObjectRef) -> ObjectRef {
        self.allocate(
            None,
            ObjectKind::Environment {
                parent: Some(parent),
            },
            InitialHeap::Default,
        )
    }

    fn function_object(&mut self, name: &str, native: NativeFn, constructor: bool) -> ObjectRef {
        let data = FunctionData {
            name: intern(name),
            native,
            constructor,
        };
        self.allocate(
            Some(self.function_prototype),
            ObjectKind::Function(data),
            InitialHeap::Tenured,
        )
    }

    /// New native function that cannot be used with `new`.
    pub fn new_function<F>(&mut self, name: &str, body: F) -> ObjectRef
    where
        F: Fn(&mut Realm, &Value, &[Value]) -> StrataResult<Value> + 'static,
    {
        self.function_object(name, Rc::new(body), false)
    }

    /// New native constructor with a fresh `prototype` object.
    pub fn new_constructor<F>(&mut self, name: &str, body: F) -> ObjectRef
    where
        F: Fn(&mut Realm, &Value, &[Value]) -> StrataResult<Value> + 'static,
    {
        let ctor = self.function_object(name, Rc::new(body), true);
        let prototype = self.new_object();
        self.put(ctor, "prototype", Value::Object(prototype));
        self.put(prototype, "constructor", Value::Object(ctor));
        ctor
    }

    /// New dense array.
    pub fn new_array_from(&mut self, elements: &[Value]) -> ObjectRef {
        let array = self.allocate(Some(self.array_prototype), ObjectKind::Array, InitialHeap::Default);
        if let Some(obj) = self.heap.get_mut(array) {
            obj.elements = elements.to_vec();
        }
        array
    }

    /// New unique symbol.
    pub fn new_symbol(&mut self) -> Symbol {
        let id = self.next_symbol;
        self.next_symbol += 1;
        Symbol::new(id)
    }

    /// New private name (`#x`).
    pub fn new_private_name(&mut self) -> Symbol {
        let id = self.next_symbol;
        self.next_symbol += 1;
        Symbol::private_name(id)
    }

    /// Register an intrinsic for `GetIntrinsic`.
    pub fn define_intrinsic(&mut self, name: &str, value: Value) {
        self.intrinsics.insert(intern(name), value);
    }

    /// Define or overwrite an own writable property without running user code.
    pub fn put(&mut self, obj: ObjectRef, name: &str, value: Value) {
        let key = PropertyKey::named(name);
        // Builders only target live objects they just created.
        let _ = self.define_property(obj, &key, &value, PropertyFlags::default());
    }

    /// Read a property through the prototype chain without coercions.
    pub fn get(&mut self, obj: ObjectRef, name: &str) -> StrataResult<Value> {
        self.get_property(&Value::Object(obj), &PropertyKey::named(name))
    }

    /// Run a full collection. The realm's own roots are always included.
    pub fn collect_garbage(&mut self, extra_roots: &[&dyn Trace]) -> CollectStats {
        let own = RealmRoots {
            objects: [
                self.object_prototype,
                self.function_prototype,
                self.array_prototype,
                self.iterator_prototype,
                self.global,
                self.global_lexical,
                self.eval_function,
            ],
            intrinsics: self.intrinsics.values().cloned().collect(),
        };
        let mut roots: Vec<&dyn Trace> = Vec::with_capacity(extra_roots.len() + 1);
        roots.push(&own);
        roots.extend_from_slice(extra_roots);
        self.heap.collect(&roots)
    }

    // =========================================================================
    // Coercions
    // =========================================================================

    fn to_primitive(&mut self, value: &Value, hint: Hint) -> StrataResult<Value> {
        let Value::Object(obj) = value else {
            return Ok(value.clone());
        };
        let order = if hint == Hint::String {
            ["toString", "valueOf"]
        } else {
            ["valueOf", "toString"]
        };
        for name in order {
            let method = self.get_property(value, &PropertyKey::named(name))?;
            if self.is_callable(&method) {
                let result = self.call(&method, &Value::Object(*obj), &[])?;
                if result.is_primitive() {
                    return Ok(result);
                }
            }
        }
        Err(StrataError::type_error("can't convert object to primitive value"))
    }

    /// ToNumber.
    pub fn to_number(&mut self, value: &Value) -> StrataResult<f64> {
        match value {
            Value::Undefined => Ok(f64::NAN),
            Value::Null => Ok(0.0),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Int32(n) => Ok(f64::from(*n)),
            Value::Double(n) => Ok(*n),
            Value::String(s) => Ok(string_to_number(s.as_str())),
            Value::Symbol(_) => Err(StrataError::type_error("can't convert symbol to number")),
            Value::Object(_) => {
                let prim = self.to_primitive(value, Hint::Number)?;
                self.to_number(&prim)
            }
        }
    }

    /// ToString.
    pub fn to_string(&mut self, value: &Value) -> StrataResult<InternedString> {
        Ok(match value {
            Value::Undefined => intern("undefined"),
            Value::Null => intern("null"),
            Value::Bool(true) => intern("true"),
            Value::Bool(false) => intern("false"),
            Value::Int32(n) => intern_owned(n.to_string()),
            Value::Double(n) => intern_owned(number_to_string(*n)),
            Value::String(s) => s.clone(),
            Value::Symbol(_) => {
                return Err(StrataError::type_error("can't convert symbol to string"));
            }
            Value::Object(_) => {
                let prim = self.to_primitive(value, Hint::String)?;
                return self.to_string(&prim);
            }
        })
    }

    fn strict_equals(lhs: &Value, rhs: &Value) -> bool {
        match (lhs, rhs) {
            (Value::String(a), Value::String(b)) => a.same_text(b),
            (a, b) if a.is_number() && b.is_number() => a.as_number() == b.as_number(),
            (a, b) => a == b,
        }
    }

    fn loose_equals(&mut self, lhs: &Value, rhs: &Value) -> StrataResult<bool> {
        match (lhs, rhs) {
            (a, b) if a.is_nullish() && b.is_nullish() => Ok(true),
            (a, b) if a.is_nullish() || b.is_nullish() => Ok(false),
            (a, b) if std::mem::discriminant(a) == std::mem::discriminant(b) => {
                Ok(Self::strict_equals(a, b))
            }
            (a, b) if a.is_number() && b.is_number() => Ok(Self::strict_equals(a, b)),
            (Value::Bool(_), _) | (Value::String(_), Value::Int32(_) | Value::Double(_)) => {
                let n = Value::number(self.to_number(lhs)?);
                self.loose_equals(&n, rhs)
            }
            (_, Value::Bool(_)) | (Value::Int32(_) | Value::Double(_), Value::String(_)) => {
                let n = Value::number(self.to_number(rhs)?);
                self.loose_equals(lhs, &n)
            }
            (Value::Object(_), b) if !b.is_object() => {
                let prim = self.to_primitive(lhs, Hint::Default)?;
                self.loose_equals(&prim, rhs)
            }
            (a, Value::Object(_)) if !a.is_object() => {
                let prim = self.to_primitive(rhs, Hint::Default)?;
                self.loose_equals(lhs, &prim)
            }
            _ => Ok(false),
        }
    }

    /// Abstract relational comparison; `None` when either side is NaN.
    fn less_than(&mut self, lhs: &Value, rhs: &Value) -> StrataResult<Option<bool>> {
        let lp = self.to_primitive(lhs, Hint::Number)?;
        let rp = self.to_primitive(rhs, Hint::Number)?;
        if let (Value::String(a), Value::String(b)) = (&lp, &rp) {
            return Ok(Some(a.as_str() < b.as_str()));
        }
        let (a, b) = (self.to_number(&lp)?, self.to_number(&rp)?);
        if a.is_nan() || b.is_nan() {
            return Ok(None);
        }
        Ok(Some(a < b))
    }

    // =========================================================================
    // Property Helpers
    // =========================================================================

    fn is_length(key: &PropertyKey) -> bool {
        key.as_atom().is_some_and(|a| a.as_str() == "length")
    }

    fn get_from(&self, mut obj: ObjectRef, key: &PropertyKey) -> StrataResult<Value> {
        loop {
            let object = self.object(obj)?;
            if object.is_array() {
                if let Some(index) = key.as_index() {
                    if let Some(value) = object.element(index) {
                        return Ok(value.clone());
                    }
                } else if Self::is_length(key) {
                    return Ok(Value::number(f64::from(object.array_length())));
                }
            }
            if let Some(desc) = self.shapes.lookup(object.shape, key) {
                return Ok(object.slots[desc.slot as usize].clone());
            }
            match object.proto {
                Some(proto) => obj = proto,
                None => return Ok(Value::Undefined),
            }
        }
    }

    fn has_own(&self, obj: ObjectRef, key: &PropertyKey) -> StrataResult<bool> {
        let object = self.object(obj)?;
        if object.is_array() {
            if let Some(index) = key.as_index() {
                if object.element(index).is_some() {
                    return Ok(true);
                }
            } else if Self::is_length(key) {
                return Ok(true);
            }
        }
        Ok(self.shapes.lookup(object.shape, key).is_some())
    }

    fn inherited_read_only(&self, obj: ObjectRef, key: &PropertyKey) -> StrataResult<bool> {
        let mut next = self.object(obj)?.proto;
        while let Some(proto) = next {
            let object = self.object(proto)?;
            if let Some(desc) = self.shapes.lookup(object.shape, key) {
                return Ok(!desc.is_writable());
            }
            next = object.proto;
        }
        Ok(false)
    }

    fn add_own(&mut self, obj: ObjectRef, key: &PropertyKey, value: Value, flags: PropertyFlags) -> StrataResult<()> {
        let from = self.object(obj)?.shape;
        let to = self.shapes.add_property(from, key.clone(), flags);
        let object = self.object_mut(obj)?;
        object.shape = to;
        object.slots.push(value);
        Ok(())
    }

    fn set_element(&mut self, array: ObjectRef, index: u32, value: Value) -> StrataResult<()> {
        self.object_mut(array)?.set_element(index, value);
        Ok(())
    }

    fn environment_parent(&self, env: ObjectRef) -> StrataResult<Option<ObjectRef>> {
        match self.object(env)?.kind {
            ObjectKind::Environment { parent } => Ok(parent),
            _ => Ok(None),
        }
    }

    fn lookup_binding(&self, env: ObjectRef, name: &InternedString) -> StrataResult<Option<ObjectRef>> {
        let key = PropertyKey::from_atom(name.clone());
        let mut scope = Some(env);
        while let Some(current) = scope {
            if self.has_own(current, &key)? {
                return Ok(Some(current));
            }
            scope = self.environment_parent(current)?;
        }
        Ok(None)
    }

    fn iterator_next(&mut self, this: &Value) -> StrataResult<Value> {
        let iter = this
            .as_object()
            .ok_or_else(|| StrataError::type_error("next called on a non-iterator"))?;
        let (target, index) = match self.object(iter)?.kind {
            ObjectKind::ArrayIterator { target, next_index } => (target, next_index),
            _ => return Err(StrataError::type_error("next called on a non-iterator")),
        };
        let target = self.object(target)?;
        let element = (index < target.array_length())
            .then(|| target.element(index).cloned().unwrap_or_default());
        if element.is_some() {
            if let ObjectKind::ArrayIterator { next_index, .. } = &mut self.object_mut(iter)?.kind {
                *next_index += 1;
            }
        }
        let result = self.new_object();
        let done = element.is_none();
        self.put(result, "value", element.unwrap_or_default());
        self.put(result, "done", Value::Bool(done));
        Ok(Value::Object(result))
    }

    fn function_data(&self, callee: &Value) -> Option<FunctionData> {
        let obj = callee.as_object()?;
        self.heap.get(obj)?.as_function().cloned()
    }
}

/// Roots the realm keeps alive across collections.
struct RealmRoots {
    objects: [ObjectRef; 7],
    intrinsics: Vec<Value>,
}

/// Safety: reports every well-known object and intrinsic value.
unsafe impl Trace for RealmRoots {
    fn trace(&self, tracer: &mut dyn Tracer) {
        for obj in self.objects {
            tracer.trace_cell(CellRef::Object(obj), "realm-root");
        }
        for value in &self.intrinsics {
            tracer.trace_value(value, "realm-intrinsic");
        }
    }
}

// =============================================================================
// ObjectOps
// =============================================================================

impl ObjectOps for Realm {
    fn to_boolean(&self, value: &Value) -> bool {
        match value {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int32(n) => *n != 0,
            Value::Double(n) => !(n.is_nan() || *n == 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Symbol(_) | Value::Object(_) => true,
        }
    }

    fn to_object_for_property_access(&mut self, value: &Value, key: &PropertyKey) -> StrataResult<ObjectRef> {
        match value {
            Value::Object(obj) => Ok(*obj),
            Value::Undefined | Value::Null => Err(StrataError::type_error(format!(
                "can't access property \"{key}\" of {}",
                value.tag_name()
            ))),
            _ => Ok(self.new_object()),
        }
    }

    fn to_property_key(&mut self, value: &Value) -> StrataResult<Value> {
        Ok(self.to_key(value)?.to_value())
    }

    fn to_key(&mut self, value: &Value) -> StrataResult<PropertyKey> {
        match value {
            Value::Int32(n) if *n >= 0 => Ok(PropertyKey::Index(*n as u32)),
            Value::Double(n) if n.fract() == 0.0 && *n >= 0.0 && *n < f64::from(u32::MAX) && !(*n == 0.0 && n.is_sign_negative()) => {
                Ok(PropertyKey::Index(*n as u32))
            }
            Value::String(s) => Ok(PropertyKey::from_atom(s.clone())),
            Value::Symbol(sym) => Ok(PropertyKey::Symbol(*sym)),
            _ => {
                let prim = self.to_primitive(value, Hint::String)?;
                if let Value::Symbol(sym) = prim {
                    return Ok(PropertyKey::Symbol(sym));
                }
                let text = self.to_string(&prim)?;
                Ok(PropertyKey::from_atom(text))
            }
        }
    }

    fn type_of(&self, value: &Value) -> JsType {
        match value {
            Value::Undefined => JsType::Undefined,
            Value::Null => JsType::Object,
            Value::Bool(_) => JsType::Boolean,
            Value::Int32(_) | Value::Double(_) => JsType::Number,
            Value::String(_) => JsType::String,
            Value::Symbol(_) => JsType::Symbol,
            Value::Object(_) if self.is_callable(value) => JsType::Function,
            Value::Object(_) => JsType::Object,
        }
    }

    fn is_callable(&self, value: &Value) -> bool {
        value
            .as_object()
            .and_then(|obj| self.heap.get(obj))
            .is_some_and(JsObject::is_callable)
    }

    fn shape_of(&self, obj: ObjectRef) -> ShapeId {
        self.heap.get(obj).map_or(ShapeId::EMPTY, |o| o.shape)
    }

    fn lookup_own(&self, shape: ShapeId, key: &PropertyKey) -> Option<PropertyDescriptor> {
        self.shapes.lookup(shape, key).cloned()
    }

    fn shape_proto(&self, shape: ShapeId) -> Option<ObjectRef> {
        self.shapes.get(shape).proto()
    }

    fn load_slot(&self, obj: ObjectRef, slot: u32) -> StrataResult<Value> {
        self.object(obj)?
            .slots
            .get(slot as usize)
            .cloned()
            .ok_or_else(|| StrataError::internal(format!("slot {slot} out of range")))
    }

    fn store_slot(&mut self, obj: ObjectRef, slot: u32, value: Value) -> StrataResult<()> {
        let target = self
            .object_mut(obj)?
            .slots
            .get_mut(slot as usize)
            .ok_or_else(|| StrataError::internal(format!("slot {slot} out of range")))?;
        *target = value;
        Ok(())
    }

    fn add_slot(&mut self, obj: ObjectRef, new_shape: ShapeId, value: Value) -> StrataResult<()> {
        let expected = self.shapes.get(new_shape).slot_count() as usize;
        let object = self.object_mut(obj)?;
        if object.slots.len() + 1 != expected {
            return Err(StrataError::internal(format!(
                "{new_shape:?} expects {expected} slots, object has {}",
                object.slots.len()
            )));
        }
        object.shape = new_shape;
        object.slots.push(value);
        Ok(())
    }

    fn dense_elements(&self, array: ObjectRef) -> StrataResult<Vec<Value>> {
        let object = self.object(array)?;
        if !object.is_array() {
            return Err(StrataError::type_error("not an array"));
        }
        object
            .copy_elements()
            .ok_or_else(|| StrataError::range("array too long to copy"))
    }

    fn get_property(&mut self, receiver: &Value, key: &PropertyKey) -> StrataResult<Value> {
        let start = match receiver {
            Value::Object(obj) => *obj,
            Value::Undefined | Value::Null => {
                return Err(StrataError::type_error(format!(
                    "can't access property \"{key}\" of {}",
                    receiver.tag_name()
                )));
            }
            Value::String(s) => {
                if Self::is_length(key) {
                    return Ok(Value::number(s.as_str().chars().count() as f64));
                }
                if let Some(index) = key.as_index() {
                    return Ok(s
                        .as_str()
                        .chars()
                        .nth(index as usize)
                        .map_or(Value::Undefined, |c| Value::String(intern_owned(c.to_string()))));
                }
                self.object_prototype
            }
            _ => self.object_prototype,
        };
        self.get_from(start, key)
    }

    fn get_property_super(&mut self, home: ObjectRef, _receiver: &Value, key: &PropertyKey) -> StrataResult<Value> {
        match self.object(home)?.proto {
            Some(proto) => self.get_from(proto, key),
            None => Ok(Value::Undefined),
        }
    }

    fn set_property(
        &mut self,
        obj: ObjectRef,
        key: &PropertyKey,
        rhs: &Value,
        receiver: &Value,
        strict: bool,
    ) -> StrataResult<()> {
        if receiver.is_primitive() {
            if strict {
                return Err(StrataError::type_error(format!(
                    "can't assign to property \"{key}\" on {}",
                    receiver.tag_name()
                )));
            }
            return Ok(());
        }

        if self.object(obj)?.is_array() {
            if let Some(index) = key.as_index() {
                return self.set_element(obj, index, rhs.clone());
            }
            if Self::is_length(key) {
                let n = self.to_number(rhs)?;
                let length = to_uint32(n);
                if f64::from(length) != n {
                    return Err(StrataError::range("invalid array length"));
                }
                self.object_mut(obj)?.set_array_length(length);
                return Ok(());
            }
        }

        let shape = self.object(obj)?.shape;
        if let Some(desc) = self.shapes.lookup(shape, key).cloned() {
            if !desc.is_writable() {
                if strict {
                    return Err(StrataError::type_error(format!("\"{key}\" is read-only")));
                }
                return Ok(());
            }
            return self.store_slot(obj, desc.slot, rhs.clone());
        }

        if self.inherited_read_only(obj, key)? {
            if strict {
                return Err(StrataError::type_error(format!("\"{key}\" is read-only")));
            }
            return Ok(());
        }
        self.add_own(obj, key, rhs.clone(), PropertyFlags::default())
    }

    fn define_property(&mut self, obj: ObjectRef, key: &PropertyKey, rhs: &Value, flags: PropertyFlags) -> StrataResult<()> {
        if self.object(obj)?.is_array() {
            if let Some(index) = key.as_index() {
                return self.set_element(obj, index, rhs.clone());
            }
        }
        let shape = self.object(obj)?.shape;
        if let Some(desc) = self.shapes.lookup(shape, key).cloned() {
            return self.store_slot(obj, desc.slot, rhs.clone());
        }
        self.add_own(obj, key, rhs.clone(), flags)
    }

    fn init_element_inc(&mut self, array: ObjectRef, index: i32, rhs: &Value) -> StrataResult<()> {
        if !self.object(array)?.is_array() {
            return Err(StrataError::internal("array initializer on a non-array"));
        }
        let index = u32::try_from(index).map_err(|_| StrataError::range("negative array index"))?;
        self.set_element(array, index, rhs.clone())
    }

    fn has_property(&mut self, obj: ObjectRef, key: &PropertyKey) -> StrataResult<bool> {
        let mut current = Some(obj);
        while let Some(o) = current {
            if self.has_own(o, key)? {
                return Ok(true);
            }
            current = self.object(o)?.proto;
        }
        Ok(false)
    }

    fn has_own_property(&mut self, value: &Value, key: &Value) -> StrataResult<bool> {
        let key = self.to_key(key)?;
        let obj = self.to_object_for_property_access(value, &key)?;
        self.has_own(obj, &key)
    }

    fn check_private_field(&mut self, value: &Value, key: &Value, check: PrivateFieldCheck) -> StrataResult<bool> {
        let Value::Object(obj) = value else {
            return Err(StrataError::type_error(
                "can't use 'in' to search for a private field in a non-object",
            ));
        };
        let Value::Symbol(sym) = key else {
            return Err(StrataError::internal("private field key is not a private name"));
        };
        if !sym.is_private() {
            return Err(StrataError::internal("private field key is not a private name"));
        }
        let key = PropertyKey::Symbol(*sym);
        let has = self.has_own(*obj, &key)?;
        match check {
            PrivateFieldCheck::ThrowHas if has => Err(StrataError::type_error(format!(
                "private field {key} initialized twice"
            ))),
            PrivateFieldCheck::ThrowHasNot if !has => Err(StrataError::type_error(format!(
                "can't access private field {key} on an object without it"
            ))),
            _ => Ok(has),
        }
    }

    fn get_name(&mut self, env: ObjectRef, name: &InternedString) -> StrataResult<Value> {
        match self.lookup_binding(env, name)? {
            Some(scope) => self.get_from(scope, &PropertyKey::from_atom(name.clone())),
            None => Err(StrataError::reference(name.as_str())),
        }
    }

    fn bind_name(&mut self, env: ObjectRef, name: &InternedString) -> StrataResult<ObjectRef> {
        Ok(self.lookup_binding(env, name)?.unwrap_or(self.global))
    }

    fn set_name(&mut self, env: ObjectRef, name: &InternedString, rhs: &Value, strict: bool) -> StrataResult<()> {
        let key = PropertyKey::from_atom(name.clone());
        if !self.has_own(env, &key)? && strict {
            return Err(StrataError::reference(name.as_str()));
        }
        self.set_property(env, &key, rhs, &Value::Object(env), strict)
    }

    fn init_global_lexical(&mut self, name: &InternedString, rhs: &Value) -> StrataResult<()> {
        let key = PropertyKey::from_atom(name.clone());
        self.define_property(self.global_lexical, &key, rhs, PropertyFlags::default())
    }

    fn global_lexical(&self) -> ObjectRef {
        self.global_lexical
    }

    fn get_intrinsic(&mut self, name: &InternedString) -> StrataResult<Value> {
        self.intrinsics
            .get(name)
            .cloned()
            .ok_or_else(|| StrataError::internal(format!("unknown intrinsic {name}")))
    }

    fn call(&mut self, callee: &Value, this: &Value, args: &[Value]) -> StrataResult<Value> {
        let Some(data) = self.function_data(callee) else {
            return Err(StrataError::type_error(format!("{} is not a function", callee.tag_name())));
        };
        (data.native)(self, this, args)
    }

    fn construct(&mut self, callee: &Value, args: &[Value], new_target: &Value) -> StrataResult<Value> {
        let data = self
            .function_data(callee)
            .filter(|data| data.constructor)
            .ok_or_else(|| StrataError::type_error(format!("{} is not a constructor", callee.tag_name())))?;
        let proto = match self.get_property(new_target, &PropertyKey::named("prototype"))? {
            Value::Object(proto) => proto,
            _ => self.object_prototype,
        };
        let this = Value::Object(self.new_object_with_proto(Some(proto)));
        let result = (data.native)(self, &this, args)?;
        Ok(if result.is_object() { result } else { this })
    }

    fn is_eval_function(&self, callee: &Value) -> bool {
        callee.as_object() == Some(self.eval_function)
    }

    fn direct_eval(&mut self, source: &Value, _strict: bool) -> StrataResult<Value> {
        let Value::String(text) = source else {
            return Ok(source.clone());
        };
        let trimmed = text.as_str().trim();
        if trimmed.is_empty() {
            return Ok(Value::Undefined);
        }
        let n = string_to_number(trimmed);
        if !n.is_nan() {
            return Ok(Value::number(n));
        }
        let is_identifier = trimmed
            .chars()
            .enumerate()
            .all(|(i, c)| c == '_' || c == '$' || c.is_alphabetic() || (i > 0 && c.is_ascii_digit()));
        if is_identifier {
            return self.get_name(self.global_lexical, &intern(trimmed));
        }
        Err(StrataError::internal(format!("eval of unsupported source {trimmed:?}")))
    }

    fn optimize_spread_call(&mut self, value: &Value) -> StrataResult<bool> {
        let Some(obj) = value.as_object() else {
            return Ok(false);
        };
        let object = self.object(obj)?;
        Ok(object.is_array() && object.proto == Some(self.array_prototype))
    }

    fn get_iterator(&mut self, value: &Value) -> StrataResult<Value> {
        let obj = match value.as_object().and_then(|o| self.heap.get(o).map(|obj| (o, obj))) {
            Some((o, obj)) if obj.is_array() => o,
            Some((o, obj)) if obj.kind.class() == ObjectClass::Iterator => return Ok(Value::Object(o)),
            _ => return Err(StrataError::type_error(format!("{} is not iterable", value.tag_name()))),
        };
        let iter = self.allocate(
            Some(self.iterator_prototype),
            ObjectKind::ArrayIterator {
                target: obj,
                next_index: 0,
            },
            InitialHeap::Default,
        );
        Ok(Value::Object(iter))
    }

    fn unary_arith(&mut self, op: UnaryOp, value: &Value) -> StrataResult<Value> {
        let n = self.to_number(value)?;
        Ok(match op {
            UnaryOp::BitNot => Value::Int32(!to_int32(n)),
            UnaryOp::Pos | UnaryOp::ToNumeric => Value::number(n),
            UnaryOp::Neg => Value::number(-n),
            UnaryOp::Inc => Value::number(n + 1.0),
            UnaryOp::Dec => Value::number(n - 1.0),
        })
    }

    fn binary_arith(&mut self, op: BinaryOp, lhs: &Value, rhs: &Value) -> StrataResult<Value> {
        if let (Value::Int32(a), Value::Int32(b)) = (lhs, rhs) {
            let fast = match op {
                BinaryOp::Add => a.checked_add(*b),
                BinaryOp::Sub => a.checked_sub(*b),
                BinaryOp::Mul => a.checked_mul(*b).filter(|r| *r != 0 || (*a >= 0 && *b >= 0)),
                _ => None,
            };
            if let Some(result) = fast {
                return Ok(Value::Int32(result));
            }
        }

        if op == BinaryOp::Add {
            let lp = self.to_primitive(lhs, Hint::Default)?;
            let rp = self.to_primitive(rhs, Hint::Default)?;
            if matches!(lp, Value::String(_)) || matches!(rp, Value::String(_)) {
                let mut text = self.to_string(&lp)?.as_str().to_owned();
                text.push_str(self.to_string(&rp)?.as_str());
                return Ok(Value::String(intern_owned(text)));
            }
            return Ok(Value::number(self.to_number(&lp)? + self.to_number(&rp)?));
        }

        let a = self.to_number(lhs)?;
        let b = self.to_number(rhs)?;
        let shift = to_uint32(b) & 31;
        Ok(match op {
            BinaryOp::Add => Value::number(a + b),
            BinaryOp::Sub => Value::number(a - b),
            BinaryOp::Mul => Value::number(a * b),
            BinaryOp::Div => Value::number(a / b),
            BinaryOp::Mod => Value::number(a % b),
            BinaryOp::Pow => {
                if b.is_nan() || (a.abs() == 1.0 && b.is_infinite()) {
                    Value::Double(f64::NAN)
                } else {
                    Value::number(a.powf(b))
                }
            }
            BinaryOp::BitOr => Value::Int32(to_int32(a) | to_int32(b)),
            BinaryOp::BitXor => Value::Int32(to_int32(a) ^ to_int32(b)),
            BinaryOp::BitAnd => Value::Int32(to_int32(a) & to_int32(b)),
            BinaryOp::Lsh => Value::Int32(to_int32(a).wrapping_shl(shift)),
            BinaryOp::Rsh => Value::Int32(to_int32(a) >> shift),
            BinaryOp::Ursh => Value::number(f64::from(to_uint32(a) >> shift)),
        })
    }

    fn compare(&mut self, op: CompareOp, lhs: &Value, rhs: &Value) -> StrataResult<bool> {
        Ok(match op {
            CompareOp::StrictEq => Self::strict_equals(lhs, rhs),
            CompareOp::StrictNe => !Self::strict_equals(lhs, rhs),
            CompareOp::Eq => self.loose_equals(lhs, rhs)?,
            CompareOp::Ne => !self.loose_equals(lhs, rhs)?,
            CompareOp::Lt => self.less_than(lhs, rhs)? == Some(true),
            CompareOp::Gt => self.less_than(rhs, lhs)? == Some(true),
            CompareOp::Le => self.less_than(rhs, lhs)? == Some(false),
            CompareOp::Ge => self.less_than(lhs, rhs)? == Some(false),
        })
    }

    fn instance_of(&mut self, lhs: &Value, rhs: ObjectRef) -> StrataResult<bool> {
        let rhs_value = Value::Object(rhs);
        let hook = self.get_from(rhs, &PropertyKey::Symbol(self.has_instance))?;
        if !hook.is_nullish() {
            if !self.is_callable(&hook) {
                return Err(StrataError::type_error("Symbol.hasInstance is not callable"));
            }
            let result = self.call(&hook, &rhs_value, std::slice::from_ref(lhs))?;
            return Ok(self.to_boolean(&result));
        }
        if !self.is_callable(&rhs_value) {
            return Err(StrataError::type_error(
                "right-hand side of 'instanceof' is not callable",
            ));
        }
        let Value::Object(mut current) = lhs.clone() else {
            return Ok(false);
        };
        let Value::Object(proto) = self.get_from(rhs, &PropertyKey::named("prototype"))? else {
            return Err(StrataError::type_error("'prototype' property is not an object"));
        };
        while let Some(next) = self.object(current)?.proto {
            if next == proto {
                return Ok(true);
            }
            current = next;
        }
        Ok(false)
    }

    fn new_array(&mut self, length: u32, heap: InitialHeap) -> StrataResult<ObjectRef> {
        let array = self.allocate(Some(self.array_prototype), ObjectKind::Array, heap);
        self.object_mut(array)?.set_array_length(length);
        Ok(array)
    }

    fn new_dense_array(&mut self, elements: &[Value]) -> StrataResult<ObjectRef> {
        Ok(self.new_array_from(elements))
    }

    fn new_plain_object(&mut self, heap: InitialHeap) -> StrataResult<ObjectRef> {
        Ok(self.allocate(Some(self.object_prototype), ObjectKind::Plain, heap))
    }

    fn new_object_from_template(&mut self, template: ObjectRef, heap: InitialHeap) -> StrataResult<ObjectRef> {
        let (shape, proto, slot_count) = {
            let t = self.object(template)?;
            (t.shape, t.proto, t.slots.len())
        };
        Ok(self.heap.allocate(JsObject {
            shape,
            proto,
            slots: std::iter::repeat_n(Value::Undefined, slot_count).collect(),
            elements: Vec::new(),
            sparse: None,
            kind: ObjectKind::Plain,
            tenured: heap == InitialHeap::Tenured,
        }))
    }
}
