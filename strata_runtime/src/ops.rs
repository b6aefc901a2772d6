//! Generic object-model operations.
//!
//! [`ObjectOps`] is the always-correct slow path every cache falls back to.
//! Each method implements one language operation in full generality,
//! including coercions that may run user code. Callers that cache results
//! must assume any method taking `&mut self` can re-enter them.
//!
//! The trait also exposes raw layout access (`shape_of`, `load_slot`, ...).
//! Specialized code compiled for a known shape uses those after its guards
//! pass.

use crate::shape::{PropertyDescriptor, PropertyFlags};
use strata_core::{InternedString, ObjectRef, PropertyKey, ShapeId, StrataResult, Value};

// =============================================================================
// Operator Kinds
// =============================================================================

/// Unary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `~x`
    BitNot,
    /// `+x`
    Pos,
    /// `-x`
    Neg,
    /// `x + 1` on a numeric
    Inc,
    /// `x - 1` on a numeric
    Dec,
    /// ToNumeric
    ToNumeric,
}

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `&`
    BitAnd,
    /// `<<`
    Lsh,
    /// `>>`
    Rsh,
    /// `>>>`
    Ursh,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `**`
    Pow,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `===`
    StrictEq,
    /// `!==`
    StrictNe,
}

/// Result of `typeof`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsType {
    /// `"undefined"`
    Undefined,
    /// `"object"` (including `null`)
    Object,
    /// `"boolean"`
    Boolean,
    /// `"number"`
    Number,
    /// `"string"`
    String,
    /// `"symbol"`
    Symbol,
    /// `"function"`
    Function,
}

impl JsType {
    /// The string `typeof` produces.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Object => "object",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Symbol => "symbol",
            Self::Function => "function",
        }
    }
}

/// Which heap an allocation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitialHeap {
    /// Short-lived allocation.
    #[default]
    Default,
    /// Long-lived allocation (templates).
    Tenured,
}

/// Throw behaviour of a private-field presence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivateFieldCheck {
    /// Report presence without throwing.
    NoThrow,
    /// Throw when the field is already present (double initialization).
    ThrowHas,
    /// Throw when the field is absent (access of a missing field).
    ThrowHasNot,
}

// =============================================================================
// ObjectOps
// =============================================================================

/// Generic semantics for every cached operation.
pub trait ObjectOps {
    // -------------------------------------------------------------------------
    // Conversions
    // -------------------------------------------------------------------------

    /// ToBoolean.
    fn to_boolean(&self, value: &Value) -> bool;

    /// ToObject for property access. Throws on `null` / `undefined`, naming
    /// `key` in the message.
    fn to_object_for_property_access(
        &mut self,
        value: &Value,
        key: &PropertyKey,
    ) -> StrataResult<ObjectRef>;

    /// ToPropertyKey, returned as the value a script would observe.
    fn to_property_key(&mut self, value: &Value) -> StrataResult<Value>;

    /// ToPropertyKey, returned canonicalized.
    fn to_key(&mut self, value: &Value) -> StrataResult<PropertyKey>;

    /// `typeof value`.
    fn type_of(&self, value: &Value) -> JsType;

    /// Check for a callable.
    fn is_callable(&self, value: &Value) -> bool;

    // -------------------------------------------------------------------------
    // Layout
    // -------------------------------------------------------------------------

    /// Current shape of `obj`.
    fn shape_of(&self, obj: ObjectRef) -> ShapeId;

    /// Own property descriptor in `shape`.
    fn lookup_own(&self, shape: ShapeId, key: &PropertyKey) -> Option<PropertyDescriptor>;

    /// Prototype of objects with `shape`.
    fn shape_proto(&self, shape: ShapeId) -> Option<ObjectRef>;

    /// Read slot `slot` of `obj`.
    fn load_slot(&self, obj: ObjectRef, slot: u32) -> StrataResult<Value>;

    /// Overwrite slot `slot` of `obj`.
    fn store_slot(&mut self, obj: ObjectRef, slot: u32, value: Value) -> StrataResult<()>;

    /// Move `obj` to `new_shape` and append `value` as its new last slot.
    fn add_slot(&mut self, obj: ObjectRef, new_shape: ShapeId, value: Value) -> StrataResult<()>;

    /// Dense elements of an array.
    fn dense_elements(&self, array: ObjectRef) -> StrataResult<Vec<Value>>;

    // -------------------------------------------------------------------------
    // Property access
    // -------------------------------------------------------------------------

    /// `receiver[key]` for any receiver, including primitives.
    fn get_property(&mut self, receiver: &Value, key: &PropertyKey) -> StrataResult<Value>;

    /// `super[key]`: lookup starts at `home`'s prototype, getters see `receiver`.
    fn get_property_super(
        &mut self,
        home: ObjectRef,
        receiver: &Value,
        key: &PropertyKey,
    ) -> StrataResult<Value>;

    /// `obj[key] = rhs` with `receiver` as the original base.
    fn set_property(
        &mut self,
        obj: ObjectRef,
        key: &PropertyKey,
        rhs: &Value,
        receiver: &Value,
        strict: bool,
    ) -> StrataResult<()>;

    /// Define an own data property (object literal initializers).
    fn define_property(
        &mut self,
        obj: ObjectRef,
        key: &PropertyKey,
        rhs: &Value,
        flags: PropertyFlags,
    ) -> StrataResult<()>;

    /// Array literal append: `array[index] = rhs`.
    fn init_element_inc(&mut self, array: ObjectRef, index: i32, rhs: &Value) -> StrataResult<()>;

    /// `key in obj`.
    fn has_property(&mut self, obj: ObjectRef, key: &PropertyKey) -> StrataResult<bool>;

    /// `Object.hasOwn(value, key)`.
    fn has_own_property(&mut self, value: &Value, key: &Value) -> StrataResult<bool>;

    /// `#key in value`, with the requested throw behaviour.
    fn check_private_field(
        &mut self,
        value: &Value,
        key: &Value,
        check: PrivateFieldCheck,
    ) -> StrataResult<bool>;

    // -------------------------------------------------------------------------
    // Names
    // -------------------------------------------------------------------------

    /// Resolve `name` through the scope chain starting at `env`.
    fn get_name(&mut self, env: ObjectRef, name: &InternedString) -> StrataResult<Value>;

    /// Scope object that binds `name`, or the global object.
    fn bind_name(&mut self, env: ObjectRef, name: &InternedString) -> StrataResult<ObjectRef>;

    /// Assign to a binding on the scope object returned by `bind_name`.
    fn set_name(
        &mut self,
        env: ObjectRef,
        name: &InternedString,
        rhs: &Value,
        strict: bool,
    ) -> StrataResult<()>;

    /// Initialize a global lexical binding.
    fn init_global_lexical(&mut self, name: &InternedString, rhs: &Value) -> StrataResult<()>;

    /// Global lexical scope object.
    fn global_lexical(&self) -> ObjectRef;

    /// Engine intrinsic by name.
    fn get_intrinsic(&mut self, name: &InternedString) -> StrataResult<Value>;

    // -------------------------------------------------------------------------
    // Calls
    // -------------------------------------------------------------------------

    /// `callee.call(this, ...args)`.
    fn call(&mut self, callee: &Value, this: &Value, args: &[Value]) -> StrataResult<Value>;

    /// `new callee(...args)` with `new_target`.
    fn construct(&mut self, callee: &Value, args: &[Value], new_target: &Value) -> StrataResult<Value>;

    /// Check whether `callee` is the realm's `eval`.
    fn is_eval_function(&self, callee: &Value) -> bool;

    /// Direct eval of `source`.
    fn direct_eval(&mut self, source: &Value, strict: bool) -> StrataResult<Value>;

    /// Whether spreading `value` can skip the iterator protocol.
    fn optimize_spread_call(&mut self, value: &Value) -> StrataResult<bool>;

    /// `value[Symbol.iterator]()`.
    fn get_iterator(&mut self, value: &Value) -> StrataResult<Value>;

    // -------------------------------------------------------------------------
    // Operators
    // -------------------------------------------------------------------------

    /// Unary arithmetic.
    fn unary_arith(&mut self, op: UnaryOp, value: &Value) -> StrataResult<Value>;

    /// Binary arithmetic.
    fn binary_arith(&mut self, op: BinaryOp, lhs: &Value, rhs: &Value) -> StrataResult<Value>;

    /// Comparison.
    fn compare(&mut self, op: CompareOp, lhs: &Value, rhs: &Value) -> StrataResult<bool>;

    /// `lhs instanceof rhs`.
    fn instance_of(&mut self, lhs: &Value, rhs: ObjectRef) -> StrataResult<bool>;

    // -------------------------------------------------------------------------
    // Allocation
    // -------------------------------------------------------------------------

    /// New array of `length` undefined elements.
    fn new_array(&mut self, length: u32, heap: InitialHeap) -> StrataResult<ObjectRef>;

    /// New dense array holding `elements`.
    fn new_dense_array(&mut self, elements: &[Value]) -> StrataResult<ObjectRef>;

    /// New empty plain object.
    fn new_plain_object(&mut self, heap: InitialHeap) -> StrataResult<ObjectRef>;

    /// New object with `template`'s shape and undefined slots.
    fn new_object_from_template(
        &mut self,
        template: ObjectRef,
        heap: InitialHeap,
    ) -> StrataResult<ObjectRef>;
}

/// Implement [`ObjectOps`] for a wrapper type by forwarding every method to
/// one of its fields.
///
/// ```ignore
/// struct Host { realm: Realm, /* ... */ }
/// strata_runtime::forward_object_ops!(Host => realm);
/// ```
#[macro_export]
macro_rules! forward_object_ops {
    ($ty:ty => $field:ident) => {
        impl $crate::ObjectOps for $ty {
            fn to_boolean(&self, value: &$crate::__core::Value) -> bool {
                $crate::ObjectOps::to_boolean(&self.$field, value)
            }
            fn to_object_for_property_access(
                &mut self,
                value: &$crate::__core::Value,
                key: &$crate::__core::PropertyKey,
            ) -> $crate::__core::StrataResult<$crate::__core::ObjectRef> {
                $crate::ObjectOps::to_object_for_property_access(&mut self.$field, value, key)
            }
            fn to_property_key(
                &mut self,
                value: &$crate::__core::Value,
            ) -> $crate::__core::StrataResult<$crate::__core::Value> {
                $crate::ObjectOps::to_property_key(&mut self.$field, value)
            }
            fn to_key(
                &mut self,
                value: &$crate::__core::Value,
            ) -> $crate::__core::StrataResult<$crate::__core::PropertyKey> {
                $crate::ObjectOps::to_key(&mut self.$field, value)
            }
            fn type_of(&self, value: &$crate::__core::Value) -> $crate::JsType {
                $crate::ObjectOps::type_of(&self.$field, value)
            }
            fn is_callable(&self, value: &$crate::__core::Value) -> bool {
                $crate::ObjectOps::is_callable(&self.$field, value)
            }
            fn shape_of(&self, obj: $crate::__core::ObjectRef) -> $crate::__core::ShapeId {
                $crate::ObjectOps::shape_of(&self.$field, obj)
            }
            fn lookup_own(
                &self,
                shape: $crate::__core::ShapeId,
                key: &$crate::__core::PropertyKey,
            ) -> Option<$crate::PropertyDescriptor> {
                $crate::ObjectOps::lookup_own(&self.$field, shape, key)
            }
            fn shape_proto(&self, shape: $crate::__core::ShapeId) -> Option<$crate::__core::ObjectRef> {
                $crate::ObjectOps::shape_proto(&self.$field, shape)
            }
            fn load_slot(
                &self,
                obj: $crate::__core::ObjectRef,
                slot: u32,
            ) -> $crate::__core::StrataResult<$crate::__core::Value> {
                $crate::ObjectOps::load_slot(&self.$field, obj, slot)
            }
            fn store_slot(
                &mut self,
                obj: $crate::__core::ObjectRef,
                slot: u32,
                value: $crate::__core::Value,
            ) -> $crate::__core::StrataResult<()> {
                $crate::ObjectOps::store_slot(&mut self.$field, obj, slot, value)
            }
            fn add_slot(
                &mut self,
                obj: $crate::__core::ObjectRef,
                new_shape: $crate::__core::ShapeId,
                value: $crate::__core::Value,
            ) -> $crate::__core::StrataResult<()> {
                $crate::ObjectOps::add_slot(&mut self.$field, obj, new_shape, value)
            }
            fn dense_elements(
                &self,
                array: $crate::__core::ObjectRef,
            ) -> $crate::__core::StrataResult<Vec<$crate::__core::Value>> {
                $crate::ObjectOps::dense_elements(&self.$field, array)
            }
            fn get_property(
                &mut self,
                receiver: &$crate::__core::Value,
                key: &$crate::__core::PropertyKey,
            ) -> $crate::__core::StrataResult<$crate::__core::Value> {
                $crate::ObjectOps::get_property(&mut self.$field, receiver, key)
            }
            fn get_property_super(
                &mut self,
                home: $crate::__core::ObjectRef,
                receiver: &$crate::__core::Value,
                key: &$crate::__core::PropertyKey,
            ) -> $crate::__core::StrataResult<$crate::__core::Value> {
                $crate::ObjectOps::get_property_super(&mut self.$field, home, receiver, key)
            }
            fn set_property(
                &mut self,
                obj: $crate::__core::ObjectRef,
                key: &$crate::__core::PropertyKey,
                rhs: &$crate::__core::Value,
                receiver: &$crate::__core::Value,
                strict: bool,
            ) -> $crate::__core::StrataResult<()> {
                $crate::ObjectOps::set_property(&mut self.$field, obj, key, rhs, receiver, strict)
            }
            fn define_property(
                &mut self,
                obj: $crate::__core::ObjectRef,
                key: &$crate::__core::PropertyKey,
                rhs: &$crate::__core::Value,
                flags: $crate::PropertyFlags,
            ) -> $crate::__core::StrataResult<()> {
                $crate::ObjectOps::define_property(&mut self.$field, obj, key, rhs, flags)
            }
            fn init_element_inc(
                &mut self,
                array: $crate::__core::ObjectRef,
                index: i32,
                rhs: &$crate::__core::Value,
            ) -> $crate::__core::StrataResult<()> {
                $crate::ObjectOps::init_element_inc(&mut self.$field, array, index, rhs)
            }
            fn has_property(
                &mut self,
                obj: $crate::__core::ObjectRef,
                key: &$crate::__core::PropertyKey,
            ) -> $crate::__core::StrataResult<bool> {
                $crate::ObjectOps::has_property(&mut self.$field, obj, key)
            }
            fn has_own_property(
                &mut self,
                value: &$crate::__core::Value,
                key: &$crate::__core::Value,
            ) -> $crate::__core::StrataResult<bool> {
                $crate::ObjectOps::has_own_property(&mut self.$field, value, key)
            }
            fn check_private_field(
                &mut self,
                value: &$crate::__core::Value,
                key: &$crate::__core::Value,
                check: $crate::PrivateFieldCheck,
            ) -> $crate::__core::StrataResult<bool> {
                $crate::ObjectOps::check_private_field(&mut self.$field, value, key, check)
            }
            fn get_name(
                &mut self,
                env: $crate::__core::ObjectRef,
                name: &$crate::__core::InternedString,
            ) -> $crate::__core::StrataResult<$crate::__core::Value> {
                $crate::ObjectOps::get_name(&mut self.$field, env, name)
            }
            fn bind_name(
                &mut self,
                env: $crate::__core::ObjectRef,
                name: &$crate::__core::InternedString,
            ) -> $crate::__core::StrataResult<$crate::__core::ObjectRef> {
                $crate::ObjectOps::bind_name(&mut self.$field, env, name)
            }
            fn set_name(
                &mut self,
                env: $crate::__core::ObjectRef,
                name: &$crate::__core::InternedString,
                rhs: &$crate::__core::Value,
                strict: bool,
            ) -> $crate::__core::StrataResult<()> {
                $crate::ObjectOps::set_name(&mut self.$field, env, name, rhs, strict)
            }
            fn init_global_lexical(
                &mut self,
                name: &$crate::__core::InternedString,
                rhs: &$crate::__core::Value,
            ) -> $crate::__core::StrataResult<()> {
                $crate::ObjectOps::init_global_lexical(&mut self.$field, name, rhs)
            }
            fn global_lexical(&self) -> $crate::__core::ObjectRef {
                $crate::ObjectOps::global_lexical(&self.$field)
            }
            fn get_intrinsic(
                &mut self,
                name: &$crate::__core::InternedString,
            ) -> $crate::__core::StrataResult<$crate::__core::Value> {
                $crate::ObjectOps::get_intrinsic(&mut self.$field, name)
            }
            fn call(
                &mut self,
                callee: &$crate::__core::Value,
                this: &$crate::__core::Value,
                args: &[$crate::__core::Value],
            ) -> $crate::__core::StrataResult<$crate::__core::Value> {
                $crate::ObjectOps::call(&mut self.$field, callee, this, args)
            }
            fn construct(
                &mut self,
                callee: &$crate::__core::Value,
                args: &[$crate::__core::Value],
                new_target: &$crate::__core::Value,
            ) -> $crate::__core::StrataResult<$crate::__core::Value> {
                $crate::ObjectOps::construct(&mut self.$field, callee, args, new_target)
            }
            fn is_eval_function(&self, callee: &$crate::__core::Value) -> bool {
                $crate::ObjectOps::is_eval_function(&self.$field, callee)
            }
            fn direct_eval(
                &mut self,
                source: &$crate::__core::Value,
                strict: bool,
            ) -> $crate::__core::StrataResult<$crate::__core::Value> {
                $crate::ObjectOps::direct_eval(&mut self.$field, source, strict)
            }
            fn optimize_spread_call(
                &mut self,
                value: &$crate::__core::Value,
            ) -> $crate::__core::StrataResult<bool> {
                $crate::ObjectOps::optimize_spread_call(&mut self.$field, value)
            }
            fn get_iterator(
                &mut self,
                value: &$crate::__core::Value,
            ) -> $crate::__core::StrataResult<$crate::__core::Value> {
                $crate::ObjectOps::get_iterator(&mut self.$field, value)
            }
            fn unary_arith(
                &mut self,
                op: $crate::UnaryOp,
                value: &$crate::__core::Value,
            ) -> $crate::__core::StrataResult<$crate::__core::Value> {
                $crate::ObjectOps::unary_arith(&mut self.$field, op, value)
            }
            fn binary_arith(
                &mut self,
                op: $crate::BinaryOp,
                lhs: &$crate::__core::Value,
                rhs: &$crate::__core::Value,
            ) -> $crate::__core::StrataResult<$crate::__core::Value> {
                $crate::ObjectOps::binary_arith(&mut self.$field, op, lhs, rhs)
            }
            fn compare(
                &mut self,
                op: $crate::CompareOp,
                lhs: &$crate::__core::Value,
                rhs: &$crate::__core::Value,
            ) -> $crate::__core::StrataResult<bool> {
                $crate::ObjectOps::compare(&mut self.$field, op, lhs, rhs)
            }
            fn instance_of(
                &mut self,
                lhs: &$crate::__core::Value,
                rhs: $crate::__core::ObjectRef,
            ) -> $crate::__core::StrataResult<bool> {
                $crate::ObjectOps::instance_of(&mut self.$field, lhs, rhs)
            }
            fn new_array(
                &mut self,
                length: u32,
                heap: $crate::InitialHeap,
            ) -> $crate::__core::StrataResult<$crate::__core::ObjectRef> {
                $crate::ObjectOps::new_array(&mut self.$field, length, heap)
            }
            fn new_dense_array(
                &mut self,
                elements: &[$crate::__core::Value],
            ) -> $crate::__core::StrataResult<$crate::__core::ObjectRef> {
                $crate::ObjectOps::new_dense_array(&mut self.$field, elements)
            }
            fn new_plain_object(
                &mut self,
                heap: $crate::InitialHeap,
            ) -> $crate::__core::StrataResult<$crate::__core::ObjectRef> {
                $crate::ObjectOps::new_plain_object(&mut self.$field, heap)
            }
            fn new_object_from_template(
                &mut self,
                template: $crate::__core::ObjectRef,
                heap: $crate::InitialHeap,
            ) -> $crate::__core::StrataResult<$crate::__core::ObjectRef> {
                $crate::ObjectOps::new_object_from_template(&mut self.$field, template, heap)
            }
        }
    };
}
