//! Script values as seen by the inline caches and the object model.
//!
//! # Representation
//!
//! `Value` is a plain tagged enum. Heap objects are referenced through
//! [`ObjectRef`] handles into the object heap; strings are interned atoms.
//! Numbers keep an `Int32` fast form next to `Double`, and
//! [`Value::number`] canonicalizes integral doubles back to `Int32` so type
//! feedback stays stable across arithmetic.
//!
//! ```text
//! Value ─┬─ Undefined | Null | Bool
//!        ├─ Int32 ──────────────┐ number
//!        ├─ Double ─────────────┘
//!        ├─ String(InternedString)
//!        ├─ Symbol(Symbol)
//!        └─ Object(ObjectRef) ──► heap slot
//! ```

use crate::intern::{InternedString, intern};
use std::fmt;

// =============================================================================
// Object Handles
// =============================================================================

/// Handle to a heap object.
///
/// Handles are indices into the owning heap. They are `Copy` and compare by
/// identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef(u32);

impl ObjectRef {
    /// Wrap a raw heap index.
    #[inline]
    #[must_use]
    pub const fn from_index(index: u32) -> Self {
        Self(index)
    }

    /// Raw heap index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({})", self.0)
    }
}

// =============================================================================
// Symbols
// =============================================================================

/// A symbol value.
///
/// Private names (`#field`) are symbols with the `private` bit set; only
/// those may be used with private-field checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol {
    id: u32,
    private: bool,
}

impl Symbol {
    /// Create a public symbol.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self { id, private: false }
    }

    /// Create a private name.
    #[inline]
    #[must_use]
    pub const fn private_name(id: u32) -> Self {
        Self { id, private: true }
    }

    /// Symbol identity.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u32 {
        self.id
    }

    /// Check for a private name.
    #[inline]
    #[must_use]
    pub const fn is_private(self) -> bool {
        self.private
    }
}

// =============================================================================
// Property Keys
// =============================================================================

/// A canonical property key.
///
/// String keys that spell an array index are always stored as `Index`, so
/// `o["3"]` and `o[3]` resolve to the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// Named property.
    Atom(InternedString),
    /// Array index.
    Index(u32),
    /// Symbol-keyed property.
    Symbol(Symbol),
}

impl PropertyKey {
    /// Build a key from an atom, canonicalizing array indices.
    #[must_use]
    pub fn from_atom(atom: InternedString) -> Self {
        match atom.as_array_index() {
            Some(index) => Self::Index(index),
            None => Self::Atom(atom),
        }
    }

    /// Build a key from text.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self::from_atom(intern(name))
    }

    /// Get the atom for named keys.
    #[inline]
    #[must_use]
    pub fn as_atom(&self) -> Option<&InternedString> {
        match self {
            Self::Atom(atom) => Some(atom),
            _ => None,
        }
    }

    /// Get the index for element keys.
    #[inline]
    #[must_use]
    pub fn as_index(&self) -> Option<u32> {
        match self {
            Self::Index(i) => Some(*i),
            _ => None,
        }
    }

    /// Convert back to the value a script would observe.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Atom(atom) => Value::String(atom.clone()),
            Self::Index(i) => match i32::try_from(*i) {
                Ok(n) => Value::Int32(n),
                Err(_) => Value::Double(f64::from(*i)),
            },
            Self::Symbol(sym) => Value::Symbol(*sym),
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atom(atom) => f.write_str(atom.as_str()),
            Self::Index(i) => write!(f, "{i}"),
            Self::Symbol(sym) if sym.is_private() => write!(f, "#private{}", sym.id()),
            Self::Symbol(sym) => write!(f, "Symbol({})", sym.id()),
        }
    }
}

// =============================================================================
// Value
// =============================================================================

/// A script value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// `undefined`
    #[default]
    Undefined,
    /// `null`
    Null,
    /// Boolean.
    Bool(bool),
    /// Number in int32 form.
    Int32(i32),
    /// Number in double form.
    Double(f64),
    /// String.
    String(InternedString),
    /// Symbol.
    Symbol(Symbol),
    /// Heap object.
    Object(ObjectRef),
}

impl Value {
    /// Canonical number: integral doubles in int32 range become `Int32`.
    ///
    /// `-0.0` stays a double so its sign survives.
    #[must_use]
    pub fn number(n: f64) -> Self {
        if n.fract() == 0.0 && n >= f64::from(i32::MIN) && n <= f64::from(i32::MAX) {
            if n == 0.0 && n.is_sign_negative() {
                return Self::Double(n);
            }
            return Self::Int32(n as i32);
        }
        Self::Double(n)
    }

    /// Intern and wrap a string.
    #[must_use]
    pub fn string(s: &str) -> Self {
        Self::String(intern(s))
    }

    /// Check for `undefined`.
    #[inline]
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Check for `null` or `undefined`.
    #[inline]
    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Check for any number form.
    #[inline]
    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Int32(_) | Self::Double(_))
    }

    /// Check for an object.
    #[inline]
    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// Check for a non-object.
    #[inline]
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        !self.is_object()
    }

    /// Get the object handle.
    #[inline]
    #[must_use]
    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            Self::Object(obj) => Some(*obj),
            _ => None,
        }
    }

    /// Get the int32 payload.
    #[inline]
    #[must_use]
    pub fn as_int32(&self) -> Option<i32> {
        match self {
            Self::Int32(n) => Some(*n),
            _ => None,
        }
    }

    /// Get a number payload as `f64`.
    #[inline]
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int32(n) => Some(f64::from(*n)),
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Get the string payload.
    #[inline]
    #[must_use]
    pub fn as_string(&self) -> Option<&InternedString> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// SameValue comparison: `NaN` equals itself, `+0` differs from `-0`,
    /// strings compare by content.
    #[must_use]
    pub fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a.same_text(b),
            (a, b) if a.is_number() && b.is_number() => {
                let (x, y) = (a.as_number().unwrap_or(0.0), b.as_number().unwrap_or(0.0));
                if x.is_nan() && y.is_nan() {
                    return true;
                }
                x == y && x.is_sign_negative() == y.is_sign_negative()
            }
            (a, b) => a == b,
        }
    }

    /// Short tag used in log output.
    #[must_use]
    pub fn tag_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int32(_) => "int32",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Object(_) => "object",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int32(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::number(n)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Self::Object(obj)
    }
}
