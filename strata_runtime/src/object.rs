//! Heap objects.
//!
//! A [`JsObject`] is a shape plus a slot vector. The shape says which key
//! lives in which slot; the slot vector holds the values. Arrays carry their
//! elements in a separate dense vector so element writes never change shape.
//! A write far past the end of that vector switches the array to a sparse
//! map instead of filling the gap.
//!
//! # Layout
//!
//! ```text
//! JsObject ─┬─ shape: ShapeId ──► ShapeTable (keys, flags, proto)
//!           ├─ slots: [v0, v1, ...]
//!           ├─ elements: [e0, e1, ...]      (arrays only)
//!           ├─ sparse: {i: v, ...} + length  (arrays with far-out indices)
//!           └─ kind: Plain | Array | Function | Iterator | Environment
//! ```

use crate::realm::Realm;
use crate::shape::ObjectClass;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use strata_core::{InternedString, ObjectRef, ShapeId, StrataResult, Value};
use strata_gc::{CellRef, Trace, Tracer};

/// Slots stored inline before spilling to the heap.
pub const INLINE_SLOTS: usize = 4;

/// Largest hole a write may open past the dense elements before the array
/// goes sparse.
pub const MAX_DENSE_GAP: u32 = 1024;

/// Longest array whose elements may be copied out in one piece.
pub const MAX_COPIED_ELEMENTS: u32 = 1 << 20;

/// Signature of a native function body: `(realm, this, args)`.
pub type NativeFn = Rc<dyn Fn(&mut Realm, &Value, &[Value]) -> StrataResult<Value>>;

/// Callable payload.
#[derive(Clone)]
pub struct FunctionData {
    /// Function name, for diagnostics and `typeof`.
    pub name: InternedString,
    /// Body.
    pub native: NativeFn,
    /// Whether `new` is allowed.
    pub constructor: bool,
}

impl fmt::Debug for FunctionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionData")
            .field("name", &self.name)
            .field("constructor", &self.constructor)
            .finish_non_exhaustive()
    }
}

/// Class-specific payload.
#[derive(Debug, Clone)]
pub enum ObjectKind {
    /// Ordinary object.
    Plain,
    /// Dense array; `elements` holds the values.
    Array,
    /// Callable.
    Function(FunctionData),
    /// Iterator over a dense array.
    ArrayIterator {
        /// Array being iterated.
        target: ObjectRef,
        /// Next index to produce.
        next_index: u32,
    },
    /// Scope object; properties are bindings.
    Environment {
        /// Enclosing scope.
        parent: Option<ObjectRef>,
    },
}

impl ObjectKind {
    /// Class used for shape roots.
    #[must_use]
    pub fn class(&self) -> ObjectClass {
        match self {
            Self::Plain => ObjectClass::Plain,
            Self::Array => ObjectClass::Array,
            Self::Function(_) => ObjectClass::Function,
            Self::ArrayIterator { .. } => ObjectClass::Iterator,
            Self::Environment { .. } => ObjectClass::Environment,
        }
    }
}

/// Elements at or past the end of the dense vector, once an array has had a
/// write too far out to store densely.
#[derive(Debug, Clone, Default)]
pub struct SparseElements {
    /// Present indices; all of them are at least the dense length.
    pub values: BTreeMap<u32, Value>,
    /// Array length, which may exceed every present index.
    pub length: u32,
}

/// A heap object.
#[derive(Debug, Clone)]
pub struct JsObject {
    /// Current shape.
    pub shape: ShapeId,
    /// Prototype, duplicated from the shape for quick chain walks.
    pub proto: Option<ObjectRef>,
    /// Named property storage, indexed by shape slot.
    pub slots: SmallVec<[Value; INLINE_SLOTS]>,
    /// Dense elements (arrays only).
    pub elements: Vec<Value>,
    /// Elements beyond the dense vector. While this is set the dense vector
    /// never grows.
    pub sparse: Option<Box<SparseElements>>,
    /// Class payload.
    pub kind: ObjectKind,
    /// Allocated directly in the tenured heap.
    pub tenured: bool,
}

impl JsObject {
    /// Check for an array.
    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self.kind, ObjectKind::Array)
    }

    /// Check for a callable.
    #[inline]
    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_))
    }

    /// Function payload.
    #[inline]
    pub fn as_function(&self) -> Option<&FunctionData> {
        match &self.kind {
            ObjectKind::Function(data) => Some(data),
            _ => None,
        }
    }

    /// Array length.
    #[inline]
    pub fn array_length(&self) -> u32 {
        match &self.sparse {
            Some(sparse) => sparse.length,
            None => u32::try_from(self.elements.len()).unwrap_or(u32::MAX),
        }
    }

    /// Element at `index`, if present.
    pub fn element(&self, index: u32) -> Option<&Value> {
        match self.elements.get(index as usize) {
            Some(value) => Some(value),
            None => self.sparse.as_ref()?.values.get(&index),
        }
    }

    /// Store an element, growing the length to cover it.
    pub fn set_element(&mut self, index: u32, value: Value) {
        let dense_len = self.elements.len();
        if let Some(slot) = self.elements.get_mut(index as usize) {
            *slot = value;
            return;
        }
        let gap = index as usize - dense_len;
        if self.sparse.is_none() && gap <= MAX_DENSE_GAP as usize {
            self.elements.resize(index as usize, Value::Undefined);
            self.elements.push(value);
            return;
        }
        let length = self.array_length();
        let sparse = self.sparse.get_or_insert_with(|| {
            Box::new(SparseElements {
                values: BTreeMap::new(),
                length,
            })
        });
        sparse.values.insert(index, value);
        sparse.length = sparse.length.max(index.saturating_add(1));
    }

    /// Set the array length, dropping elements at or past it.
    pub fn set_array_length(&mut self, length: u32) {
        let dense_len = self.elements.len();
        if length as usize <= dense_len {
            self.elements.truncate(length as usize);
            self.sparse = None;
        } else if self.sparse.is_none() && length as usize - dense_len <= MAX_DENSE_GAP as usize {
            self.elements.resize(length as usize, Value::Undefined);
        } else {
            let sparse = self.sparse.get_or_insert_with(Box::default);
            drop(sparse.values.split_off(&length));
            sparse.length = length;
        }
    }

    /// Every element below the length, holes read as `undefined`. `None` if
    /// the array is longer than [`MAX_COPIED_ELEMENTS`].
    pub fn copy_elements(&self) -> Option<Vec<Value>> {
        let Some(sparse) = &self.sparse else {
            return Some(self.elements.clone());
        };
        if sparse.length > MAX_COPIED_ELEMENTS {
            return None;
        }
        let mut out = self.elements.clone();
        out.resize(sparse.length as usize, Value::Undefined);
        for (index, value) in &sparse.values {
            out[*index as usize] = value.clone();
        }
        Some(out)
    }
}

/// Safety: every slot, element, the prototype and any iterator target or
/// enclosing scope are reported.
unsafe impl Trace for JsObject {
    fn trace(&self, tracer: &mut dyn Tracer) {
        tracer.trace_cell(CellRef::Shape(self.shape), "object-shape");
        if let Some(proto) = self.proto {
            tracer.trace_cell(CellRef::Object(proto), "object-proto");
        }
        for slot in &self.slots {
            tracer.trace_value(slot, "object-slot");
        }
        for element in &self.elements {
            tracer.trace_value(element, "object-element");
        }
        if let Some(sparse) = &self.sparse {
            for element in sparse.values.values() {
                tracer.trace_value(element, "object-element");
            }
        }
        match &self.kind {
            ObjectKind::ArrayIterator { target, .. } => {
                tracer.trace_cell(CellRef::Object(*target), "iterator-target");
            }
            ObjectKind::Environment {
                parent: Some(parent),
            } => {
                tracer.trace_cell(CellRef::Object(*parent), "environment-parent");
            }
            _ => {}
        }
    }

    fn size_of(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.slots.len().saturating_sub(INLINE_SLOTS) * std::mem::size_of::<Value>()
            + self.elements.capacity() * std::mem::size_of::<Value>()
            + self.sparse.as_ref().map_or(0, |sparse| {
                std::mem::size_of::<SparseElements>()
                    + sparse.values.len() * (std::mem::size_of::<u32>() + std::mem::size_of::<Value>())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;
    use strata_gc::EdgeCollector;

    fn plain(kind: ObjectKind) -> JsObject {
        JsObject {
            shape: ShapeId::EMPTY,
            proto: None,
            slots: SmallVec::new(),
            elements: Vec::new(),
            sparse: None,
            kind,
            tenured: false,
        }
    }

    #[test]
    fn test_kind_classes() {
        assert_eq!(ObjectKind::Plain.class(), ObjectClass::Plain);
        assert_eq!(ObjectKind::Array.class(), ObjectClass::Array);
        assert_eq!(
            ObjectKind::Environment { parent: None }.class(),
            ObjectClass::Environment
        );
    }

    #[test]
    fn test_trace_reports_all_edges() {
        let mut obj = plain(ObjectKind::Array);
        obj.proto = Some(ObjectRef::from_index(1));
        obj.slots = smallvec![Value::Object(ObjectRef::from_index(2)), Value::Int32(3)];
        obj.elements = vec![Value::Object(ObjectRef::from_index(4))];

        let mut tracer = EdgeCollector::new();
        obj.trace(&mut tracer);

        assert_eq!(tracer.count_named("object-shape"), 1);
        assert_eq!(tracer.count_named("object-proto"), 1);
        assert_eq!(tracer.count_named("object-slot"), 1);
        assert_eq!(tracer.count_named("object-element"), 1);
    }

    #[test]
    fn test_far_write_goes_sparse() {
        let mut obj = plain(ObjectKind::Array);
        obj.set_element(2, Value::Int32(2));
        assert_eq!(obj.elements.len(), 3);
        assert!(obj.sparse.is_none());

        obj.set_element(u32::MAX - 1, Value::Int32(7));
        assert_eq!(obj.elements.len(), 3);
        assert_eq!(obj.array_length(), u32::MAX);
        assert_eq!(obj.element(u32::MAX - 1), Some(&Value::Int32(7)));
        assert_eq!(obj.element(2), Some(&Value::Int32(2)));
        assert_eq!(obj.element(1000), None);
        assert_eq!(obj.copy_elements(), None);
    }

    #[test]
    fn test_sparse_array_stops_growing_densely() {
        let mut obj = plain(ObjectKind::Array);
        obj.set_element(5000, Value::Int32(1));
        obj.set_element(0, Value::Int32(0));
        assert!(obj.elements.is_empty());
        assert_eq!(obj.array_length(), 5001);
        assert_eq!(obj.element(0), Some(&Value::Int32(0)));

        let copied = obj.copy_elements().unwrap();
        assert_eq!(copied.len(), 5001);
        assert_eq!(copied[0], Value::Int32(0));
        assert_eq!(copied[1], Value::Undefined);
        assert_eq!(copied[5000], Value::Int32(1));
    }

    #[test]
    fn test_array_length_truncates_and_extends() {
        let mut obj = plain(ObjectKind::Array);
        obj.set_element(0, Value::Int32(0));
        obj.set_element(100_000, Value::Int32(1));

        obj.set_array_length(50_000);
        assert_eq!(obj.array_length(), 50_000);
        assert_eq!(obj.element(100_000), None);

        obj.set_array_length(1);
        assert!(obj.sparse.is_none());
        assert_eq!(obj.elements, vec![Value::Int32(0)]);

        obj.set_array_length(u32::MAX);
        assert_eq!(obj.array_length(), u32::MAX);
        assert_eq!(obj.elements.len(), 1);
    }

    #[test]
    fn test_sparse_elements_are_traced() {
        let mut obj = plain(ObjectKind::Array);
        obj.set_element(1 << 30, Value::Object(ObjectRef::from_index(9)));
        let mut tracer = EdgeCollector::new();
        obj.trace(&mut tracer);
        assert!(tracer.contains(CellRef::Object(ObjectRef::from_index(9))));
    }

    #[test]
    fn test_iterator_traces_target() {
        let obj = plain(ObjectKind::ArrayIterator {
            target: ObjectRef::from_index(7),
            next_index: 0,
        });
        let mut tracer = EdgeCollector::new();
        obj.trace(&mut tracer);
        assert!(tracer.contains(CellRef::Object(ObjectRef::from_index(7))));
    }
}
