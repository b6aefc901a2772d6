//! The tracing contract between the collector and everything that holds
//! GC-managed references.
//!
//! # Architecture
//!
//! The collector hands a [`Tracer`] to each root holder. A holder implements
//! [`Trace`] and reports every edge it owns, one call per edge:
//!
//! ```text
//!   collector ──► holder.trace(&mut tracer)
//!                    ├─► tracer.trace_cell(Shape#4,  "stub-shape")
//!                    ├─► tracer.trace_cell(Code#17,  "stub-code")
//!                    └─► tracer.trace_value(&v,      "stub-value")
//! ```
//!
//! Edges carry a static name so heap dumps and tests can tell them apart.
//!
//! # Safety
//!
//! `Trace` is an `unsafe` trait: an implementation that forgets an edge lets
//! the collector reclaim a live cell.

use strata_core::{ObjectRef, ShapeId, Value};
use std::fmt;

// =============================================================================
// Cells
// =============================================================================

/// Identity of a compiled code object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodeId(pub u64);

impl fmt::Debug for CodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Code#{}", self.0)
    }
}

/// A reference to a GC-managed cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellRef {
    /// Script object.
    Object(ObjectRef),
    /// Object layout.
    Shape(ShapeId),
    /// Compiled code.
    Code(CodeId),
}

impl CellRef {
    /// Get the object handle, if this is an object cell.
    #[inline]
    #[must_use]
    pub fn as_object(self) -> Option<ObjectRef> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

// =============================================================================
// Tracer / Trace
// =============================================================================

/// Visitor invoked for every traced edge.
pub trait Tracer {
    /// Visit a cell edge.
    fn trace_cell(&mut self, cell: CellRef, name: &'static str);

    /// Visit a value edge. Only object values reach the heap graph.
    fn trace_value(&mut self, value: &Value, name: &'static str) {
        if let Value::Object(obj) = value {
            self.trace_cell(CellRef::Object(*obj), name);
        }
    }
}

/// A type that owns GC-managed edges.
///
/// # Safety
///
/// `trace` must report every GC-managed reference the value owns. Missing an
/// edge allows the collector to reclaim a cell that is still reachable.
pub unsafe trait Trace {
    /// Report owned edges.
    fn trace(&self, tracer: &mut dyn Tracer);

    /// Approximate retained size in bytes.
    fn size_of(&self) -> usize {
        std::mem::size_of_val(self)
    }
}

/// Safety: a value owns at most one object edge, reported here.
unsafe impl Trace for Value {
    #[inline]
    fn trace(&self, tracer: &mut dyn Tracer) {
        tracer.trace_value(self, "value");
    }
}

/// Safety: `None` owns nothing; `Some` delegates.
unsafe impl<T: Trace> Trace for Option<T> {
    #[inline]
    fn trace(&self, tracer: &mut dyn Tracer) {
        if let Some(inner) = self {
            inner.trace(tracer);
        }
    }
}

/// Safety: every element is traced.
unsafe impl<T: Trace> Trace for Vec<T> {
    fn trace(&self, tracer: &mut dyn Tracer) {
        for item in self {
            item.trace(tracer);
        }
    }

    fn size_of(&self) -> usize {
        std::mem::size_of::<Self>() + self.capacity() * std::mem::size_of::<T>()
    }
}

// =============================================================================
// Edge Collector
// =============================================================================

/// Tracer that records every edge it is shown.
///
/// Used by the marker to gather roots and by tests to inspect what a holder
/// reports.
#[derive(Debug, Default)]
pub struct EdgeCollector {
    edges: Vec<(CellRef, &'static str)>,
}

impl EdgeCollector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded edges in visit order.
    #[must_use]
    pub fn edges(&self) -> &[(CellRef, &'static str)] {
        &self.edges
    }

    /// Number of recorded edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Check for no recorded edges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Count edges recorded under `name`.
    #[must_use]
    pub fn count_named(&self, name: &str) -> usize {
        self.edges.iter().filter(|(_, n)| *n == name).count()
    }

    /// Check whether `cell` was reported.
    #[must_use]
    pub fn contains(&self, cell: CellRef) -> bool {
        self.edges.iter().any(|(c, _)| *c == cell)
    }

    /// Take the recorded edges, leaving the collector empty.
    pub fn take(&mut self) -> Vec<(CellRef, &'static str)> {
        std::mem::take(&mut self.edges)
    }
}

impl Tracer for EdgeCollector {
    fn trace_cell(&mut self, cell: CellRef, name: &'static str) {
        self.edges.push((cell, name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pair {
        a: Value,
        b: Option<Value>,
    }

    unsafe impl Trace for Pair {
        fn trace(&self, tracer: &mut dyn Tracer) {
            tracer.trace_value(&self.a, "pair-a");
            if let Some(b) = &self.b {
                tracer.trace_value(b, "pair-b");
            }
        }
    }

    #[test]
    fn test_primitive_values_report_nothing() {
        let mut tracer = EdgeCollector::new();
        Value::Int32(3).trace(&mut tracer);
        Value::string("s").trace(&mut tracer);
        Value::Undefined.trace(&mut tracer);
        assert!(tracer.is_empty());
    }

    #[test]
    fn test_object_value_reports_cell() {
        let mut tracer = EdgeCollector::new();
        let obj = ObjectRef::from_index(9);
        Value::Object(obj).trace(&mut tracer);
        assert_eq!(tracer.edges(), &[(CellRef::Object(obj), "value")]);
    }

    #[test]
    fn test_option_and_vec_delegate() {
        let mut tracer = EdgeCollector::new();
        let values = vec![
            Value::Object(ObjectRef::from_index(1)),
            Value::Null,
            Value::Object(ObjectRef::from_index(2)),
        ];
        values.trace(&mut tracer);
        None::<Value>.trace(&mut tracer);
        assert_eq!(tracer.len(), 2);
    }

    #[test]
    fn test_named_edges() {
        let pair = Pair {
            a: Value::Object(ObjectRef::from_index(1)),
            b: Some(Value::Object(ObjectRef::from_index(2))),
        };
        let mut tracer = EdgeCollector::new();
        pair.trace(&mut tracer);
        assert_eq!(tracer.count_named("pair-a"), 1);
        assert_eq!(tracer.count_named("pair-b"), 1);
        assert!(tracer.contains(CellRef::Object(ObjectRef::from_index(2))));
        assert_eq!(tracer.take().len(), 2);
        assert!(tracer.is_empty());
    }
}
