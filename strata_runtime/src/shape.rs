//! Shape transition tree.
//!
//! Objects that received the same sequence of property additions, starting
//! from the same prototype and class, share a shape. Adding a property moves
//! an object to a child shape; overwriting one does not. Inline caches rely
//! on exactly this: `ShapeId` equality before and after a write tells them
//! whether a slot was added.
//!
//! ```text
//!   root(proto=P, Plain)
//!        │ +x
//!     Shape#1 ── +y ──► Shape#2 (x, y)
//!        │ +z
//!     Shape#3 (x, z)
//! ```
//!
//! Shapes are arena-allocated and never freed; ids index the arena.

use rustc_hash::FxHashMap;
use strata_core::{ObjectRef, PropertyKey, ShapeId};

// =============================================================================
// Property Attributes
// =============================================================================

bitflags::bitflags! {
    /// Property attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PropertyFlags: u8 {
        /// Value can be changed.
        const WRITABLE = 1 << 0;
        /// Visible to enumeration.
        const ENUMERABLE = 1 << 1;
        /// Can be deleted or redefined.
        const CONFIGURABLE = 1 << 2;
    }
}

impl Default for PropertyFlags {
    /// Plain assignment creates writable, enumerable, configurable properties.
    #[inline]
    fn default() -> Self {
        Self::WRITABLE | Self::ENUMERABLE | Self::CONFIGURABLE
    }
}

impl PropertyFlags {
    /// Flags for non-enumerable initializers.
    #[inline]
    pub const fn hidden() -> Self {
        Self::WRITABLE.union(Self::CONFIGURABLE)
    }

    /// Flags for locked initializers (read-only, permanent).
    #[inline]
    pub const fn locked() -> Self {
        Self::ENUMERABLE
    }
}

/// Where a property lives in an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    /// Property key.
    pub key: PropertyKey,
    /// Slot index in the object's slot vector.
    pub slot: u32,
    /// Attributes.
    pub flags: PropertyFlags,
}

impl PropertyDescriptor {
    /// Check if the property is writable.
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.flags.contains(PropertyFlags::WRITABLE)
    }

    /// Check if the property is enumerable.
    #[inline]
    pub fn is_enumerable(&self) -> bool {
        self.flags.contains(PropertyFlags::ENUMERABLE)
    }
}

// =============================================================================
// Object Class
// =============================================================================

/// Coarse object class, part of shape identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjectClass {
    /// Ordinary object.
    Plain = 0,
    /// Dense array.
    Array = 1,
    /// Callable.
    Function = 2,
    /// Array iterator.
    Iterator = 3,
    /// Scope object.
    Environment = 4,
}

// =============================================================================
// Shape
// =============================================================================

/// One node of the transition tree.
#[derive(Debug)]
pub struct Shape {
    id: ShapeId,
    parent: Option<ShapeId>,
    property: Option<PropertyDescriptor>,
    proto: Option<ObjectRef>,
    class: ObjectClass,
    slot_count: u32,
    transitions: FxHashMap<(PropertyKey, PropertyFlags), ShapeId>,
}

impl Shape {
    /// Shape identity.
    #[inline]
    pub fn id(&self) -> ShapeId {
        self.id
    }

    /// Parent shape, `None` for roots.
    #[inline]
    pub fn parent(&self) -> Option<ShapeId> {
        self.parent
    }

    /// Property added by this transition.
    #[inline]
    pub fn property(&self) -> Option<&PropertyDescriptor> {
        self.property.as_ref()
    }

    /// Prototype shared by objects of this shape.
    #[inline]
    pub fn proto(&self) -> Option<ObjectRef> {
        self.proto
    }

    /// Object class.
    #[inline]
    pub fn class(&self) -> ObjectClass {
        self.class
    }

    /// Number of slots objects of this shape carry.
    #[inline]
    pub fn slot_count(&self) -> u32 {
        self.slot_count
    }
}

/// Arena of shapes with transition lookup.
#[derive(Debug)]
pub struct ShapeTable {
    shapes: Vec<Shape>,
    roots: FxHashMap<(Option<ObjectRef>, ObjectClass), ShapeId>,
}

impl ShapeTable {
    /// Create a table holding only [`ShapeId::EMPTY`] (no proto, plain).
    #[must_use]
    pub fn new() -> Self {
        let mut table = Self {
            shapes: Vec::new(),
            roots: FxHashMap::default(),
        };
        table.root(None, ObjectClass::Plain);
        table
    }

    /// Get or create the root shape for a prototype and class.
    pub fn root(&mut self, proto: Option<ObjectRef>, class: ObjectClass) -> ShapeId {
        if let Some(&id) = self.roots.get(&(proto, class)) {
            return id;
        }
        let id = self.push(Shape {
            id: ShapeId::EMPTY,
            parent: None,
            property: None,
            proto,
            class,
            slot_count: 0,
            transitions: FxHashMap::default(),
        });
        self.roots.insert((proto, class), id);
        id
    }

    fn push(&mut self, mut shape: Shape) -> ShapeId {
        let id = ShapeId(self.shapes.len() as u32);
        shape.id = id;
        self.shapes.push(shape);
        id
    }

    /// Get a shape.
    ///
    /// # Panics
    ///
    /// Panics on an id this table never handed out.
    #[inline]
    pub fn get(&self, id: ShapeId) -> &Shape {
        &self.shapes[id.raw() as usize]
    }

    /// Follow (or create) the transition adding `key` with `flags`.
    pub fn add_property(&mut self, from: ShapeId, key: PropertyKey, flags: PropertyFlags) -> ShapeId {
        if let Some(&to) = self.get(from).transitions.get(&(key.clone(), flags)) {
            return to;
        }
        let parent = self.get(from);
        let (proto, class, slot) = (parent.proto, parent.class, parent.slot_count);
        let to = self.push(Shape {
            id: ShapeId::EMPTY,
            parent: Some(from),
            property: Some(PropertyDescriptor {
                key: key.clone(),
                slot,
                flags,
            }),
            proto,
            class,
            slot_count: slot + 1,
            transitions: FxHashMap::default(),
        });
        self.shapes[from.raw() as usize]
            .transitions
            .insert((key, flags), to);
        to
    }

    /// Find the descriptor for `key`, walking toward the root.
    pub fn lookup(&self, mut id: ShapeId, key: &PropertyKey) -> Option<&PropertyDescriptor> {
        loop {
            let shape = self.get(id);
            if let Some(desc) = &shape.property {
                if &desc.key == key {
                    return Some(desc);
                }
            }
            id = shape.parent?;
        }
    }

    /// All descriptors in slot order.
    pub fn descriptors(&self, mut id: ShapeId) -> Vec<PropertyDescriptor> {
        let mut out = Vec::new();
        loop {
            let shape = self.get(id);
            if let Some(desc) = &shape.property {
                out.push(desc.clone());
            }
            match shape.parent {
                Some(parent) => id = parent,
                None => break,
            }
        }
        out.reverse();
        out
    }

    /// Number of shapes allocated.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Always false: the empty root is created eagerly.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

impl Default for ShapeTable {
    fn default() -> Self {
        Self::new()
    }
}
