//! Opaque shape identity.
//!
//! A shape describes an object's property layout. Caches never look inside a
//! shape; they only compare identities, so this crate exposes nothing but the
//! id. The transition tree that allocates ids lives in the object model.

use std::fmt;

/// Identity of an object layout.
///
/// Two objects with equal `ShapeId`s have the same properties in the same
/// slots with the same attributes and the same prototype.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(pub u32);

impl ShapeId {
    /// The root shape (no own properties).
    pub const EMPTY: Self = Self(0);

    /// Check for the root shape.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw id.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape#{}", self.0)
    }
}

impl Default for ShapeId {
    fn default() -> Self {
        Self::EMPTY
    }
}
