//! Atom interning for property names and string values.
//!
//! Property keys flow through every inline cache as stub data, so two keys must
//! compare in O(1). The interner hands out `InternedString` atoms backed by a
//! shared `Arc<str>`; atoms produced by the same interner compare by pointer.
//!
//! A process-wide interner (`intern`) is used by the object model and the IC
//! layer alike, which keeps atom identity stable across crates.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

/// An interned string atom.
///
/// Cloning an atom bumps a reference count. Equality and hashing use the
/// backing pointer, so atoms from different interners never compare equal
/// even when their contents match. Use [`InternedString::same_text`] when
/// content comparison is wanted.
#[derive(Clone)]
pub struct InternedString {
    inner: Arc<str>,
}

impl InternedString {
    #[inline]
    fn new(inner: Arc<str>) -> Self {
        Self { inner }
    }

    /// Get the string content.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if the atom is the empty string.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Compare contents, ignoring which interner produced the atoms.
    #[inline]
    #[must_use]
    pub fn same_text(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || *self.inner == *other.inner
    }

    /// Parse the atom as a canonical array index (`0..2^32-1`).
    ///
    /// Leading zeros are rejected except for `"0"` itself, matching how
    /// element keys are canonicalized by the object model.
    #[must_use]
    pub fn as_array_index(&self) -> Option<u32> {
        let s = self.as_str();
        if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
            return None;
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        match s.parse::<u64>() {
            Ok(n) if n < u64::from(u32::MAX) => Some(n as u32),
            _ => None,
        }
    }

    #[inline]
    fn ptr(&self) -> *const u8 {
        self.inner.as_ptr()
    }
}

impl PartialEq for InternedString {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for InternedString {}

impl Hash for InternedString {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ptr().hash(state);
    }
}

impl fmt::Debug for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for InternedString {
    #[inline]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::ops::Deref for InternedString {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl PartialEq<str> for InternedString {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for InternedString {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// Thread-safe atom table.
pub struct StringInterner {
    atoms: RwLock<FxHashMap<Arc<str>, InternedString>>,
}

impl StringInterner {
    /// Create an empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self {
            atoms: RwLock::new(FxHashMap::default()),
        }
    }

    /// Intern a borrowed string.
    pub fn intern(&self, s: &str) -> InternedString {
        if let Some(atom) = self.atoms.read().get(s) {
            return atom.clone();
        }
        self.insert_slow(s.into())
    }

    /// Intern an owned string, reusing its allocation on a miss.
    pub fn intern_owned(&self, s: String) -> InternedString {
        if let Some(atom) = self.atoms.read().get(s.as_str()) {
            return atom.clone();
        }
        self.insert_slow(s.into())
    }

    fn insert_slow(&self, text: Arc<str>) -> InternedString {
        let mut atoms = self.atoms.write();
        // Another thread may have won the race between the two locks.
        if let Some(atom) = atoms.get(&*text) {
            return atom.clone();
        }
        let atom = InternedString::new(text.clone());
        atoms.insert(text, atom.clone());
        atom
    }

    /// Look up an atom without creating it.
    #[must_use]
    pub fn get(&self, s: &str) -> Option<InternedString> {
        self.atoms.read().get(s).cloned()
    }

    /// Number of atoms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.atoms.read().len()
    }

    /// Check if no atoms have been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.atoms.read().is_empty()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StringInterner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringInterner")
            .field("atoms", &self.len())
            .finish()
    }
}

/// The process-wide atom table.
pub static GLOBAL_INTERNER: LazyLock<StringInterner> = LazyLock::new(StringInterner::new);

/// Intern a string in the global table.
#[inline]
pub fn intern(s: &str) -> InternedString {
    GLOBAL_INTERNER.intern(s)
}

/// Intern an owned string in the global table.
#[inline]
pub fn intern_owned(s: String) -> InternedString {
    GLOBAL_INTERNER.intern_owned(s)
}
