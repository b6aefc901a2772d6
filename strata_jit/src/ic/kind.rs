//! Fallback and cache classification kinds.
//!
//! [`FallbackKind`] selects the fallback handler an entry dispatches to.
//! [`CacheKind`] is the key generators and compiled stubs are classified
//! under; several fallback kinds share one cache kind (every call flavour
//! compiles `Call` stubs).

use std::fmt;

// =============================================================================
// Fallback Kind
// =============================================================================

/// Operation kind of a fallback stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum FallbackKind {
    /// Truthiness of a value.
    ToBool = 0,
    /// Unary arithmetic.
    UnaryArith = 1,
    /// Binary arithmetic.
    BinaryArith = 2,
    /// Comparison.
    Compare = 3,
    /// Array literal allocation.
    NewArray = 4,
    /// Object literal allocation.
    NewObject = 5,
    /// Keyed property write.
    SetElem = 6,
    /// Named property write.
    SetProp = 7,
    /// Named property read.
    GetProp = 8,
    /// `super.name` read.
    GetPropSuper = 9,
    /// Keyed property read.
    GetElem = 10,
    /// `super[key]` read.
    GetElemSuper = 11,
    /// `key in obj`.
    In = 12,
    /// `Object.hasOwn`.
    HasOwn = 13,
    /// `#x in obj` and private field guards.
    CheckPrivateField = 14,
    /// Scope-chain read.
    GetName = 15,
    /// Scope-chain binding lookup.
    BindName = 16,
    /// Engine intrinsic.
    GetIntrinsic = 17,
    /// Ordinary call.
    Call = 18,
    /// `new` / `super()` call.
    CallConstructing = 19,
    /// Call with spread arguments.
    SpreadCall = 20,
    /// `new` / `super()` with spread arguments.
    SpreadCallConstructing = 21,
    /// `instanceof`.
    InstanceOf = 22,
    /// `typeof`.
    TypeOf = 23,
    /// ToPropertyKey.
    ToPropertyKey = 24,
    /// `obj[Symbol.iterator]()`.
    GetIterator = 25,
    /// Spread fast-path check.
    OptimizeSpreadCall = 26,
    /// Rest parameter array.
    Rest = 27,
}

impl FallbackKind {
    /// Number of fallback kinds.
    pub const COUNT: usize = 28;

    /// Every kind, in discriminant order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::ToBool,
        Self::UnaryArith,
        Self::BinaryArith,
        Self::Compare,
        Self::NewArray,
        Self::NewObject,
        Self::SetElem,
        Self::SetProp,
        Self::GetProp,
        Self::GetPropSuper,
        Self::GetElem,
        Self::GetElemSuper,
        Self::In,
        Self::HasOwn,
        Self::CheckPrivateField,
        Self::GetName,
        Self::BindName,
        Self::GetIntrinsic,
        Self::Call,
        Self::CallConstructing,
        Self::SpreadCall,
        Self::SpreadCallConstructing,
        Self::InstanceOf,
        Self::TypeOf,
        Self::ToPropertyKey,
        Self::GetIterator,
        Self::OptimizeSpreadCall,
        Self::Rest,
    ];

    /// Table index.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Name used for trampolines and log output.
    pub const fn name(self) -> &'static str {
        match self {
            Self::ToBool => "ToBool",
            Self::UnaryArith => "UnaryArith",
            Self::BinaryArith => "BinaryArith",
            Self::Compare => "Compare",
            Self::NewArray => "NewArray",
            Self::NewObject => "NewObject",
            Self::SetElem => "SetElem",
            Self::SetProp => "SetProp",
            Self::GetProp => "GetProp",
            Self::GetPropSuper => "GetPropSuper",
            Self::GetElem => "GetElem",
            Self::GetElemSuper => "GetElemSuper",
            Self::In => "In",
            Self::HasOwn => "HasOwn",
            Self::CheckPrivateField => "CheckPrivateField",
            Self::GetName => "GetName",
            Self::BindName => "BindName",
            Self::GetIntrinsic => "GetIntrinsic",
            Self::Call => "Call",
            Self::CallConstructing => "CallConstructing",
            Self::SpreadCall => "SpreadCall",
            Self::SpreadCallConstructing => "SpreadCallConstructing",
            Self::InstanceOf => "InstanceOf",
            Self::TypeOf => "TypeOf",
            Self::ToPropertyKey => "ToPropertyKey",
            Self::GetIterator => "GetIterator",
            Self::OptimizeSpreadCall => "OptimizeSpreadCall",
            Self::Rest => "Rest",
        }
    }

    /// Classification key stubs for this kind are generated under.
    ///
    /// `Rest` has none: it never attaches.
    pub const fn cache_kind(self) -> Option<CacheKind> {
        Some(match self {
            Self::ToBool => CacheKind::ToBool,
            Self::UnaryArith => CacheKind::UnaryArith,
            Self::BinaryArith => CacheKind::BinaryArith,
            Self::Compare => CacheKind::Compare,
            Self::NewArray => CacheKind::NewArray,
            Self::NewObject => CacheKind::NewObject,
            Self::SetElem => CacheKind::SetElem,
            Self::SetProp => CacheKind::SetProp,
            Self::GetProp => CacheKind::GetProp,
            Self::GetPropSuper => CacheKind::GetPropSuper,
            Self::GetElem => CacheKind::GetElem,
            Self::GetElemSuper => CacheKind::GetElemSuper,
            Self::In => CacheKind::In,
            Self::HasOwn => CacheKind::HasOwn,
            Self::CheckPrivateField => CacheKind::CheckPrivateField,
            Self::GetName => CacheKind::GetName,
            Self::BindName => CacheKind::BindName,
            Self::GetIntrinsic => CacheKind::GetIntrinsic,
            Self::Call
            | Self::CallConstructing
            | Self::SpreadCall
            | Self::SpreadCallConstructing => CacheKind::Call,
            Self::InstanceOf => CacheKind::InstanceOf,
            Self::TypeOf => CacheKind::TypeOf,
            Self::ToPropertyKey => CacheKind::ToPropertyKey,
            Self::GetIterator => CacheKind::GetIterator,
            Self::OptimizeSpreadCall => CacheKind::OptimizeSpreadCall,
            Self::Rest => return None,
        })
    }

    /// Property writes, the only kinds allowed to defer an attach decision.
    #[inline]
    pub const fn is_property_write(self) -> bool {
        matches!(self, Self::SetProp | Self::SetElem)
    }

    /// Kinds that run the generic operation before asking for a stub.
    #[inline]
    pub const fn attaches_after_op(self) -> bool {
        matches!(
            self,
            Self::UnaryArith
                | Self::BinaryArith
                | Self::Compare
                | Self::GetIntrinsic
                | Self::InstanceOf
                | Self::NewObject
        )
    }
}

impl fmt::Display for FallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Cache Kind
// =============================================================================

/// Classification key for generators and compiled stubs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// See [`FallbackKind::ToBool`].
    ToBool,
    /// See [`FallbackKind::UnaryArith`].
    UnaryArith,
    /// See [`FallbackKind::BinaryArith`].
    BinaryArith,
    /// See [`FallbackKind::Compare`].
    Compare,
    /// See [`FallbackKind::NewArray`].
    NewArray,
    /// See [`FallbackKind::NewObject`].
    NewObject,
    /// See [`FallbackKind::SetElem`].
    SetElem,
    /// See [`FallbackKind::SetProp`].
    SetProp,
    /// See [`FallbackKind::GetProp`].
    GetProp,
    /// See [`FallbackKind::GetPropSuper`].
    GetPropSuper,
    /// See [`FallbackKind::GetElem`].
    GetElem,
    /// See [`FallbackKind::GetElemSuper`].
    GetElemSuper,
    /// See [`FallbackKind::In`].
    In,
    /// See [`FallbackKind::HasOwn`].
    HasOwn,
    /// See [`FallbackKind::CheckPrivateField`].
    CheckPrivateField,
    /// See [`FallbackKind::GetName`].
    GetName,
    /// See [`FallbackKind::BindName`].
    BindName,
    /// See [`FallbackKind::GetIntrinsic`].
    GetIntrinsic,
    /// Every call flavour.
    Call,
    /// See [`FallbackKind::InstanceOf`].
    InstanceOf,
    /// See [`FallbackKind::TypeOf`].
    TypeOf,
    /// See [`FallbackKind::ToPropertyKey`].
    ToPropertyKey,
    /// See [`FallbackKind::GetIterator`].
    GetIterator,
    /// See [`FallbackKind::OptimizeSpreadCall`].
    OptimizeSpreadCall,
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_is_in_discriminant_order() {
        for (i, kind) in FallbackKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_only_writes_defer() {
        let writes: Vec<_> = FallbackKind::ALL
            .iter()
            .filter(|k| k.is_property_write())
            .collect();
        assert_eq!(writes, [&FallbackKind::SetElem, &FallbackKind::SetProp]);
    }

    #[test]
    fn test_call_flavours_share_cache_kind() {
        for kind in [
            FallbackKind::Call,
            FallbackKind::CallConstructing,
            FallbackKind::SpreadCall,
            FallbackKind::SpreadCallConstructing,
        ] {
            assert_eq!(kind.cache_kind(), Some(CacheKind::Call));
        }
        assert_eq!(FallbackKind::Rest.cache_kind(), None);
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<_> = FallbackKind::ALL.iter().map(|k| k.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), FallbackKind::COUNT);
    }
}
