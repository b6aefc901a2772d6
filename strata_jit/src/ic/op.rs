//! Bytecode operations that carry inline caches, and their operands.

use super::kind::FallbackKind;
use std::fmt;
use strata_core::{InternedString, intern};
use strata_runtime::{BinaryOp, CompareOp, PrivateFieldCheck, UnaryOp};

// =============================================================================
// Op
// =============================================================================

/// A bytecode operation.
///
/// Only the operations that may own a cache entry are distinguished, plus a
/// handful of plain ones so scripts can interleave sites with ordinary code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Op {
    // -------------------------------------------------------------------------
    // No IC
    // -------------------------------------------------------------------------
    Nop,
    Pop,
    Jump,
    Return,
    GetLocal,
    SetLocal,

    // -------------------------------------------------------------------------
    // Truthiness
    // -------------------------------------------------------------------------
    Not,
    And,
    Or,
    JumpIfFalse,
    JumpIfTrue,

    // -------------------------------------------------------------------------
    // Arithmetic
    // -------------------------------------------------------------------------
    BitNot,
    Pos,
    Neg,
    Inc,
    Dec,
    ToNumeric,
    BitOr,
    BitXor,
    BitAnd,
    Lsh,
    Rsh,
    Ursh,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,

    // -------------------------------------------------------------------------
    // Comparison
    // -------------------------------------------------------------------------
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    StrictEq,
    StrictNe,

    // -------------------------------------------------------------------------
    // Allocation
    // -------------------------------------------------------------------------
    NewArray,
    NewObject,
    NewInit,
    Rest,

    // -------------------------------------------------------------------------
    // Element writes
    // -------------------------------------------------------------------------
    InitElem,
    InitHiddenElem,
    InitLockedElem,
    InitElemInc,
    SetElem,
    StrictSetElem,

    // -------------------------------------------------------------------------
    // Named writes
    // -------------------------------------------------------------------------
    InitProp,
    InitLockedProp,
    InitHiddenProp,
    InitGLexical,
    SetProp,
    StrictSetProp,
    SetName,
    StrictSetName,
    SetGName,
    StrictSetGName,

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------
    GetProp,
    GetBoundName,
    GetPropSuper,
    GetElem,
    GetElemSuper,
    In,
    HasOwn,
    CheckPrivateField,
    GetName,
    GetGName,
    BindName,
    BindGName,
    GetIntrinsic,

    // -------------------------------------------------------------------------
    // Calls
    // -------------------------------------------------------------------------
    Call,
    CallIgnoresRv,
    CallIter,
    FunCall,
    FunApply,
    Eval,
    StrictEval,
    SuperCall,
    New,
    SpreadCall,
    SpreadEval,
    StrictSpreadEval,
    SpreadSuperCall,
    SpreadNew,

    // -------------------------------------------------------------------------
    // Misc
    // -------------------------------------------------------------------------
    Instanceof,
    Typeof,
    TypeofExpr,
    ToPropertyKey,
    Iter,
    OptimizeSpreadCall,
}

impl Op {
    /// Fallback kind of the cache this op owns, if any.
    pub const fn fallback_kind(self) -> Option<FallbackKind> {
        use FallbackKind as K;
        Some(match self {
            Self::Nop | Self::Pop | Self::Jump | Self::Return | Self::GetLocal | Self::SetLocal => {
                return None;
            }
            Self::Not | Self::And | Self::Or | Self::JumpIfFalse | Self::JumpIfTrue => K::ToBool,
            Self::BitNot | Self::Pos | Self::Neg | Self::Inc | Self::Dec | Self::ToNumeric => {
                K::UnaryArith
            }
            Self::BitOr
            | Self::BitXor
            | Self::BitAnd
            | Self::Lsh
            | Self::Rsh
            | Self::Ursh
            | Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Div
            | Self::Mod
            | Self::Pow => K::BinaryArith,
            Self::Eq
            | Self::Ne
            | Self::Lt
            | Self::Le
            | Self::Gt
            | Self::Ge
            | Self::StrictEq
            | Self::StrictNe => K::Compare,
            Self::NewArray => K::NewArray,
            Self::NewObject | Self::NewInit => K::NewObject,
            Self::InitElem
            | Self::InitHiddenElem
            | Self::InitLockedElem
            | Self::InitElemInc
            | Self::SetElem
            | Self::StrictSetElem => K::SetElem,
            Self::InitProp
            | Self::InitLockedProp
            | Self::InitHiddenProp
            | Self::InitGLexical
            | Self::SetProp
            | Self::StrictSetProp
            | Self::SetName
            | Self::StrictSetName
            | Self::SetGName
            | Self::StrictSetGName => K::SetProp,
            Self::GetProp | Self::GetBoundName => K::GetProp,
            Self::GetPropSuper => K::GetPropSuper,
            Self::GetElem => K::GetElem,
            Self::GetElemSuper => K::GetElemSuper,
            Self::In => K::In,
            Self::HasOwn => K::HasOwn,
            Self::CheckPrivateField => K::CheckPrivateField,
            Self::GetName | Self::GetGName => K::GetName,
            Self::BindName | Self::BindGName => K::BindName,
            Self::GetIntrinsic => K::GetIntrinsic,
            Self::Call
            | Self::CallIgnoresRv
            | Self::CallIter
            | Self::FunCall
            | Self::FunApply
            | Self::Eval
            | Self::StrictEval => K::Call,
            Self::SuperCall | Self::New => K::CallConstructing,
            Self::SpreadCall | Self::SpreadEval | Self::StrictSpreadEval => K::SpreadCall,
            Self::SpreadSuperCall | Self::SpreadNew => K::SpreadCallConstructing,
            Self::Instanceof => K::InstanceOf,
            Self::Typeof | Self::TypeofExpr => K::TypeOf,
            Self::ToPropertyKey => K::ToPropertyKey,
            Self::Iter => K::GetIterator,
            Self::OptimizeSpreadCall => K::OptimizeSpreadCall,
            Self::Rest => K::Rest,
        })
    }

    /// Operand shape this op requires.
    pub const fn operand_kind(self) -> OperandKind {
        match self {
            Self::InitProp
            | Self::InitLockedProp
            | Self::InitHiddenProp
            | Self::InitGLexical
            | Self::SetProp
            | Self::StrictSetProp
            | Self::SetName
            | Self::StrictSetName
            | Self::SetGName
            | Self::StrictSetGName
            | Self::GetProp
            | Self::GetBoundName
            | Self::GetPropSuper
            | Self::GetName
            | Self::GetGName
            | Self::BindName
            | Self::BindGName
            | Self::GetIntrinsic => OperandKind::Name,
            Self::Call
            | Self::CallIgnoresRv
            | Self::CallIter
            | Self::FunCall
            | Self::FunApply
            | Self::Eval
            | Self::StrictEval
            | Self::SuperCall
            | Self::New => OperandKind::Argc,
            Self::NewArray => OperandKind::Length,
            Self::CheckPrivateField => OperandKind::PrivateCheck,
            Self::Rest => OperandKind::Formals,
            _ => OperandKind::None,
        }
    }

    /// Strict-mode variants of writes and evals.
    pub const fn is_strict(self) -> bool {
        matches!(
            self,
            Self::StrictSetElem
                | Self::StrictSetProp
                | Self::StrictSetName
                | Self::StrictSetGName
                | Self::StrictEval
                | Self::StrictSpreadEval
        )
    }

    /// `new` and `super()` calls.
    pub const fn is_constructing(self) -> bool {
        matches!(
            self,
            Self::New | Self::SuperCall | Self::SpreadNew | Self::SpreadSuperCall
        )
    }

    /// Calls that may be a direct eval.
    pub const fn is_eval(self) -> bool {
        matches!(
            self,
            Self::Eval | Self::StrictEval | Self::SpreadEval | Self::StrictSpreadEval
        )
    }

    /// Operator for unary arithmetic ops.
    pub const fn unary_op(self) -> Option<UnaryOp> {
        Some(match self {
            Self::BitNot => UnaryOp::BitNot,
            Self::Pos => UnaryOp::Pos,
            Self::Neg => UnaryOp::Neg,
            Self::Inc => UnaryOp::Inc,
            Self::Dec => UnaryOp::Dec,
            Self::ToNumeric => UnaryOp::ToNumeric,
            _ => return None,
        })
    }

    /// Operator for binary arithmetic ops.
    pub const fn binary_op(self) -> Option<BinaryOp> {
        Some(match self {
            Self::BitOr => BinaryOp::BitOr,
            Self::BitXor => BinaryOp::BitXor,
            Self::BitAnd => BinaryOp::BitAnd,
            Self::Lsh => BinaryOp::Lsh,
            Self::Rsh => BinaryOp::Rsh,
            Self::Ursh => BinaryOp::Ursh,
            Self::Add => BinaryOp::Add,
            Self::Sub => BinaryOp::Sub,
            Self::Mul => BinaryOp::Mul,
            Self::Div => BinaryOp::Div,
            Self::Mod => BinaryOp::Mod,
            Self::Pow => BinaryOp::Pow,
            _ => return None,
        })
    }

    /// Operator for comparison ops.
    pub const fn compare_op(self) -> Option<CompareOp> {
        Some(match self {
            Self::Eq => CompareOp::Eq,
            Self::Ne => CompareOp::Ne,
            Self::Lt => CompareOp::Lt,
            Self::Le => CompareOp::Le,
            Self::Gt => CompareOp::Gt,
            Self::Ge => CompareOp::Ge,
            Self::StrictEq => CompareOp::StrictEq,
            Self::StrictNe => CompareOp::StrictNe,
            _ => return None,
        })
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// Operands
// =============================================================================

/// Operand category an op expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// No operand.
    None,
    /// Property, binding or intrinsic name.
    Name,
    /// Argument count.
    Argc,
    /// Array literal length.
    Length,
    /// Private field throw behaviour.
    PrivateCheck,
    /// Number of formal parameters before the rest array.
    Formals,
}

/// Immediate operand of a site.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand.
    None,
    /// Name.
    Name(InternedString),
    /// Argument count.
    Argc(u16),
    /// Array literal length.
    Length(u32),
    /// Private field throw behaviour.
    PrivateCheck(PrivateFieldCheck),
    /// Formal parameter count.
    Formals(u16),
}

impl Operand {
    /// Category of this operand.
    pub const fn kind(&self) -> OperandKind {
        match self {
            Self::None => OperandKind::None,
            Self::Name(_) => OperandKind::Name,
            Self::Argc(_) => OperandKind::Argc,
            Self::Length(_) => OperandKind::Length,
            Self::PrivateCheck(_) => OperandKind::PrivateCheck,
            Self::Formals(_) => OperandKind::Formals,
        }
    }

    /// Name operand.
    pub fn name(&self) -> Option<&InternedString> {
        match self {
            Self::Name(name) => Some(name),
            _ => None,
        }
    }
}

// =============================================================================
// Sites
// =============================================================================

/// One bytecode location handed to [`IcScript`](super::IcScript) construction.
#[derive(Debug, Clone, PartialEq)]
pub struct IcSite {
    /// Bytecode offset.
    pub offset: u32,
    /// Operation at the offset.
    pub op: Op,
    /// Immediate operand.
    pub operand: Operand,
}

impl IcSite {
    /// Site without an operand.
    pub fn new(offset: u32, op: Op) -> Self {
        Self {
            offset,
            op,
            operand: Operand::None,
        }
    }

    /// Site with a name operand.
    pub fn named(offset: u32, op: Op, name: &str) -> Self {
        Self {
            offset,
            op,
            operand: Operand::Name(intern(name)),
        }
    }

    /// Call site with an argument count.
    pub fn call(offset: u32, op: Op, argc: u16) -> Self {
        Self {
            offset,
            op,
            operand: Operand::Argc(argc),
        }
    }

    /// Array literal with a length.
    pub fn new_array(offset: u32, length: u32) -> Self {
        Self {
            offset,
            op: Op::NewArray,
            operand: Operand::Length(length),
        }
    }

    /// Private field check.
    pub fn private_check(offset: u32, check: PrivateFieldCheck) -> Self {
        Self {
            offset,
            op: Op::CheckPrivateField,
            operand: Operand::PrivateCheck(check),
        }
    }

    /// Rest parameter array after `formals` formals.
    pub fn rest(offset: u32, formals: u16) -> Self {
        Self {
            offset,
            op: Op::Rest,
            operand: Operand::Formals(formals),
        }
    }
}
