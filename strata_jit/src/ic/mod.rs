//! Baseline Inline Caches
//!
//! Per-callsite caches for the baseline tier. Every IC-bearing bytecode
//! operation owns an [`IcEntry`] whose stub chain is walked on each
//! execution:
//!
//! ```text
//!   IcEntry ──► Specialized ──► Specialized ──► Fallback
//!                (guards)        (guards)       (generic op + attach)
//! ```
//!
//! ## Components
//!
//! - **Stubs**: specialized code with embedded guard data, and the terminal
//!   fallback ([`stub`])
//! - **State**: Specialized → Megamorphic → Generic, forward only ([`state`])
//! - **Dispatcher**: one fallback handler per [`FallbackKind`] ([`fallback`])
//! - **Chain maintenance**: unlink / discard with write barriers ([`chain`])
//! - **Matcher**: the hot path ([`matcher`])
//! - **Tracing**: `IcScript` reports every owned edge to the collector
//!
//! ## Attachment
//!
//! Attaching is a side effect only. The value an operation produces is
//! always the one the generic [`ObjectOps`](strata_runtime::ObjectOps)
//! implementation computes, whether or not a stub was linked.

pub mod chain;
pub mod entry;
pub mod fallback;
pub mod generator;
pub mod kind;
pub mod matcher;
pub mod op;
pub mod runtime;
pub mod space;
pub mod state;
pub mod stub;
pub mod telemetry;
mod trace;
pub mod trampoline;


pub use chain::{ChainIter, discard_stubs, unlink_stub};
pub use entry::{IcEntry, IcScript, IcScriptStats};
pub use fallback::dispatch;
pub use generator::{
    AttachDecision, AttachRequest, GeneratorRegistry, IcInputs, StubCompiler, StubDescription,
    StubGenerator,
};
pub use kind::{CacheKind, FallbackKind};
pub use matcher::run;
pub use op::{IcSite, Op, Operand, OperandKind};
pub use runtime::IcRuntime;
pub use space::StubSpace;
pub use state::{IcMode, IcState};
pub use stub::{
    FallbackPayload, FallbackStub, JitCode, SpecializedStub, StubData, StubEntry, StubField,
    StubId, StubOutcome, StubRef,
};
pub use telemetry::{IcTelemetry, IcTelemetrySnapshot, global_ic_telemetry};
pub use trampoline::{
    BailoutReturn, Trampoline, TrampolineTable, init_trampolines, trampolines, try_trampolines,
};

/// Log target for per-hit fallback spew.
pub const FALLBACK_LOG_TARGET: &str = "baseline_ic_fallback";

/// Log target for attach / unlink / transition events.
pub const IC_LOG_TARGET: &str = "baseline_ic";

// =============================================================================
// Configuration
// =============================================================================

/// Limits that drive the attachment state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcConfig {
    /// Specialized stubs an entry may hold before going megamorphic.
    pub max_optimized_stubs: u8,
    /// Failure budget with no stubs attached.
    pub base_max_failures: u8,
    /// Extra failure budget per attached stub.
    pub failures_per_stub: u8,
    /// Clear the code reference of unlinked stubs that never call out.
    pub poison_unlinked_stubs: bool,
}

impl Default for IcConfig {
    fn default() -> Self {
        Self {
            max_optimized_stubs: 6,
            base_max_failures: 5,
            failures_per_stub: 40,
            poison_unlinked_stubs: cfg!(debug_assertions),
        }
    }
}

impl IcConfig {
    /// Small limits so tests reach every transition quickly.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            max_optimized_stubs: 3,
            base_max_failures: 3,
            failures_per_stub: 2,
            poison_unlinked_stubs: true,
        }
    }

    /// Never attach: the first fallback entry goes Generic.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_optimized_stubs: 0,
            base_max_failures: 0,
            failures_per_stub: 0,
            poison_unlinked_stubs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let config = IcConfig::default();
        assert_eq!(config.max_optimized_stubs, 6);
        assert_eq!(config.base_max_failures, 5);
        assert_eq!(config.failures_per_stub, 40);
        assert_eq!(config.poison_unlinked_stubs, cfg!(debug_assertions));
    }

    #[test]
    fn test_testing_config_is_smaller() {
        let testing = IcConfig::for_testing();
        let default = IcConfig::default();
        assert!(testing.max_optimized_stubs < default.max_optimized_stubs);
        assert!(testing.poison_unlinked_stubs);
    }

    #[test]
    fn test_disabled_config() {
        let config = IcConfig::disabled();
        assert_eq!(config.max_optimized_stubs, 0);
        assert!(!config.poison_unlinked_stubs);
    }
}
