use thiserror::Error;

/// Closed set of error kinds per the error handling design (§7).
///
/// Every component-facing API in the workspace returns (or wraps) one of
/// these so callers can branch on `kind()` rather than string-matching.
#[derive(Debug, Error)]
pub enum ScrybeError {
    #[error("integrity fault: {0}")]
    IntegrityFault(String),

    #[error("capability denied: {0}")]
    CapabilityDenied(String),

    #[error("plugin timed out after {0:?}")]
    PluginTimeout(std::time::Duration),

    #[error("plugin crashed: {0}")]
    PluginCrash(String),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("contract incomplete: {0}")]
    ContractIncomplete(String),

    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("preempted: {0}")]
    Preempted(String),

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("recovery required: {0}")]
    RecoveryRequired(String),
}

impl ScrybeError {
    /// Stable machine-readable tag for ledger entries and query-trace logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrybeError::IntegrityFault(_) => "integrity_fault",
            ScrybeError::CapabilityDenied(_) => "capability_denied",
            ScrybeError::PluginTimeout(_) => "plugin_timeout",
            ScrybeError::PluginCrash(_) => "plugin_crash",
            ScrybeError::SchemaMismatch(_) => "schema_mismatch",
            ScrybeError::ContractIncomplete(_) => "contract_incomplete",
            ScrybeError::BudgetExceeded(_) => "budget_exceeded",
            ScrybeError::Preempted(_) => "preempted",
            ScrybeError::DependencyUnavailable(_) => "dependency_unavailable",
            ScrybeError::RecoveryRequired(_) => "recovery_required",
        }
    }

    /// `true` for errors that must stop writes to the affected record store
    /// (fatal), `false` for errors that are recovered locally per-frame.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScrybeError::IntegrityFault(_) | ScrybeError::RecoveryRequired(_))
    }
}

pub type Result<T> = std::result::Result<T, ScrybeError>;
