use thiserror::Error;

/// Typed error hierarchy for the orchestration layer.
///
/// Adapters and leaf helpers keep using `anyhow::Result` internally; this
/// hierarchy is applied at the boundaries the dispatcher and `DataService`
/// own, where a caller needs to distinguish error *kinds* rather than just
/// read a message.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(FieldErrors),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimitedByServer { retry_after_secs: u64 },

    #[error("upstream rate limited")]
    UpstreamRateLimited,

    #[error("no data")]
    UpstreamNoData,

    #[error("upstream transport error: {0}")]
    UpstreamTransportError(String),

    #[error("{adapter} is disabled: {reason}")]
    AdapterDisabled { adapter: String, reason: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl OrchestratorError {
    /// The abstract error kind name used in protocol envelopes. Never
    /// includes a message or stack trace — just the classification.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "UnknownTool",
            Self::InvalidArguments(_) => "InvalidArguments",
            Self::RateLimitedByServer { .. } => "RateLimitedByServer",
            Self::UpstreamRateLimited => "UpstreamRateLimited",
            Self::UpstreamNoData => "UpstreamNoData",
            Self::UpstreamTransportError(_) => "UpstreamTransportError",
            Self::AdapterDisabled { .. } => "AdapterDisabled",
            Self::Internal(_) => "Internal",
        }
    }
}

/// Per-field validation messages collected while defaulting/validating tool
/// arguments. Displayed as a single joined string so the dispatcher's error
/// envelope stays a flat message, never a nested structure a caller has to
/// special-case.
#[derive(Debug, Clone, Default)]
pub struct FieldErrors(pub Vec<(String, String)>);

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|(field, msg)| format!("{field}: {msg}"))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{joined}")
    }
}
