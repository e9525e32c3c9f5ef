//! Error taxonomy for the progression engine and its record store.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
  /// Negative XP, unknown achievement/template id, malformed date, empty action type.
  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  /// A stored record violates an invariant and cannot be evaluated.
  #[error("malformed record for subject '{subject_id}': {reason}")]
  MalformedRecord { subject_id: String, reason: String },

  /// Record was written by a newer schema than this binary understands.
  #[error("unsupported record schema version {found} (max {supported})")]
  UnsupportedSchema { found: u32, supported: u32 },

  #[error("no progression record for subject '{0}'")]
  NotFound(String),

  /// Transient store failure. The engine does not retry.
  #[error("record store unavailable: {0}")]
  StoreUnavailable(String),

  /// Compare-and-swap on `revision` failed: someone else saved first.
  #[error("revision conflict for subject '{subject_id}': expected {expected}, found {found}")]
  RevisionConflict { subject_id: String, expected: u64, found: u64 },

  #[error("achievement predicate '{achievement_id}' failed: {reason}")]
  PredicateFailure { achievement_id: String, reason: String },
}

impl EngineError {
  pub fn invalid(msg: impl Into<String>) -> Self {
    EngineError::InvalidArgument(msg.into())
  }

  /// Stable machine-readable kind, used in API error bodies and log fields.
  pub fn kind(&self) -> &'static str {
    match self {
      EngineError::InvalidArgument(_) => "invalid_argument",
      EngineError::MalformedRecord { .. } => "malformed_record",
      EngineError::UnsupportedSchema { .. } => "unsupported_schema",
      EngineError::NotFound(_) => "not_found",
      EngineError::StoreUnavailable(_) => "store_unavailable",
      EngineError::RevisionConflict { .. } => "revision_conflict",
      EngineError::PredicateFailure { .. } => "predicate_failure",
    }
  }
}

pub type EngineResult<T> = Result<T, EngineError>;
