use chrono::NaiveDate;

use crate::store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    InvalidPageRequest(&'static str),
    NotFound { kind: &'static str, id: String },
    InvalidInterval { start: NaiveDate, end: NaiveDate },
    LimitExceeded(&'static str),
    Collaborator(StoreError),
}

impl EngineError {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound { kind, id: id.into() }
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            EngineError::InvalidPageRequest(_) => "invalid_page_request",
            EngineError::NotFound { .. } => "not_found",
            EngineError::InvalidInterval { .. } => "invalid_interval",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::Collaborator(_) => "collaborator_failure",
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidPageRequest(msg) => write!(f, "invalid page request: {msg}"),
            EngineError::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            EngineError::InvalidInterval { start, end } => {
                write!(f, "invalid interval: start {start} is after end {end}")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Collaborator(e) => write!(f, "store failure: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Collaborator(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Collaborator(e)
    }
}
