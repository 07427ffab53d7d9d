//! Typed errors per failure domain
//!
//! The pipeline distinguishes transient upstream failures (retried, then
//! fall-through) from definitive absence (fall-through immediately) and from
//! store failures (surfaced, never masked by a stale cache answer).

use thiserror::Error;

/// Failures talking to the upstream price provider.
#[derive(Error, Debug)]
pub enum OracleError {
    /// Timeout, 5xx, rate-limit. Retried with backoff before falling through.
    #[error("upstream transient failure: {0}")]
    Transient(String),
    /// The provider answered but has nothing for this request.
    #[error("upstream has no data: {0}")]
    Definitive(String),
    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),
}

impl OracleError {
    pub fn is_transient(&self) -> bool {
        matches!(self, OracleError::Transient(_))
    }
}

/// Failures in the durable store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("invalid stored record: {0}")]
    InvalidRecord(String),
}

impl From<sea_orm::DbErr> for StoreError {
    fn from(err: sea_orm::DbErr) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Failures surfaced by the resolution pipeline.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(OracleError::Transient("timeout".into()).is_transient());
        assert!(!OracleError::Definitive("unknown token".into()).is_transient());
        assert!(!OracleError::UnsupportedNetwork("solana".into()).is_transient());
    }

    #[test]
    fn resolve_error_wraps_store() {
        let err: ResolveError = StoreError::Database("connection refused".into()).into();
        assert!(err.to_string().contains("connection refused"));
    }
}
