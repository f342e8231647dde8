//! Ingestion error types.

use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced to callers of [`IngestionJob`](crate::IngestionJob).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("Ingestion is already in progress.")]
    ConflictingOperation,

    #[error("Ingestion has not been started yet.")]
    NotYetStarted,
}

/// The walk could not enumerate the mail tree. Recorded on the epoch report,
/// never returned from a public operation.
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("failed to walk {}: {source}", .root.display())]
    Aborted {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_facing_messages() {
        assert_eq!(
            IngestError::ConflictingOperation.to_string(),
            "Ingestion is already in progress."
        );
        assert_eq!(
            IngestError::NotYetStarted.to_string(),
            "Ingestion has not been started yet."
        );
    }
}
