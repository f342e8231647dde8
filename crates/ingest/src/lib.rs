//! Maildir sender ingestion.
//!
//! - [`extract`]: pulls the `From:` header value out of a single message
//! - [`counts`]: the per-sender counter store shared between the walk and readers
//! - [`job`]: the background directory walk and its lifecycle state machine

pub mod counts;
pub mod error;
pub mod extract;
pub mod job;

pub use counts::{SenderCount, SenderCounts};
pub use error::{IngestError, WalkError};
pub use extract::{extract_sender, extract_sender_from_str, normalize_sender};
pub use job::{EpochReport, IngestionJob, IngestionSnapshot, IngestionState};
