pub mod config;

pub use config::Config;

/// Number of entries returned by the top-senders query.
pub const TOP_SENDERS_LIMIT: usize = 10;
