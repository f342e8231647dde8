use enron_core::Config;
use enron_ingest::IngestionJob;

pub struct AppState {
    pub config: Config,
    pub ingestion: IngestionJob,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let ingestion = IngestionJob::new(config.maildir.path.clone());
        Self { config, ingestion }
    }
}
