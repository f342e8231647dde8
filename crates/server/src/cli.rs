//! CLI argument parsing and subcommand dispatch.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use enron_core::Config;

/// Count senders across a maildir tree.
#[derive(Parser, Debug)]
#[command(name = "enron-server", about = "Maildir sender statistics over HTTP", version)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server (default).
    Serve,
    /// Run one ingestion pass in-process and print the results as JSON.
    Ingest {
        /// Maildir root to walk (defaults to MAILDIR_PATH)
        path: Option<PathBuf>,
    },
}

/// Run the selected subcommand.
pub async fn dispatch(config: Config, args: CliArgs) -> anyhow::Result<()> {
    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => crate::serve(config).await,
        Command::Ingest { path } => {
            let root = path.unwrap_or_else(|| config.maildir.path.clone());
            crate::ingest_once(root).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let args = CliArgs::try_parse_from(["enron-server"]).unwrap();
        assert!(args.command.is_none());
    }

    #[test]
    fn ingest_takes_optional_path() {
        let args = CliArgs::try_parse_from(["enron-server", "ingest", "/data/maildir"]).unwrap();
        match args.command {
            Some(Command::Ingest { path }) => {
                assert_eq!(path, Some(PathBuf::from("/data/maildir")))
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let args = CliArgs::try_parse_from(["enron-server", "ingest"]).unwrap();
        assert!(matches!(args.command, Some(Command::Ingest { path: None })));
    }
}
