//! CLI module for docqa.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// docqa - question answering over your own documents
///
/// Ingest PDFs, text and markdown files into a vector store, then ask
/// questions and get answers grounded in the retrieved passages.
#[derive(Parser, Debug)]
#[command(name = "docqa")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chunk, embed and index a document (.pdf, .txt, .md)
    Ingest {
        /// Path to the document
        path: PathBuf,

        /// Characters per chunk (defaults to the configured value)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Characters shared by consecutive chunks
        #[arg(long)]
        overlap: Option<usize>,

        /// Document id to index under (defaults to the file name)
        #[arg(long)]
        id: Option<String>,
    },

    /// Ask a question about the indexed documents
    Ask {
        /// The question to ask
        question: String,

        /// Number of chunks to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Minimum similarity score (-1.0 to 1.0)
        #[arg(long)]
        min_score: Option<f32>,
    },

    /// Search for relevant passages without generating an answer
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Minimum similarity score (-1.0 to 1.0)
        #[arg(long)]
        min_score: Option<f32>,
    },

    /// Remove every chunk of a document from the index
    Remove {
        /// Document id (the file name unless --id was given at ingest)
        document_id: String,
    },

    /// Delete everything from the vector store
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to the configured host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ingest() {
        let cli = Cli::parse_from([
            "docqa", "-v", "ingest", "manual.pdf", "--chunk-size", "300",
        ]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Ingest {
                path,
                chunk_size,
                overlap,
                id,
            } => {
                assert_eq!(path, PathBuf::from("manual.pdf"));
                assert_eq!(chunk_size, Some(300));
                assert_eq!(overlap, None);
                assert_eq!(id, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_ask_with_options() {
        let cli = Cli::parse_from(["docqa", "ask", "What color is the sky?", "-k", "2", "--min-score", "0.3"]);
        match cli.command {
            Commands::Ask {
                question,
                top_k,
                min_score,
            } => {
                assert_eq!(question, "What color is the sky?");
                assert_eq!(top_k, Some(2));
                assert_eq!(min_score, Some(0.3));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
