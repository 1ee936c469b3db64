//! Command-line interface.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Chunk documents, embed them, and store the vectors for semantic search.
#[derive(Debug, Parser)]
#[command(name = "docvec")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Split documents into chunk files
    Chunk(commands::ChunkArgs),

    /// Embed chunk files into a JSONL embeddings file
    Embed(commands::EmbedArgs),

    /// Upload an embeddings file to the vector store
    Upload(commands::UploadArgs),

    /// Load, chunk, embed and store documents in one run
    Ingest(commands::IngestArgs),

    /// Search a collection
    Search(commands::SearchArgs),

    /// Check the embedding backend, vector store and checkpoint
    Status(commands::StatusArgs),

    /// Manage collections
    #[command(subcommand)]
    Collection(commands::CollectionCommand),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ingest_with_global_format() {
        let cli = Cli::try_parse_from([
            "docvec", "ingest", "./docs", "--mode", "replace", "-f", "json",
        ])
        .unwrap();
        assert_eq!(cli.format, Some(OutputFormat::Json));
        match cli.command {
            Commands::Ingest(args) => {
                assert_eq!(args.path.to_string_lossy(), "./docs");
                assert_eq!(args.mode, Some(crate::models::IngestMode::Replace));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_collection_create() {
        let cli = Cli::try_parse_from([
            "docvec",
            "collection",
            "create",
            "manuals",
            "--dimension",
            "768",
            "--distance",
            "dot",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Collection(commands::CollectionCommand::Create { dimension: Some(768), .. })
        ));
    }
}
