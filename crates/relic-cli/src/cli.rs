use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "relic",
    about = "relic: OCFL repository to Solr bridge",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a full indexing pass over the repository
    Index(IndexArgs),
    /// Update the Solr schema from the configured base document
    Schema(SchemaArgs),
    /// Resolve an object, version, and content path against a repository
    Resolve(ResolveArgs),
}

#[derive(Args)]
pub struct IndexArgs {
    /// Path to the JSON runner configuration
    #[arg(short, long, default_value = "./config.json")]
    pub config: String,
    /// Purge all existing documents before indexing
    #[arg(short, long)]
    pub purge: bool,
    /// Stop after this many documents
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct SchemaArgs {
    /// Path to the JSON runner configuration
    #[arg(short, long, default_value = "./config.json")]
    pub config: String,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Repository storage root
    pub repository: String,
    /// Object identifier
    pub oid: String,
    /// Version selector (defaults to the head version)
    #[arg(long, default_value = "")]
    pub version: String,
    /// Logical content path within the object
    #[arg(long, default_value = "")]
    pub content: String,
    /// List the directory entries under the content path instead of
    /// resolving a file
    #[arg(short, long)]
    pub list: bool,
}
