use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "quill",
    about = "Quill: anchored document signing and verification",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file
    #[arg(short, long, global = true, default_value = "quill.toml", env = "QUILL_CONFIG")]
    pub config: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compute a document's canonical hash offline
    Hash(HashArgs),
    /// Create a document and anchor its unsigned hash
    Create(CreateArgs),
    /// Append a signed version and anchor its hash
    Sign(SignArgs),
    /// Check a file against the hash anchored by a transaction
    Verify(VerifyArgs),
    /// Show a document and its current version
    Show(ShowArgs),
    /// Show a document's version history and audit it
    History(ShowArgs),
    /// Reject a document so it accepts no more signatures
    Reject(ShowArgs),
    /// Generate a payer keypair for anchoring
    Keygen(KeygenArgs),
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Write a configuration file with default values
    InitConfig(InitConfigArgs),
}

#[derive(Args)]
pub struct OwnerArgs {
    /// Identity the document belongs to
    #[arg(long, env = "QUILL_OWNER", default_value = "local")]
    pub owner: String,
}

#[derive(Args)]
pub struct HashArgs {
    pub file: PathBuf,
    /// Freshness marker (ledger block height) to bind
    #[arg(long, default_value_t = 0)]
    pub marker: u64,
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args)]
pub struct CreateArgs {
    /// Original document
    pub file: PathBuf,
    #[arg(short, long)]
    pub name: String,
    /// Prepared unsigned document, if different from the original
    #[arg(long)]
    pub unsigned: Option<PathBuf>,
    #[arg(long, default_value = "application/pdf")]
    pub mime_type: String,
    #[arg(long)]
    pub password: Option<String>,
    /// Signatures needed before the document is completed
    #[arg(long)]
    pub required: Option<u32>,
    /// Also sign immediately with this file
    #[arg(long)]
    pub sign_with: Option<PathBuf>,
    #[command(flatten)]
    pub owner: OwnerArgs,
}

#[derive(Args)]
pub struct SignArgs {
    pub document: String,
    /// Signed document
    pub file: PathBuf,
    #[arg(long)]
    pub password: Option<String>,
    #[command(flatten)]
    pub owner: OwnerArgs,
}

#[derive(Args)]
pub struct VerifyArgs {
    pub tx_signature: String,
    pub file: PathBuf,
    /// Freshness marker the anchored hash was bound to; read from the local
    /// store when omitted
    #[arg(long)]
    pub marker: Option<u64>,
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args)]
pub struct ShowArgs {
    pub document: String,
    #[command(flatten)]
    pub owner: OwnerArgs,
}

#[derive(Args)]
pub struct KeygenArgs {
    pub path: PathBuf,
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Overrides `server.bind_addr`
    #[arg(long)]
    pub bind: Option<String>,
}

#[derive(Args)]
pub struct InitConfigArgs {
    /// Destination, defaults to the `--config` path
    pub path: Option<PathBuf>,
    #[arg(long)]
    pub force: bool,
}
