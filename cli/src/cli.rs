//! # CLI Interface
//!
//! Command-line structure of `batchctl`, using `clap` derive. Offline
//! subcommands (`nft-id`, `offer-id`, `fee`, `preview`, `verify`) never touch
//! the network; `plan` and `probe` talk to a node over JSON-RPC.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Atomic batch envelope tool.
///
/// Derives object IDs, computes fees, assembles and signs batch envelopes
/// from plan files, and verifies finished envelopes.
#[derive(Parser, Debug)]
#[command(
    name = "batchctl",
    about = "Atomic batch envelope tool",
    version,
    propagate_version = true
)]
pub struct BatchCli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Default log filter when RUST_LOG is unset.
    #[arg(
        long,
        global = true,
        default_value = "batchctl=info,batch_protocol=info"
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Derive the ID of a token minted by an account.
    NftId(NftIdArgs),
    /// Derive the ID of an offer created by an account.
    OfferId(OfferIdArgs),
    /// Compute the envelope fee for a batch.
    Fee(FeeArgs),
    /// Assemble, co-sign and finalize a batch from a plan file, offline.
    Preview(PreviewArgs),
    /// Check every signature on a finalized envelope.
    Verify(VerifyArgs),
    /// Fill in fee, sequences and network ID for a set of intents from a node.
    Plan(PlanArgs),
    /// Query a node for fee, network ID and definitions completeness.
    Probe(ProbeArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for `nft-id`.
#[derive(Args, Debug)]
pub struct NftIdArgs {
    /// Issuer account (classic address or 40 hex chars).
    #[arg(long)]
    pub owner: String,

    /// The issuer's minted-token counter at mint time.
    #[arg(long)]
    pub sequence: u32,

    #[arg(long, default_value_t = 0)]
    pub taxon: u32,

    /// Token flags byte.
    #[arg(long, default_value_t = 0)]
    pub flags: u8,

    /// Transfer fee in basis points of a percent.
    #[arg(long, default_value_t = 0)]
    pub transfer_fee: u16,
}

/// Arguments for `offer-id`.
#[derive(Args, Debug)]
pub struct OfferIdArgs {
    /// Offer creator account.
    #[arg(long)]
    pub owner: String,

    /// Sequence of the offer-creating transaction.
    #[arg(long)]
    pub sequence: u32,
}

/// Arguments for `fee`.
#[derive(Args, Debug)]
pub struct FeeArgs {
    /// Base fee per unit, in drops.
    #[arg(long)]
    pub base_fee: u64,

    /// Number of co-signing accounts (outer account excluded).
    #[arg(long)]
    pub signers: u32,

    /// Number of inner transactions.
    #[arg(long)]
    pub transactions: u32,
}

/// Arguments for `preview`.
#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Plan file (JSON).
    #[arg(long, short = 'p')]
    pub plan: PathBuf,

    /// Hex secret of the outer account. Overrides the plan file.
    ///
    /// **Prefer the environment variable** so the secret stays out of shell
    /// history.
    #[arg(long, env = "BATCH_OUTER_SECRET", hide_env_values = true)]
    pub outer_secret: Option<String>,

    /// Network ID to stamp. Overrides the plan file.
    #[arg(long, env = "BATCH_NETWORK_ID")]
    pub network_id: Option<u32>,

    /// Server definitions file; when given, transaction types are checked
    /// against it.
    #[arg(long)]
    pub definitions: Option<PathBuf>,
}

/// Arguments for `verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Finalized envelope JSON file.
    #[arg(long, short = 'e')]
    pub envelope: PathBuf,
}

/// Arguments for `plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Intents file (JSON).
    #[arg(long, short = 'i')]
    pub intents: PathBuf,

    /// Also print transaction IDs and the inner preimage, encoded with the
    /// offline sorted-JSON codec. Those bytes are not what the network signs.
    #[arg(long)]
    pub offline_codec: bool,

    #[command(flatten)]
    pub node: NodeArgs,
}

/// Arguments for `probe`.
#[derive(Args, Debug)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub node: NodeArgs,
}

/// Connection settings shared by networked subcommands.
#[derive(Args, Debug)]
pub struct NodeArgs {
    /// JSON-RPC endpoint of the node.
    #[arg(long, env = "BATCH_RPC_URL", default_value = "http://127.0.0.1:5005")]
    pub rpc_url: String,

    /// Fallback network ID when the node reports none.
    #[arg(long, env = "BATCH_NETWORK_ID")]
    pub network_id: Option<u32>,

    /// Attempts for read-only lookups.
    #[arg(long, default_value_t = 3)]
    pub lookup_attempts: u32,
}
