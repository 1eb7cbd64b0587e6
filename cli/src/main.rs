// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # batchctl
//!
//! Entry point for the `batchctl` binary. Parses CLI arguments, initializes
//! logging, and dispatches to one subcommand:
//!
//! - `nft-id`   — derive a minted token ID
//! - `offer-id` — derive an offer ID
//! - `fee`      — compute an envelope fee
//! - `preview`  — assemble, co-sign and finalize a plan file offline
//! - `verify`   — check every signature on a finalized envelope
//! - `plan`     — resolve definitions, fee, network ID and sequences from a node
//! - `probe`    — report what a node exposes
//! - `version`  — print build version information
//!
//! Results go to stdout as JSON (or a bare ID); logs go to stderr.

mod cli;
mod logging;
mod plan;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use batch_protocol::config::{BatchConfig, RetryPolicy, BATCH_TRANSACTION_TYPE};
use batch_protocol::identity::AccountId;
use batch_protocol::network::{retry_lookup, BatchPlanner, ClientError, JsonRpcClient, LedgerClient};
use batch_protocol::objects::{derive_minted_object_id, derive_offer_object_id};
use batch_protocol::transaction::{compute_envelope_fee, verify_batch_signatures};
use batch_protocol::wire::{CodecError, NetworkDefinitions, SortedJsonCodec};

use cli::{BatchCli, Commands, NodeArgs};
use plan::{IntentsFile, PlanFile, PlanOutput, OFFLINE_CODEC_LABEL};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = BatchCli::parse();
    logging::init_logging(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::NftId(args) => nft_id(args),
        Commands::OfferId(args) => offer_id(args),
        Commands::Fee(args) => {
            println!(
                "{}",
                compute_envelope_fee(args.base_fee, args.signers, args.transactions)
            );
            Ok(())
        }
        Commands::Preview(args) => preview(args),
        Commands::Verify(args) => verify(args),
        Commands::Plan(args) => plan_batch(args).await,
        Commands::Probe(args) => probe(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Offline commands
// ---------------------------------------------------------------------------

fn nft_id(args: cli::NftIdArgs) -> Result<()> {
    let owner = AccountId::parse(&args.owner).context("invalid --owner")?;
    let id = derive_minted_object_id(
        args.flags,
        args.transfer_fee,
        &owner,
        args.sequence,
        args.taxon,
    );
    println!("{id}");
    Ok(())
}

fn offer_id(args: cli::OfferIdArgs) -> Result<()> {
    let owner = AccountId::parse(&args.owner).context("invalid --owner")?;
    println!("{}", derive_offer_object_id(&owner, args.sequence));
    Ok(())
}

fn preview(args: cli::PreviewArgs) -> Result<()> {
    let plan = PlanFile::load(&args.plan)?;
    let codec = match &args.definitions {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            SortedJsonCodec::with_definitions(NetworkDefinitions::from_json_str(&raw)?)
        }
        None => SortedJsonCodec::new(),
    };

    let output = plan.preview(args.outer_secret.as_deref(), args.network_id, &codec)?;
    info!(
        fee = output.fee,
        transactions = output.transaction_ids.len(),
        hash = %output.envelope_hash,
        "batch previewed"
    );
    print_json(&output)
}

fn verify(args: cli::VerifyArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&args.envelope)
        .with_context(|| format!("failed to read {}", args.envelope.display()))?;
    let document: Value = serde_json::from_str(&raw).context("envelope is not JSON")?;
    // Accept a bare envelope or `preview` output.
    let envelope = document.get("envelope").unwrap_or(&document);

    let report = verify_batch_signatures(envelope, &SortedJsonCodec::new())?;
    print_json(&report)?;
    if !report.is_valid() {
        bail!("batch signatures do not verify");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Networked commands
// ---------------------------------------------------------------------------

fn node_config(node: &NodeArgs) -> BatchConfig {
    BatchConfig {
        network_id: node.network_id,
        retry: RetryPolicy {
            max_attempts: node.lookup_attempts,
            ..RetryPolicy::default()
        },
    }
}

async fn plan_batch(args: cli::PlanArgs) -> Result<()> {
    let intents = IntentsFile::load(&args.intents)?;
    let client = JsonRpcClient::new(&args.node.rpc_url)?;

    let planner = BatchPlanner::new(&client, node_config(&args.node));
    let batch = planner
        .plan(
            intents.outer_account()?,
            intents.mode,
            intents.outer_ticket,
            intents.planned_transactions()?,
        )
        .await?;

    let output = if args.offline_codec {
        warn!(
            codec = OFFLINE_CODEC_LABEL,
            "transaction IDs and preimage are not network-valid"
        );
        let codec = SortedJsonCodec::with_definitions(batch.definitions.clone());
        PlanOutput::new(batch, Some(&codec))?
    } else {
        PlanOutput::new(batch, None)?
    };
    print_json(&output)
}

#[derive(Debug, Serialize)]
struct ProbeReport {
    rpc_url: String,
    base_fee: u64,
    network_id: Option<u32>,
    definitions_complete: bool,
    missing_sections: Vec<String>,
    definitions_hash: Option<String>,
    field_count: usize,
    batch_supported: bool,
}

async fn probe(args: cli::ProbeArgs) -> Result<()> {
    let client = JsonRpcClient::new(&args.node.rpc_url)?;
    let retry = node_config(&args.node).retry;

    let base_fee = retry_lookup(&retry, "fee", || client.fetch_base_fee()).await?;
    let network_id = retry_lookup(&retry, "server_info", || client.fetch_network_id()).await?;

    let mut report = ProbeReport {
        rpc_url: client.url().to_string(),
        base_fee,
        network_id,
        definitions_complete: false,
        missing_sections: Vec::new(),
        definitions_hash: None,
        field_count: 0,
        batch_supported: false,
    };

    match retry_lookup(&retry, "server_definitions", || client.fetch_definitions()).await {
        Ok(defs) => {
            report.definitions_complete = true;
            report.definitions_hash = defs.hash().map(str::to_string);
            report.field_count = defs.field_count();
            report.batch_supported = defs.knows_transaction_type(BATCH_TRANSACTION_TYPE);
        }
        Err(ClientError::Definitions(CodecError::IncompleteNetworkDefinitions { missing })) => {
            warn!(missing = %missing.join(","), "node definitions incomplete");
            report.missing_sections = missing;
        }
        Err(e) => return Err(e.into()),
    }

    print_json(&report)
}

fn print_version() {
    println!("batchctl        {}", env!("CARGO_PKG_VERSION"));
    println!("batch-protocol  {}", batch_protocol::config::PROTOCOL_VERSION);
    println!("rustc           {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
