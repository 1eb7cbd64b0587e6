//! # Network Module
//!
//! Everything that talks to a ledger node. The protocol core stays
//! synchronous and pure; only this module suspends.
//!
//! ## Architecture
//!
//! ```text
//! client.rs  — LedgerClient trait, SubmitResult, ClientError
//! rpc.rs     — JsonRpcClient over reqwest
//! retry.rs   — bounded exponential backoff for read-only lookups
//! planner.rs — BatchPlanner (definitions, fee, network ID, sequences) and
//!              submit_batch / submit_batch_standalone
//! ```
//!
//! ## Design Decisions
//!
//! - Lookups are retried on transient failures only: transport errors and
//!   the node's busy or not-yet-synced RPC errors. Submission is never
//!   retried: resubmitting an unchanged signed blob is safe, but deciding
//!   when to do so belongs to the caller.
//! - Timeouts live in the HTTP client, not in the protocol.

pub mod client;
pub mod planner;
pub mod retry;
pub mod rpc;

pub use client::{ClientError, LedgerClient, SubmitResult, ENGINE_SUCCESS};
pub use planner::{
    submit_batch, submit_batch_standalone, BatchPlan, BatchPlanner, PlanError, PlannedTransaction,
};
pub use retry::retry_lookup;
pub use rpc::JsonRpcClient;
