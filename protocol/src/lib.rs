// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Batch Protocol — Core Library
//!
//! Builds, identifies and multi-party-signs atomic batch envelopes: one
//! outer `Batch` transaction carrying several fee-free inner transactions
//! that the ledger applies as a unit.
//!
//! Most of the work is bookkeeping that has to be bit-exact. A wrong flag
//! bit, a reordered transaction, or a hash prefix off by one byte yields a
//! signature the network rejects without saying why.
//!
//! ## Architecture
//!
//! - **config** — Protocol constants and the explicit [`config::BatchConfig`].
//! - **crypto** — SHA-512Half, account hashing, Ed25519 and secp256k1 keys.
//! - **identity** — 20-byte accounts and their classic addresses.
//! - **objects** — Deterministic token and offer identifiers.
//! - **transaction** — Envelope builder, batch index, fees, two-tier signing.
//! - **wire** — The canonical codec contract and network definitions.
//! - **network** — Ledger client contract, JSON-RPC client, batch planner.
//!
//! ## Design Philosophy
//!
//! 1. Pure functions where possible. ID derivation, batch indexing and
//!    preimage construction touch no shared state.
//! 2. Each signing phase is its own type. You cannot finalize an envelope
//!    that is still missing co-signers.
//! 3. No process-wide configuration. Whatever a function needs is passed in.
//! 4. Only the network layer suspends, and only lookups are retried.

pub mod config;
pub mod crypto;
pub mod identity;
pub mod network;
pub mod objects;
pub mod transaction;
pub mod wire;
