//! # Identity Module
//!
//! Who is who in a batch. Every participant is an [`AccountId`], a 20-byte
//! hash of the public key that controls it, rendered as a Base58Check
//! classic address for humans and JSON.
//!
//! The batch builder compares accounts constantly (batch index, required
//! signers, outer-account checks), so `AccountId` is a small `Copy` value
//! with cheap equality and ordering.

pub mod account;

pub use account::{AccountError, AccountId, ACCOUNT_ID_LENGTH};
