//! Batch protocol errors.
//!
//! Every variant here is a local, pre-submission failure. Once an envelope
//! reaches the network, rejections come back as a
//! [`SubmitResult`](crate::network::SubmitResult), not as a `BatchError`.

use thiserror::Error;

use crate::crypto::KeyError;
use crate::identity::{AccountError, AccountId};
use crate::wire::CodecError;

/// Errors raised while building, signing or verifying a batch.
#[derive(Debug, Error)]
pub enum BatchError {
    /// An inner transaction was appended with neither a sequence nor a
    /// ticket, or with both set to conflicting values.
    #[error("invalid sequencing: {0}")]
    InvalidSequencing(&'static str),

    /// Outer finalization was attempted while contributing accounts had not
    /// signed yet.
    #[error("missing batch signature from {}", format_accounts(.0))]
    MissingSigner(Vec<AccountId>),

    /// An account identifier did not decode to its fixed-width form.
    #[error("malformed account: {0}")]
    MalformedAccount(#[from] AccountError),

    /// A transaction value was missing a required field or carried one of
    /// the wrong type.
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    /// Assembly was attempted with no inner transactions.
    #[error("a batch must contain at least one inner transaction")]
    EmptyBatch,

    /// Flags did not carry exactly one execution-mode bit.
    #[error("flags {flags:#010x} must set exactly one execution mode")]
    InvalidExecutionMode { flags: u32 },

    #[error("account {0} has already signed this batch")]
    DuplicateSigner(AccountId),

    /// A signer contributed no inner transaction.
    #[error("account {0} has no inner transaction in this batch")]
    UnexpectedSigner(AccountId),

    /// The outer account authorizes through the outer signature only.
    #[error("outer account {0} cannot add a batch signer entry")]
    OuterAccountCosign(AccountId),

    /// A merged signature did not verify against the inner digest.
    #[error("batch signature from {0} does not verify")]
    InvalidSignature(AccountId),

    /// A public key does not belong to the account it claims to sign for.
    #[error("key for {key_account} cannot sign for {account}")]
    KeyMismatch {
        account: AccountId,
        key_account: AccountId,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Key(#[from] KeyError),
}

impl BatchError {
    /// True for the definitions-incomplete failure, wherever it surfaced.
    pub fn is_incomplete_definitions(&self) -> bool {
        matches!(
            self,
            Self::Codec(CodecError::IncompleteNetworkDefinitions { .. })
        )
    }
}

fn format_accounts(accounts: &[AccountId]) -> String {
    accounts
        .iter()
        .map(AccountId::to_address)
        .collect::<Vec<_>>()
        .join(", ")
}
