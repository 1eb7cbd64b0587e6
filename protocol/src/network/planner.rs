//! Batch planning against a live ledger.
//!
//! Fills in everything a batch needs from the network before signing can
//! start: the type definitions, the base fee, the network ID, and the next
//! sequence of every account that sequences by number. The outer account's
//! envelope consumes its next sequence `S`, so its inner transactions start
//! at `S + 1`.
//!
//! Definitions are fetched first. A node that returns incomplete definitions
//! stops the batch before any transaction is wrapped, so nothing built from
//! partial encoding tables can reach [`submit_batch`].

use futures::future::try_join_all;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::client::{ClientError, LedgerClient, SubmitResult};
use super::retry::retry_lookup;
use crate::config::{BatchConfig, LEGACY_NETWORK_ID_MAX};
use crate::identity::AccountId;
use crate::transaction::{
    BatchError, EnvelopeBuilder, ExecutionMode, FinalizedBatch, InnerTransaction, SequenceRef,
};
use crate::wire::{CanonicalCodec, NetworkDefinitions};

/// Errors from planning or submitting a batch.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// One intended inner transaction and how it should be sequenced.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTransaction {
    pub inner: InnerTransaction,
    /// Pre-reserved ticket. `None` means use the account's next sequence.
    pub ticket: Option<u32>,
}

impl PlannedTransaction {
    pub fn sequenced(inner: InnerTransaction) -> Self {
        Self {
            inner,
            ticket: None,
        }
    }

    pub fn ticketed(inner: InnerTransaction, ticket: u32) -> Self {
        Self {
            inner,
            ticket: Some(ticket),
        }
    }
}

/// A planned batch, ready to assemble.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub builder: EnvelopeBuilder,
    pub base_fee: u64,
    pub network_id: Option<u32>,
    /// Complete definitions the node reported. Encode with a codec built
    /// from these.
    pub definitions: NetworkDefinitions,
}

/// Plans batches using a [`LedgerClient`].
pub struct BatchPlanner<'a, C: LedgerClient + ?Sized> {
    client: &'a C,
    config: BatchConfig,
}

impl<'a, C: LedgerClient + ?Sized> BatchPlanner<'a, C> {
    pub fn new(client: &'a C, config: BatchConfig) -> Self {
        Self { client, config }
    }

    /// The network ID to stamp on the batch.
    ///
    /// A reported ID at or below [`LEGACY_NETWORK_ID_MAX`] marks a legacy
    /// network, which never carries `NetworkID`. When the node reports
    /// nothing, the configured ID is used.
    pub async fn resolve_network_id(&self) -> Result<Option<u32>, ClientError> {
        let reported = retry_lookup(
            &self.config.retry,
            "server_info",
            || self.client.fetch_network_id(),
        )
        .await?;
        Ok(match reported {
            Some(id) if id <= LEGACY_NETWORK_ID_MAX => {
                debug!(network_id = id, "legacy network, omitting NetworkID");
                None
            }
            Some(id) => Some(id),
            None => self.config.network_id,
        })
    }

    /// Look up everything the batch needs and wrap the transactions.
    ///
    /// `outer_ticket` sequences the envelope itself with a ticket instead of
    /// the outer account's next sequence.
    pub async fn plan(
        &self,
        outer: AccountId,
        mode: ExecutionMode,
        outer_ticket: Option<u32>,
        transactions: Vec<PlannedTransaction>,
    ) -> Result<BatchPlan, PlanError> {
        if transactions.is_empty() {
            return Err(BatchError::EmptyBatch.into());
        }

        let retry = &self.config.retry;
        let definitions = retry_lookup(
            retry,
            "server_definitions",
            || self.client.fetch_definitions(),
        )
        .await?;
        let base_fee = retry_lookup(retry, "fee", || self.client.fetch_base_fee()).await?;
        let network_id = self.resolve_network_id().await?;

        // Every account that sequences by number, outer first.
        let mut accounts: Vec<AccountId> = Vec::new();
        if outer_ticket.is_none() {
            accounts.push(outer);
        }
        for planned in transactions.iter().filter(|p| p.ticket.is_none()) {
            let account = *planned.inner.account();
            if !accounts.contains(&account) {
                accounts.push(account);
            }
        }

        let sequences = try_join_all(accounts.iter().map(|account| async move {
            let seq = retry_lookup(
                retry,
                "account_info",
                || self.client.fetch_sequence(account),
            )
            .await?;
            Ok::<_, ClientError>((*account, seq))
        }))
        .await?;
        let mut next: HashMap<AccountId, u32> = sequences.into_iter().collect();

        let envelope_sequence = match outer_ticket {
            Some(ticket) => SequenceRef::Ticket(ticket),
            None => {
                let seq = next.get(&outer).copied().unwrap_or_default();
                next.insert(outer, seq.wrapping_add(1));
                SequenceRef::Plain(seq)
            }
        };

        let config = BatchConfig {
            network_id,
            ..self.config.clone()
        };
        let mut builder = EnvelopeBuilder::new(&config, outer, mode.into(), envelope_sequence);

        for planned in transactions {
            let sequence = match planned.ticket {
                Some(ticket) => SequenceRef::Ticket(ticket),
                None => {
                    let slot = next.entry(*planned.inner.account()).or_default();
                    let seq = *slot;
                    *slot = seq.wrapping_add(1);
                    SequenceRef::Plain(seq)
                }
            };
            builder.append(planned.inner, sequence)?;
        }

        let fee = builder.compute_fee(base_fee);
        info!(
            outer = %outer,
            transactions = builder.len(),
            base_fee,
            fee,
            network_id = network_id.unwrap_or_default(),
            "batch planned"
        );

        Ok(BatchPlan {
            builder,
            base_fee,
            network_id,
            definitions,
        })
    }
}

/// Encode a finalized batch and submit it once.
///
/// Never retried. The engine result is returned as-is, success or not.
pub async fn submit_batch<C: LedgerClient + ?Sized>(
    client: &C,
    batch: &FinalizedBatch,
    codec: &dyn CanonicalCodec,
) -> Result<SubmitResult, PlanError> {
    let blob = batch.wire_hex(codec)?;
    debug!(bytes = blob.len() / 2, "submitting batch");
    Ok(client.submit(&blob).await?)
}

/// [`submit_batch`] for standalone nodes, which only apply transactions when
/// a ledger is closed by hand.
///
/// The ledger is closed after a successful submission only. A rejected batch
/// is returned without touching the ledger.
pub async fn submit_batch_standalone<C: LedgerClient + ?Sized>(
    client: &C,
    batch: &FinalizedBatch,
    codec: &dyn CanonicalCodec,
) -> Result<SubmitResult, PlanError> {
    let result = submit_batch(client, batch, codec).await?;
    if result.is_success() {
        client.ledger_accept().await?;
        debug!("standalone ledger closed");
    } else {
        warn!(engine_result = %result.engine_result, "batch rejected, ledger left open");
    }
    Ok(result)
}
