//! End-to-end tests for the batch lifecycle.
//!
//! These drive a batch from intent to submission against an in-memory
//! ledger: planning (fee, network ID, sequences), assembly, co-signing by
//! every contributing account, outer finalization, independent
//! re-verification, and submission. Each test owns its ledger; nothing is
//! shared between tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use batch_protocol::config::{BatchConfig, RetryPolicy, TF_INDEPENDENT};
use batch_protocol::crypto::KeyPair;
use batch_protocol::identity::AccountId;
use batch_protocol::network::{
    submit_batch, submit_batch_standalone, BatchPlanner, ClientError, LedgerClient, PlanError,
    PlannedTransaction, SubmitResult,
};
use batch_protocol::objects::{derive_minted_object_id, derive_offer_object_id};
use batch_protocol::transaction::{
    describe_positions, verify_batch_signatures, BatchError, EnvelopeBuilder, ExecutionMode,
    InnerTransaction, SequenceRef,
};
use batch_protocol::wire::{CodecError, NetworkDefinitions, SortedJsonCodec};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

/// A ledger that answers from fixed tables and records submitted blobs.
struct MemoryLedger {
    base_fee: u64,
    network_id: Option<u32>,
    sequences: HashMap<AccountId, u32>,
    definitions: Value,
    submitted: Mutex<Vec<String>>,
    accepted: AtomicU32,
}

impl MemoryLedger {
    fn new(sequences: &[(AccountId, u32)]) -> Self {
        Self {
            base_fee: 10,
            network_id: Some(21336),
            sequences: sequences.iter().copied().collect(),
            definitions: definitions_json(),
            submitted: Mutex::new(Vec::new()),
            accepted: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn fetch_base_fee(&self) -> Result<u64, ClientError> {
        Ok(self.base_fee)
    }

    async fn fetch_sequence(&self, account: &AccountId) -> Result<u32, ClientError> {
        self.sequences
            .get(account)
            .copied()
            .ok_or_else(|| ClientError::Rpc {
                error: "actNotFound".into(),
                message: account.to_address(),
            })
    }

    async fn fetch_network_id(&self) -> Result<Option<u32>, ClientError> {
        Ok(self.network_id)
    }

    async fn fetch_definitions(&self) -> Result<NetworkDefinitions, ClientError> {
        Ok(NetworkDefinitions::from_json(&self.definitions)?)
    }

    async fn submit(&self, tx_blob: &str) -> Result<SubmitResult, ClientError> {
        self.submitted.lock().push(tx_blob.to_string());
        SubmitResult::from_result(&json!({
            "engine_result": "tesSUCCESS",
            "engine_result_code": 0,
            "engine_result_message": "The transaction was applied.",
        }))
    }

    async fn ledger_accept(&self) -> Result<(), ClientError> {
        self.accepted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn definitions_json() -> Value {
    json!({
        "TYPES": { "UInt32": 2, "Amount": 6, "Blob": 7, "AccountID": 8, "STArray": 15 },
        "FIELDS": [
            ["Flags", {
                "nth": 2,
                "isVLEncoded": false,
                "isSerialized": true,
                "isSigningField": true,
                "type": "UInt32"
            }]
        ],
        "TRANSACTION_TYPES": {
            "Payment": 0, "NFTokenMint": 25, "NFTokenCreateOffer": 27,
            "NFTokenAcceptOffer": 29, "Batch": 71
        },
        "LEDGER_ENTRY_TYPES": { "AccountRoot": 97 },
        "TRANSACTION_RESULTS": { "tesSUCCESS": 0 }
    })
}

struct Party {
    key: KeyPair,
    account: AccountId,
}

impl Party {
    fn ed25519(seed: u8) -> Self {
        let key = KeyPair::from_ed25519_secret(&[seed; 32]);
        let account = AccountId::from_public_key(&key.public_key());
        Self { key, account }
    }

    fn secp256k1(seed: u8) -> Self {
        let key = KeyPair::from_secp256k1_secret(&[seed; 32]).unwrap();
        let account = AccountId::from_public_key(&key.public_key());
        Self { key, account }
    }
}

fn fast_config() -> BatchConfig {
    BatchConfig::without_network_id().with_retry(RetryPolicy::no_retry())
}

/// Plan, co-sign, finalize and submit a single payment from `cosigner` to
/// `outer`, stopping at the first error.
async fn pay_outer_in_batch(
    ledger: &MemoryLedger,
    outer: &Party,
    cosigner: &Party,
) -> Result<SubmitResult, PlanError> {
    let plan = BatchPlanner::new(ledger, fast_config())
        .plan(
            outer.account,
            ExecutionMode::AllOrNothing,
            None,
            vec![PlannedTransaction::sequenced(InnerTransaction::payment(
                cosigner.account,
                outer.account,
                5,
            ))],
        )
        .await?;
    let codec = SortedJsonCodec::with_definitions(plan.definitions.clone());
    let mut assembled = plan.builder.assemble(&codec)?;
    assembled.sign_inner(&cosigner.key)?;
    let finalized = assembled.finalize(&outer.key, &codec)?;
    submit_batch(ledger, &finalized, &codec).await
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Mint, list and sell a token in one atomic batch, with a third account
/// paying the issuer on the side.
#[tokio::test]
async fn test_full_batch_lifecycle() {
    let issuer = Party::ed25519(1);
    let buyer = Party::secp256k1(2);
    let patron = Party::ed25519(3);
    let ledger = MemoryLedger::new(&[
        (issuer.account, 10),
        (buyer.account, 20),
        (patron.account, 30),
    ]);

    // Issuer's envelope takes 10, mint 11, offer 12.
    let token = derive_minted_object_id(8, 0, &issuer.account, 0, 42);
    let offer = derive_offer_object_id(&issuer.account, 12);

    let planner = BatchPlanner::new(&ledger, fast_config());
    let plan = planner
        .plan(
            issuer.account,
            ExecutionMode::AllOrNothing,
            None,
            vec![
                PlannedTransaction::sequenced(InnerTransaction::nftoken_mint(
                    issuer.account,
                    42,
                    8,
                    None,
                )),
                PlannedTransaction::sequenced(InnerTransaction::nftoken_create_sell_offer(
                    issuer.account,
                    &token,
                    1_000_000,
                    Some(buyer.account),
                )),
                PlannedTransaction::sequenced(InnerTransaction::nftoken_accept_sell_offer(
                    buyer.account,
                    &offer,
                )),
                PlannedTransaction::sequenced(InnerTransaction::payment(
                    patron.account,
                    issuer.account,
                    25,
                )),
            ],
        )
        .await
        .unwrap();

    let codec = SortedJsonCodec::with_definitions(plan.definitions.clone());
    let env = plan.builder.envelope();
    assert_eq!(env.sequence(), SequenceRef::Plain(10));
    let seqs: Vec<SequenceRef> = env
        .raw_transactions()
        .iter()
        .map(|r| r.sequence())
        .collect();
    assert_eq!(
        seqs,
        vec![
            SequenceRef::Plain(11),
            SequenceRef::Plain(12),
            SequenceRef::Plain(20),
            SequenceRef::Plain(30),
        ]
    );
    // 2 co-signers + 4 inner + 2 overhead units.
    assert_eq!(env.fee(), 80);

    let positions = describe_positions(env);
    let indices: Vec<u32> = positions.iter().map(|p| p.batch_index).collect();
    assert_eq!(indices, vec![1, 2, 0, 0]);

    let mut assembled = plan.builder.assemble(&codec).unwrap();
    assert_eq!(assembled.required_signers(), &[buyer.account, patron.account]);

    assembled.sign_inner(&patron.key).unwrap();
    assembled.sign_inner(&buyer.key).unwrap();
    assert!(assembled.is_fully_signed());

    let finalized = assembled.finalize(&issuer.key, &codec).unwrap();

    // Signer entries are kept in signing order.
    let signer_accounts: Vec<AccountId> = finalized
        .envelope()
        .signers()
        .iter()
        .map(|s| s.account)
        .collect();
    assert_eq!(signer_accounts, vec![patron.account, buyer.account]);

    let report = finalized.verify(&codec).unwrap();
    assert!(report.is_valid(), "{report:?}");
    assert_eq!(report.transaction_ids, assembled.transaction_ids_hex());

    let result = submit_batch_standalone(&ledger, &finalized, &codec)
        .await
        .unwrap();
    assert!(result.is_success());
    assert_eq!(ledger.accepted.load(Ordering::SeqCst), 1);

    let submitted = ledger.submitted.lock();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0], finalized.wire_hex(&codec).unwrap());
}

#[test]
fn flag_mutation_breaks_every_signature() {
    let outer = Party::ed25519(1);
    let a = Party::ed25519(2);
    let b = Party::secp256k1(3);
    let codec = SortedJsonCodec::new();

    let mut builder = EnvelopeBuilder::new(
        &BatchConfig::default(),
        outer.account,
        ExecutionMode::AllOrNothing.into(),
        SequenceRef::Plain(1),
    );
    builder
        .append(
            InnerTransaction::payment(a.account, outer.account, 1),
            SequenceRef::Plain(5),
        )
        .unwrap();
    builder
        .append(
            InnerTransaction::payment(b.account, outer.account, 2),
            SequenceRef::Ticket(9),
        )
        .unwrap();
    builder.compute_fee(10);

    let mut assembled = builder.assemble(&codec).unwrap();
    assembled.sign_inner(&a.key).unwrap();
    assembled.sign_inner(&b.key).unwrap();
    let finalized = assembled.finalize(&outer.key, &codec).unwrap();
    assert!(finalized.verify(&codec).unwrap().is_valid());

    let mut tampered = finalized.to_json();
    tampered["Flags"] = json!(TF_INDEPENDENT);

    let report = verify_batch_signatures(&tampered, &codec).unwrap();
    assert!(!report.is_valid());
    assert!(!report.outer_signature_valid);
    assert!(report
        .signers
        .iter()
        .all(|s| s.key_matches_account && !s.signature_valid));
}

#[test]
fn outer_account_never_signs_inner_tier() {
    let o = Party::ed25519(1);
    let b = Party::ed25519(2);
    let codec = SortedJsonCodec::new();

    let mut builder = EnvelopeBuilder::new(
        &BatchConfig::default(),
        o.account,
        ExecutionMode::OnlyOne.into(),
        SequenceRef::Plain(100),
    );
    builder
        .append(
            InnerTransaction::payment(o.account, b.account, 1),
            SequenceRef::Plain(101),
        )
        .unwrap();
    builder
        .append(
            InnerTransaction::payment(b.account, o.account, 1),
            SequenceRef::Plain(7),
        )
        .unwrap();

    // 1 co-signer + 2 inner + 2 overhead units.
    assert_eq!(builder.compute_fee(10), 50);

    let mut assembled = builder.assemble(&codec).unwrap();
    assert_eq!(assembled.required_signers(), &[b.account]);

    match assembled.finalize(&o.key, &codec) {
        Err(BatchError::MissingSigner(missing)) => assert_eq!(missing, vec![b.account]),
        other => panic!("expected MissingSigner, got {other:?}"),
    }
    assert!(matches!(
        assembled.sign_inner(&o.key),
        Err(BatchError::OuterAccountCosign(_))
    ));

    assembled.sign_inner(&b.key).unwrap();
    let finalized = assembled.finalize(&o.key, &codec).unwrap();
    assert_eq!(finalized.envelope().signers().len(), 1);
    assert_eq!(finalized.envelope().signers()[0].account, b.account);
}

#[test]
fn batch_index_counts_sequencing_modes_separately() {
    let x = Party::ed25519(1);
    let other = Party::ed25519(2);

    let build = |outer: AccountId| {
        let mut builder = EnvelopeBuilder::new(
            &BatchConfig::default(),
            outer,
            ExecutionMode::Independent.into(),
            SequenceRef::Ticket(1),
        );
        for seq in 1..=3 {
            builder
                .append(
                    InnerTransaction::payment(x.account, other.account, seq),
                    SequenceRef::Plain(seq as u32),
                )
                .unwrap();
        }
        builder
            .append(
                InnerTransaction::payment(x.account, other.account, 9),
                SequenceRef::Ticket(50),
            )
            .unwrap();
        builder
    };

    assert_eq!(build(other.account).batch_index(&x.account, false), 3);
    assert_eq!(build(x.account).batch_index(&x.account, false), 4);
    assert_eq!(build(other.account).batch_index(&x.account, true), 1);
}

#[tokio::test]
async fn incomplete_definitions_stop_the_batch_before_submission() {
    let outer = Party::ed25519(1);
    let cosigner = Party::ed25519(2);

    let ledger = MemoryLedger::new(&[(outer.account, 1), (cosigner.account, 1)]);
    let result = pay_outer_in_batch(&ledger, &outer, &cosigner).await;
    assert!(result.unwrap().is_success());
    assert_eq!(ledger.submitted.lock().len(), 1);

    let mut ledger = MemoryLedger::new(&[(outer.account, 1), (cosigner.account, 1)]);
    ledger
        .definitions
        .as_object_mut()
        .unwrap()
        .remove("TRANSACTION_RESULTS");

    let err = match pay_outer_in_batch(&ledger, &outer, &cosigner).await {
        Err(PlanError::Client(ClientError::Definitions(err))) => err,
        other => panic!("expected incomplete definitions, got {other:?}"),
    };
    match err {
        CodecError::IncompleteNetworkDefinitions { missing } => {
            assert_eq!(missing, vec!["TRANSACTION_RESULTS".to_string()]);
        }
        other => panic!("expected incomplete definitions, got {other:?}"),
    }
    assert!(ledger.submitted.lock().is_empty());
    assert_eq!(ledger.accepted.load(Ordering::SeqCst), 0);
}

#[test]
fn unknown_inner_type_rejected_under_loaded_definitions() {
    let outer = Party::ed25519(1);
    let codec = SortedJsonCodec::with_definitions(
        NetworkDefinitions::from_json(&definitions_json()).unwrap(),
    );

    let mut builder = EnvelopeBuilder::new(
        &BatchConfig::default(),
        outer.account,
        ExecutionMode::AllOrNothing.into(),
        SequenceRef::Plain(1),
    );
    builder
        .append(
            InnerTransaction::new("Teleport", outer.account, serde_json::Map::new()),
            SequenceRef::Plain(2),
        )
        .unwrap();

    assert!(matches!(
        builder.assemble(&codec),
        Err(BatchError::Codec(CodecError::UnknownTransactionType(_)))
    ));
}
