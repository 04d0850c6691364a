//! Aggregator interaction: timeouts, retries and refusals.

use crate::common::{wallet, Fixture, TOKEN_TYPE};
use txf_cli::commands::send::SendRequest;
use txf_cli::commands::{gen_address, receive, send};
use txf_cli::txf::{load_token, save_token};
use txf_cli::CliError;
use txf_core::commitment::Authenticator;
use txf_core::{CoreError, ProofCheck, TokenStatus, TransferState};
use txf_network::{
    AggregatorClient, NetworkError, SubmitCommitmentRequest, SubmitStatus,
};

async fn offline_transfer_to_bob(f: &Fixture, token_id: &str, source: &str, document: &str) {
    let alice = wallet("alice secret");
    let bob = wallet("bob secret");
    if !f.path(source).exists() {
        f.mint_gift(&alice, token_id, source).await;
    }
    send::run(
        &f.config,
        &f.auto,
        &f.trust_base,
        &alice,
        f.path(source),
        SendRequest {
            recipient: gen_address::run(&bob, TOKEN_TYPE, None).unwrap(),
            offline: true,
            ..SendRequest::default()
        },
        f.path(document),
    )
    .await
    .unwrap();
}

/// Waiting past the poll timeout fails with a timeout and changes nothing on disk;
/// running the command again after the round closes completes the transfer.
#[tokio::test]
async fn test_timeout_leaves_transfer_untouched() {
    let f = Fixture::new();
    let bob = wallet("bob secret");
    offline_transfer_to_bob(&f, "gift-10", "alice.txf", "to-bob.txf").await;
    let before = std::fs::read(f.path("to-bob.txf")).unwrap();

    let err = receive::run(
        &f.config,
        &f.aggregator,
        &f.trust_base,
        &bob,
        f.path("to-bob.txf"),
        None,
        f.path("bob.txf"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CliError::Network(NetworkError::Timeout(_))), "{}", err);
    assert_eq!(std::fs::read(f.path("to-bob.txf")).unwrap(), before);
    assert!(!f.path("bob.txf").exists());

    f.aggregator.certify_round();
    let token = receive::run(
        &f.config,
        &f.aggregator,
        &f.trust_base,
        &bob,
        f.path("to-bob.txf"),
        None,
        f.path("bob.txf"),
    )
    .await
    .unwrap();
    assert_eq!(token.status, TokenStatus::Confirmed);
}

/// Dropped connections are retried with the very same signed commitment.
#[tokio::test]
async fn test_receive_retries_with_identical_commitment() {
    let f = Fixture::new();
    let bob = wallet("bob secret");
    offline_transfer_to_bob(&f, "gift-11", "alice.txf", "to-bob.txf").await;
    let document = load_token(f.path("to-bob.txf")).unwrap();
    let commitment = document.offline_transfer.unwrap().commitment;

    let already = f.aggregator.received().len();
    f.auto.fail_next_calls(2);
    receive::run(
        &f.config,
        &f.auto,
        &f.trust_base,
        &bob,
        f.path("to-bob.txf"),
        None,
        f.path("bob.txf"),
    )
    .await
    .unwrap();

    let attempts = &f.aggregator.received()[already..];
    assert_eq!(attempts.len(), 3);
    let expected = SubmitCommitmentRequest::from_commitment(&commitment);
    assert!(attempts.iter().all(|r| r == &expected));
}

/// A second transfer of the same state is refused and its document marked failed.
#[tokio::test]
async fn test_double_spend_is_rejected() {
    let f = Fixture::new();
    let alice = wallet("alice secret");
    let carol = wallet("carol secret");
    f.mint_gift(&alice, "gift-12", "alice.txf").await;
    std::fs::copy(f.path("alice.txf"), f.path("alice-copy.txf")).unwrap();

    offline_transfer_to_bob(&f, "gift-12", "alice.txf", "to-bob.txf").await;
    send::run(
        &f.config,
        &f.auto,
        &f.trust_base,
        &alice,
        f.path("alice-copy.txf"),
        SendRequest {
            recipient: gen_address::run(&carol, TOKEN_TYPE, None).unwrap(),
            offline: true,
            ..SendRequest::default()
        },
        f.path("to-carol.txf"),
    )
    .await
    .unwrap();

    receive::run(
        &f.config,
        &f.auto,
        &f.trust_base,
        &wallet("bob secret"),
        f.path("to-bob.txf"),
        None,
        f.path("bob.txf"),
    )
    .await
    .unwrap();

    let err = receive::run(
        &f.config,
        &f.auto,
        &f.trust_base,
        &carol,
        f.path("to-carol.txf"),
        None,
        f.path("carol.txf"),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        CliError::Network(NetworkError::Rejected(SubmitStatus::RequestIdExists))
    ));

    let failed = load_token(f.path("to-carol.txf")).unwrap();
    assert_eq!(failed.status, TokenStatus::Failed);
    assert_eq!(failed.transfer_state(), TransferState::TransferRejected);
    assert!(!f.path("carol.txf").exists());
}

/// An authenticator signed by anyone but the source owner never reaches the tree.
#[tokio::test]
async fn test_aggregator_refuses_foreign_authenticator() {
    let f = Fixture::new();
    offline_transfer_to_bob(&f, "gift-13", "alice.txf", "to-bob.txf").await;
    let document = load_token(f.path("to-bob.txf")).unwrap();
    let commitment = document.offline_transfer.unwrap().commitment;

    let bob = wallet("bob secret");
    let mut forged = SubmitCommitmentRequest::from_commitment(&commitment);
    forged.authenticator.signature = bob.signer().sign(&forged.transaction_hash);
    let err = f.auto.submit_commitment(&forged).await.unwrap_err();
    assert!(matches!(
        err,
        NetworkError::Rejected(SubmitStatus::AuthenticatorVerificationFailed)
    ));

    let resigned = Authenticator::create(
        bob.signer(),
        &forged.transaction_hash,
        commitment.authenticator.state_hash,
    );
    let mut rekeyed = SubmitCommitmentRequest::from_commitment(&commitment);
    rekeyed.authenticator = resigned;
    let err = f.auto.submit_commitment(&rekeyed).await.unwrap_err();
    assert!(matches!(
        err,
        NetworkError::Rejected(SubmitStatus::RequestIdMismatch)
    ));
}

/// Submitting right away while the round is still open leaves the sender's copy
/// pending; it only becomes a spent record once an inclusion proof verifies.
#[tokio::test]
async fn test_sender_copy_stays_pending_until_included() {
    let f = Fixture::new();
    let alice = wallet("alice secret");
    let bob = wallet("bob secret");
    f.mint_gift(&alice, "gift-14", "alice.txf").await;

    let document = send::run(
        &f.config,
        &f.aggregator,
        &f.trust_base,
        &alice,
        f.path("alice.txf"),
        SendRequest {
            recipient: gen_address::run(&bob, TOKEN_TYPE, None).unwrap(),
            ..SendRequest::default()
        },
        f.path("to-bob.txf"),
    )
    .await
    .unwrap();
    assert_eq!(document.transfer_state(), TransferState::TransferSubmitted);

    let sender_copy = load_token(f.path("alice.txf")).unwrap();
    assert_eq!(sender_copy.status, TokenStatus::Pending);
    assert_eq!(sender_copy, document);

    f.aggregator.certify_round();
    let token = receive::run(
        &f.config,
        &f.aggregator,
        &f.trust_base,
        &bob,
        f.path("to-bob.txf"),
        None,
        f.path("bob.txf"),
    )
    .await
    .unwrap();
    assert_eq!(token.status, TokenStatus::Confirmed);
}

/// A document whose genesis certificate lost its signatures is refused before
/// anything is submitted.
#[tokio::test]
async fn test_unverified_history_is_refused_before_submission() {
    let f = Fixture::new();
    let bob = wallet("bob secret");
    offline_transfer_to_bob(&f, "gift-15", "alice.txf", "to-bob.txf").await;

    let mut document = load_token(f.path("to-bob.txf")).unwrap();
    document
        .genesis
        .inclusion_proof
        .unicity_certificate
        .signatures
        .clear();
    save_token(f.path("to-bob.txf"), &document).unwrap();

    let already = f.aggregator.received().len();
    let err = receive::run(
        &f.config,
        &f.auto,
        &f.trust_base,
        &bob,
        f.path("to-bob.txf"),
        None,
        f.path("bob.txf"),
    )
    .await
    .unwrap_err();
    assert!(
        matches!(
            err,
            CliError::Verification(CoreError::ProofVerification {
                check: ProofCheck::Quorum,
                ..
            })
        ),
        "{}",
        err
    );
    assert_eq!(f.aggregator.received().len(), already);
    assert!(!f.path("bob.txf").exists());
}
