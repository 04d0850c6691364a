//! Tampering with a received token document.

use crate::common::{wallet, Fixture, TOKEN_TYPE};
use txf_cli::commands::send::SendRequest;
use txf_cli::commands::{gen_address, receive, send, verify};
use txf_cli::txf::save_token;
use txf_cli::CliError;
use txf_core::{CoreError, ProofCheck, Token, TrustBase};
use txf_network::LocalAggregator;

async fn received_token(f: &Fixture) -> Token {
    let alice = wallet("alice secret");
    let bob = wallet("bob secret");
    f.mint_gift(&alice, "gift-20", "alice.txf").await;
    send::run(
        &f.config,
        &f.auto,
        &f.trust_base,
        &alice,
        f.path("alice.txf"),
        SendRequest {
            recipient: gen_address::run(&bob, TOKEN_TYPE, Some("gift-2024")).unwrap(),
            offline: true,
            ..SendRequest::default()
        },
        f.path("to-bob.txf"),
    )
    .await
    .unwrap();
    receive::run(
        &f.config,
        &f.auto,
        &f.trust_base,
        &bob,
        f.path("to-bob.txf"),
        Some("gift-2024"),
        f.path("bob.txf"),
    )
    .await
    .unwrap()
}

fn check(f: &Fixture, token: &Token) -> Result<Token, CliError> {
    save_token(f.path("tampered.txf"), token).unwrap();
    verify::run(&f.trust_base, f.path("tampered.txf"))
}

fn proof_check(result: Result<Token, CliError>) -> Option<ProofCheck> {
    match result {
        Err(CliError::Verification(CoreError::ProofVerification { check, .. })) => Some(check),
        _ => None,
    }
}

#[tokio::test]
async fn test_corrupted_sibling_is_rejected() {
    let f = Fixture::new();
    let token = received_token(&f).await;
    check(&f, &token).unwrap();

    let mut tampered = token.clone();
    let steps = &mut tampered.transactions[0].inclusion_proof.merkle_tree_path.steps;
    let step = steps.iter_mut().find(|s| s.sibling.is_some()).unwrap();
    if let Some(sibling) = step.sibling.as_mut() {
        sibling[31] ^= 0x80;
    }
    assert_eq!(proof_check(check(&f, &tampered)), Some(ProofCheck::Root));
}

#[tokio::test]
async fn test_non_quorum_certificate_is_rejected() {
    let f = Fixture::new();
    let token = received_token(&f).await;

    let mut tampered = token.clone();
    let signatures = &mut tampered.genesis.inclusion_proof.unicity_certificate.signatures;
    let keep: Vec<String> = signatures.keys().take(2).cloned().collect();
    signatures.retain(|node, _| keep.contains(node));
    assert_eq!(proof_check(check(&f, &tampered)), Some(ProofCheck::Quorum));
}

#[tokio::test]
async fn test_certificate_from_other_committee_is_rejected() {
    let f = Fixture::new();
    let token = received_token(&f).await;

    let other = LocalAggregator::new(9, 4).unwrap();
    let mut foreign: TrustBase = f.trust_base.clone();
    foreign.root_nodes = other.trust_base().root_nodes.clone();
    assert!(matches!(
        token.verify(&foreign),
        Err(CoreError::ProofVerification {
            check: ProofCheck::Quorum,
            ..
        })
    ));
}

#[tokio::test]
async fn test_edited_state_data_is_rejected() {
    let f = Fixture::new();
    let token = received_token(&f).await;

    let mut tampered = token.clone();
    if let Some(data) = tampered.state.data.as_mut() {
        data[2] ^= 0x01;
    }
    assert!(matches!(
        check(&f, &tampered),
        Err(CliError::Verification(CoreError::DataIntegrity { .. }))
    ));
}

#[tokio::test]
async fn test_edited_recipient_is_rejected() {
    let f = Fixture::new();
    let token = received_token(&f).await;

    let carol = wallet("carol secret");
    let mut tampered = token.clone();
    tampered.transactions[0].data.recipient =
        txf_core::predicate::receiving_address(&carol.predicate(None), token.token_type());
    assert!(check(&f, &tampered).is_err());

    let mut swapped_owner = token.clone();
    swapped_owner.state.predicate = carol.predicate(None);
    assert!(matches!(
        check(&f, &swapped_owner),
        Err(CliError::Verification(CoreError::PredicateMismatch { .. }))
    ));
}
