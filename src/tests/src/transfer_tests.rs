//! End to end transfers through the client commands.

use crate::common::{wallet, Fixture, GIFT_DATA, TOKEN_TYPE};
use txf_cli::commands::send::SendRequest;
use txf_cli::commands::{gen_address, receive, send, verify};
use txf_cli::txf::load_token;
use txf_core::integrity::verify_chain_integrity;
use txf_core::predicate::address_of;
use txf_core::{TokenStatus, TransferState};

/// Alice mints a gift, sends it offline to Bob's masked address and Bob receives it
/// with the commitment Alice signed.
#[tokio::test]
async fn test_offline_gift_from_alice_to_bob() -> anyhow::Result<()> {
    let f = Fixture::new();
    let alice = wallet("alice secret");
    let bob = wallet("bob secret");

    let bob_address = gen_address::run(&bob, TOKEN_TYPE, Some("gift-2024"))?;
    let minted = f.mint_gift(&alice, "gift-1", "alice.txf").await;
    assert_eq!(minted.state.data.as_deref(), Some(GIFT_DATA));

    let request = SendRequest {
        recipient: bob_address.clone(),
        data: None,
        message: Some("happy birthday".to_string()),
        offline: true,
    };
    let document = send::run(
        &f.config,
        &f.auto,
        &f.trust_base,
        &alice,
        f.path("alice.txf"),
        request,
        f.path("to-bob.txf"),
    )
    .await?;
    assert_eq!(document.status, TokenStatus::Pending);
    assert_eq!(document.transfer_state(), TransferState::TransferPackaged);
    assert!(f.aggregator.received().iter().all(|r| r.request_id != document.current_request_id()));

    let record = load_token(f.path("alice.txf"))?;
    assert_eq!(record.status, TokenStatus::Pending);
    assert_eq!(record, document);

    let sender_key = document
        .offline_transfer
        .as_ref()
        .map(|t| t.commitment.authenticator.public_key)
        .unwrap();

    let received = receive::run(
        &f.config,
        &f.auto,
        &f.trust_base,
        &bob,
        f.path("to-bob.txf"),
        Some("gift-2024"),
        f.path("bob.txf"),
    )
    .await?;

    assert_eq!(received.status, TokenStatus::Confirmed);
    assert!(received.offline_transfer.is_none());
    assert_eq!(received.state.data.as_deref(), Some(GIFT_DATA));
    let hop = &received.transactions[0];
    assert_eq!(hop.data.recipient.to_string(), bob_address);
    assert_eq!(
        address_of(&received.state.predicate, received.id(), received.token_type()),
        hop.data.recipient
    );
    assert_eq!(
        hop.inclusion_proof.authenticator.as_ref().map(|a| a.public_key),
        Some(sender_key)
    );
    verify_chain_integrity(&received)?;

    let on_disk = verify::run(&f.trust_base, f.path("bob.txf"))?;
    assert_eq!(on_disk, received);
    Ok(())
}

/// Bob passes the token on to Carol with an immediate submission; the chain keeps
/// verifying across both hops.
#[tokio::test]
async fn test_two_hop_chain_with_submit_now() {
    let f = Fixture::new();
    let alice = wallet("alice secret");
    let bob = wallet("bob secret");
    let carol = wallet("carol secret");

    f.mint_gift(&alice, "gift-2", "alice.txf").await;
    let bob_address = gen_address::run(&bob, TOKEN_TYPE, None).unwrap();
    send::run(
        &f.config,
        &f.auto,
        &f.trust_base,
        &alice,
        f.path("alice.txf"),
        SendRequest {
            recipient: bob_address,
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
        None,
        f.path("bob.txf"),
    )
    .await
    .unwrap();

    let carol_address = gen_address::run(&carol, TOKEN_TYPE, Some("for carol")).unwrap();
    let document = send::run(
        &f.config,
        &f.auto,
        &f.trust_base,
        &bob,
        f.path("bob.txf"),
        SendRequest {
            recipient: carol_address,
            data: Some(br#"{"name":"gift","note":"regifted"}"#.to_vec()),
            message: None,
            offline: false,
        },
        f.path("to-carol.txf"),
    )
    .await
    .unwrap();
    assert_eq!(document.transfer_state(), TransferState::TransferSubmitted);
    assert_eq!(
        load_token(f.path("bob.txf")).unwrap().status,
        TokenStatus::Transferred
    );

    let received = receive::run(
        &f.config,
        &f.auto,
        &f.trust_base,
        &carol,
        f.path("to-carol.txf"),
        Some("for carol"),
        f.path("carol.txf"),
    )
    .await
    .unwrap();

    assert_eq!(received.transactions.len(), 2);
    assert_eq!(
        received.state.data.as_deref(),
        Some(&br#"{"name":"gift","note":"regifted"}"#[..])
    );
    received.verify(&f.trust_base).unwrap();
}

/// Only the holder of the masked nonce can accept a transfer to a masked address.
#[tokio::test]
async fn test_receive_with_wrong_nonce_aborts_before_submission() {
    let f = Fixture::new();
    let alice = wallet("alice secret");
    let bob = wallet("bob secret");

    f.mint_gift(&alice, "gift-3", "alice.txf").await;
    let bob_address = gen_address::run(&bob, TOKEN_TYPE, Some("gift-2024")).unwrap();
    send::run(
        &f.config,
        &f.auto,
        &f.trust_base,
        &alice,
        f.path("alice.txf"),
        SendRequest {
            recipient: bob_address,
            offline: true,
            ..SendRequest::default()
        },
        f.path("to-bob.txf"),
    )
    .await
    .unwrap();
    let submissions = f.aggregator.received().len();

    let err = receive::run(
        &f.config,
        &f.auto,
        &f.trust_base,
        &bob,
        f.path("to-bob.txf"),
        Some("gift-2025"),
        f.path("bob.txf"),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Predicate mismatch"), "{}", err);
    assert_eq!(f.aggregator.received().len(), submissions);
    assert!(!f.path("bob.txf").exists());

    // Carol cannot take Bob's transfer either
    let carol = wallet("carol secret");
    assert!(receive::run(
        &f.config,
        &f.auto,
        &f.trust_base,
        &carol,
        f.path("to-bob.txf"),
        Some("gift-2024"),
        f.path("carol.txf"),
    )
    .await
    .is_err());
}
