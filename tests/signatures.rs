//! Signature registration and propagation between two organizations

mod common;

use common::{event, exchanged_contract, Org, ORG_A, ORG_B};
use docbridge::codec::signature_key;
use docbridge::ledger::{InMemoryNetwork, SignatureSubmission};
use docbridge::model::{Document, SignaturePayload, SignatureSide, SignatureState};
use docbridge::services::LedgerEventName;
use docbridge::BridgeError;
use tokio_test::{assert_err, assert_ok};

fn payload(signature_id: Option<&str>) -> SignaturePayload {
    SignaturePayload {
        signature_id: signature_id.map(str::to_string),
        signature: "MEUCIQDx".into(),
        certificate: "-----BEGIN CERTIFICATE-----".into(),
        algorithm: "secp384r1".into(),
    }
}

fn slot_id(doc: &Document, side: SignatureSide, index: u32) -> String {
    doc.signature_link
        .iter()
        .flatten()
        .find(|s| s.msp == side && s.index == index)
        .map(|s| s.id.clone())
        .expect("slot")
}

#[tokio::test]
async fn signature_reaches_the_counterparty_copy() {
    let network = InMemoryNetwork::new();
    let a = Org::new(&network, ORG_A);
    let b = Org::new(&network, ORG_B);
    let (a_contract, b_contract) = exchanged_contract(&a, &b, 1, 1).await;
    let reference_id = a_contract.reference_id.clone().unwrap();

    let signed = assert_ok!(a.signatures.post_signature(&a_contract.id, payload(None)).await);
    assert_eq!(signed.msp, SignatureSide::FromMsp);
    assert_eq!(signed.state, SignatureState::Signed);
    assert_eq!(signed.signature_id, slot_id(&a_contract, SignatureSide::FromMsp, 0));
    let tx_id = signed.blockchain_ref.as_ref().unwrap().tx_id.clone();

    let at_b = b
        .reconciliation
        .process_event(&event(
            ORG_A,
            LedgerEventName::Signature,
            &signature_key(&reference_id, ORG_A),
        ))
        .await
        .unwrap();
    assert!(at_b.is_empty());

    let b_slot = slot_id(&b_contract, SignatureSide::FromMsp, 0);
    let status = b.signatures.get_signature(&b_contract.id, &b_slot).await.unwrap();
    assert_eq!(status.state, SignatureState::Signed);
    assert_eq!(status.algorithm.as_deref(), Some("secp384r1"));
    assert_eq!(status.signature.as_deref(), Some("MEUCIQDx"));
    let blockchain_ref = status.blockchain_ref.unwrap();
    assert_eq!(blockchain_ref.tx_id, tx_id);
    assert_eq!(blockchain_ref.kind, "hlf");

    // the toMsp slot is still open on both copies
    let listed = b.signatures.list_signatures(&b_contract.id).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[1].msp, SignatureSide::ToMsp);
    assert_eq!(listed[1].state, SignatureState::Unsigned);
    assert!(listed[1].blockchain_ref.is_none());
}

#[tokio::test]
async fn signed_slots_cannot_be_signed_again() {
    let network = InMemoryNetwork::new();
    let a = Org::new(&network, ORG_A);
    let b = Org::new(&network, ORG_B);
    let (a_contract, _) = exchanged_contract(&a, &b, 1, 1).await;
    let from_slot = slot_id(&a_contract, SignatureSide::FromMsp, 0);

    a.signatures
        .post_signature(&a_contract.id, payload(Some(&from_slot)))
        .await
        .unwrap();

    let err = assert_err!(
        a.signatures
            .post_signature(&a_contract.id, payload(Some(&from_slot)))
            .await
    );
    assert!(matches!(err, BridgeError::UpdateSignaturesNotAllowed(_)));

    // no open slot left on A's side
    let err = assert_err!(a.signatures.post_signature(&a_contract.id, payload(None)).await);
    assert!(matches!(err, BridgeError::UpdateSignaturesNotAllowed(_)));

    // the other side's slot is not A's to sign
    let to_slot = slot_id(&a_contract, SignatureSide::ToMsp, 0);
    let err = assert_err!(
        a.signatures
            .post_signature(&a_contract.id, payload(Some(&to_slot)))
            .await
    );
    assert!(matches!(err, BridgeError::UpdateSignaturesNotAllowed(_)));
}

#[tokio::test]
async fn signature_queries_need_an_exchanged_document() {
    let network = InMemoryNetwork::new();
    let a = Org::new(&network, ORG_A);
    let b = Org::new(&network, ORG_B);

    let draft = a.create_contract(ORG_B, 1, 1).await;
    let err = assert_err!(a.signatures.list_signatures(&draft.id).await);
    assert!(matches!(err, BridgeError::GetSignaturesNotAllowed(_)));
    let err = assert_err!(a.signatures.get_signature(&draft.id, "any").await);
    assert!(matches!(err, BridgeError::GetSignaturesNotAllowed(_)));
    let err = assert_err!(a.signatures.post_signature(&draft.id, payload(None)).await);
    assert!(matches!(err, BridgeError::UpdateSignaturesNotAllowed(_)));

    let (a_contract, _) = exchanged_contract(&a, &b, 1, 1).await;
    let err = assert_err!(a.signatures.get_signature(&a_contract.id, "no-such-slot").await);
    assert!(matches!(err, BridgeError::SignatureNotFound(_)));
    let err = assert_err!(
        a.signatures
            .post_signature(&a_contract.id, payload(Some("no-such-slot")))
            .await
    );
    assert!(matches!(err, BridgeError::SignatureNotFound(_)));
}

#[tokio::test]
async fn unknown_signature_key_changes_nothing() {
    let network = InMemoryNetwork::new();
    let a = Org::new(&network, ORG_A);
    let b = Org::new(&network, ORG_B);
    let (_, b_contract) = exchanged_contract(&a, &b, 1, 1).await;

    let result = b
        .reconciliation
        .process_event(&event(
            ORG_A,
            LedgerEventName::Signature,
            &signature_key("unknown-reference", ORG_A),
        ))
        .await
        .unwrap();
    assert!(result.is_empty());

    let unchanged = b.documents.get_document(&b_contract.id).await.unwrap();
    assert_eq!(unchanged, b_contract);
}

#[tokio::test]
async fn sent_copy_only_follows_owner_events() {
    let network = InMemoryNetwork::new();
    let a = Org::new(&network, ORG_A);
    let b = Org::new(&network, ORG_B);
    let (a_contract, b_contract) = exchanged_contract(&a, &b, 1, 1).await;
    let reference_id = a_contract.reference_id.clone().unwrap();

    b.signatures
        .post_signature(&b_contract.id, payload(None))
        .await
        .unwrap();
    let key = signature_key(&reference_id, ORG_B);

    // A's copy is SENT and A owns it: an event raised by B is ignored
    a.reconciliation
        .process_event(&event(ORG_B, LedgerEventName::Signature, &key))
        .await
        .unwrap();
    let to_slot = slot_id(&a_contract, SignatureSide::ToMsp, 0);
    let status = a.signatures.get_signature(&a_contract.id, &to_slot).await.unwrap();
    assert_eq!(status.state, SignatureState::Unsigned);

    // the same key raised by the owner links B's registered signature
    a.reconciliation
        .process_event(&event(ORG_A, LedgerEventName::Signature, &key))
        .await
        .unwrap();
    let status = a.signatures.get_signature(&a_contract.id, &to_slot).await.unwrap();
    assert_eq!(status.state, SignatureState::Signed);
    assert_eq!(status.msp, SignatureSide::ToMsp);
}

#[tokio::test]
async fn usage_slots_follow_the_contract_signers() {
    let network = InMemoryNetwork::new();
    let a = Org::new(&network, ORG_A);
    let b = Org::new(&network, ORG_B);
    let (a_contract, _) = exchanged_contract(&a, &b, 2, 1).await;

    let usage = a.create_usage(&a_contract.id, "October").await;
    let sent = a.documents.send_document(&usage.id).await.unwrap();
    let received = b.receive_from(ORG_A).await;

    let at_a = a.signatures.list_signatures(&sent.id).await.unwrap();
    let at_b = b.signatures.list_signatures(&received[0].id).await.unwrap();
    for statuses in [&at_a, &at_b] {
        let sides: Vec<_> = statuses.iter().map(|s| s.msp).collect();
        assert_eq!(
            sides,
            vec![SignatureSide::FromMsp, SignatureSide::FromMsp, SignatureSide::ToMsp]
        );
        assert!(statuses.iter().all(|s| s.state == SignatureState::Unsigned));
    }

    // B is the usage's receiver and signs on the toMsp side
    let signed = b
        .signatures
        .post_signature(&received[0].id, payload(None))
        .await
        .unwrap();
    assert_eq!(signed.msp, SignatureSide::ToMsp);
}

#[tokio::test]
async fn one_event_fills_every_registered_signature() {
    let network = InMemoryNetwork::new();
    let a = Org::new(&network, ORG_A);
    let b = Org::new(&network, ORG_B);
    let (a_contract, b_contract) = exchanged_contract(&a, &b, 2, 1).await;
    let reference_id = a_contract.reference_id.clone().unwrap();

    let mut tx_ids = Vec::new();
    for signer in ["director", "controller"] {
        let tx_id = network
            .register_signature(
                &reference_id,
                ORG_A,
                SignatureSubmission {
                    algorithm: "secp384r1".into(),
                    certificate: format!("{}-cert", signer),
                    signature: format!("{}-sig", signer),
                },
            )
            .await;
        tx_ids.push(tx_id);
    }

    b.reconciliation
        .process_event(&event(
            ORG_A,
            LedgerEventName::Signature,
            &signature_key(&reference_id, ORG_A),
        ))
        .await
        .unwrap();

    let stored = b.documents.get_document(&b_contract.id).await.unwrap();
    let from_slots: Vec<_> = stored
        .signature_link
        .iter()
        .flatten()
        .filter(|s| s.msp == SignatureSide::FromMsp)
        .map(|s| (s.index, s.tx_id.clone()))
        .collect();
    assert_eq!(
        from_slots,
        vec![(0, Some(tx_ids[0].clone())), (1, Some(tx_ids[1].clone()))]
    );

    let statuses = b.signatures.list_signatures(&b_contract.id).await.unwrap();
    assert_eq!(statuses[0].certificate.as_deref(), Some("director-cert"));
    assert_eq!(statuses[1].certificate.as_deref(), Some("controller-cert"));
    assert_eq!(statuses[2].state, SignatureState::Unsigned);
}
