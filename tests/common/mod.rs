//! Two organizations sharing one in-memory ledger network

#![allow(dead_code)]

use serde_json::json;
use std::sync::Arc;

use docbridge::codec::payload_key;
use docbridge::config::ServiceConfig;
use docbridge::db::InMemoryDocumentStore;
use docbridge::ledger::InMemoryNetwork;
use docbridge::lifecycle::{NewContract, NewDocument, NewUsage};
use docbridge::model::{Document, MspParty, Signer, UuidAllocator};
use docbridge::services::{
    DocumentService, EventData, LedgerEvent, LedgerEventName, ReconciledDocument,
    ReconciliationService, ServiceContext, SignatureService, StaticCalculator,
};

pub const ORG_A: &str = "A1";
pub const ORG_B: &str = "B1";

pub struct Org {
    pub msp_id: String,
    pub store: InMemoryDocumentStore,
    pub documents: DocumentService,
    pub signatures: SignatureService,
    pub reconciliation: ReconciliationService,
    pub calculator: Arc<StaticCalculator>,
}

impl Org {
    pub fn new(network: &Arc<InMemoryNetwork>, msp_id: &str) -> Self {
        let store = InMemoryDocumentStore::new();
        let ctx = ServiceContext::new(
            Arc::new(store.clone()),
            Arc::new(network.participant(msp_id)),
            Arc::new(UuidAllocator),
            ServiceConfig::new(msp_id),
        );
        let calculator = Arc::new(StaticCalculator::new(json!({ "netPosition": 1250.5 })));

        Self {
            msp_id: msp_id.to_string(),
            store,
            documents: DocumentService::new(ctx.clone(), calculator.clone()),
            signatures: SignatureService::new(ctx.clone()),
            reconciliation: ReconciliationService::new(ctx),
            calculator,
        }
    }

    /// Handle the payload-link notification for everything `from` has published to us
    pub async fn receive_from(&self, from: &str) -> Vec<ReconciledDocument> {
        self.reconciliation
            .process_event(&event(
                from,
                LedgerEventName::PayloadLink,
                &payload_key(&self.msp_id, from),
            ))
            .await
            .expect("payload link event")
    }

    pub async fn create_contract(&self, to: &str, from_signers: usize, to_signers: usize) -> Document {
        self.documents
            .create_document(NewDocument::Contract(NewContract {
                name: "Roaming agreement 2026".into(),
                version: "1.0".into(),
                from_msp: party(&self.msp_id, from_signers),
                to_msp: party(to, to_signers),
                body: json!({ "discounts": [{ "service": "MOC", "rate": 0.05 }] }),
            }))
            .await
            .expect("create contract")
    }

    pub async fn create_usage(&self, contract_id: &str, name: &str) -> Document {
        self.documents
            .create_document(NewDocument::Usage(NewUsage {
                name: name.into(),
                version: "1.0".into(),
                contract_id: contract_id.into(),
                msp_owner: None,
                body: json!({ "inbound": [{ "service": "MOC", "volume": 120 }] }),
            }))
            .await
            .expect("create usage")
    }
}

pub fn party(msp_id: &str, signers: usize) -> MspParty {
    MspParty {
        msp_id: Some(msp_id.to_string()),
        min_signatures: Some(signers as u32),
        signatures: (0..signers)
            .map(|i| Signer {
                id: format!("{}-signer-{}", msp_id, i),
                name: format!("Signer {}", i),
                role: "Director".into(),
            })
            .collect(),
    }
}

pub fn event(msp: &str, name: LedgerEventName, storage_key: &str) -> LedgerEvent {
    LedgerEvent {
        msp: msp.to_string(),
        event_name: name,
        timestamp: Some("2026-10-18T12:00:00Z".into()),
        data: EventData {
            storage_key: storage_key.to_string(),
        },
    }
}

/// A contract sent by A and received by B: (A's copy, B's copy)
pub async fn exchanged_contract(
    a: &Org,
    b: &Org,
    from_signers: usize,
    to_signers: usize,
) -> (Document, Document) {
    let draft = a.create_contract(&b.msp_id, from_signers, to_signers).await;
    let sent = a.documents.send_document(&draft.id).await.expect("send contract");
    let received = b.receive_from(&a.msp_id).await;
    let local = b
        .documents
        .get_document(&received[0].id)
        .await
        .expect("received contract");
    (sent, local)
}
