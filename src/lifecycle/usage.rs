//! Usage rules and partner-usage pairing
//!
//! Each side of a contract reports its own usage. Two usages on the same
//! contract with swapped owner/receiver are partners; `partnerUsageId` links
//! them so settlement generation can compare both reports.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::{DocumentQuery, SortOrder};
use crate::model::{
    Document, DocumentKind, DocumentState, DocumentType, HistoryAction, UsageDetails,
};
use crate::types::{BridgeError, Result};

use super::check_child_send;

fn default_version() -> String {
    "1.0".to_string()
}

/// Input for a new usage draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUsage {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Local id of the parent contract
    pub contract_id: String,
    /// Defaults to the local participant
    #[serde(default)]
    pub msp_owner: Option<String>,
    #[serde(default)]
    pub body: Value,
}

/// Build a DRAFT usage under `contract`
///
/// The owner must be one of the contract parties; the receiver is the other.
pub fn draft(id: String, input: NewUsage, contract: &Document, local_msp: &str) -> Result<Document> {
    let parties = contract.as_contract().ok_or_else(|| {
        BridgeError::BadRequest(format!(
            "{} is a {}, usages need a contract",
            contract.id,
            contract.doc_type()
        ))
    })?;

    let owner = input.msp_owner.unwrap_or_else(|| local_msp.to_string());
    if !parties.from_msp.is(&owner) && !parties.to_msp.is(&owner) {
        return Err(BridgeError::BadRequest(format!(
            "{} is not a party of contract {}",
            owner, contract.id
        )));
    }
    let receiver = contract
        .counterparty(&owner)
        .ok_or_else(|| {
            BridgeError::BadRequest(format!("contract {} has no counterparty", contract.id))
        })?
        .to_string();

    Ok(Document::new(
        id,
        DocumentKind::Usage(UsageDetails {
            contract_id: contract.id.clone(),
            contract_reference_id: contract.reference_id.clone(),
            msp_owner: owner,
            msp_receiver: receiver,
            partner_usage_id: None,
        }),
        input.name,
        input.version,
        DocumentState::Draft,
        input.body,
        HistoryAction::Created,
    ))
}

pub fn check_send(usage: &Document, contract: &Document, local_msp: &str) -> Result<()> {
    if usage.as_usage().is_none() {
        return Err(BridgeError::Internal(format!(
            "{} {} is not a usage",
            usage.doc_type(),
            usage.id
        )));
    }
    check_child_send(usage, contract, local_msp)
}

/// Received usages from the other side of the contract, most recent first
///
/// Used when sending: the newest match becomes the outgoing `partnerUsageId`.
pub fn outgoing_partner_query(usage: &Document) -> Option<DocumentQuery> {
    let details = usage.as_usage()?;
    Some(
        DocumentQuery::default()
            .of_type(DocumentType::Usage)
            .for_contract(details.contract_id.as_str())
            .owned_by(details.msp_receiver.as_str(), details.msp_owner.as_str())
            .in_states(&[DocumentState::Received])
            .sorted(SortOrder::Newest),
    )
}

/// Exchanged local usages a newly received usage may pair with, most recent first
pub fn incoming_partner_query(usage: &Document) -> Option<DocumentQuery> {
    let details = usage.as_usage()?;
    Some(
        DocumentQuery::default()
            .of_type(DocumentType::Usage)
            .for_contract(details.contract_id.as_str())
            .owned_by(details.msp_receiver.as_str(), details.msp_owner.as_str())
            .in_states(&[DocumentState::Sent, DocumentState::Received])
            .sorted(SortOrder::Newest),
    )
}

/// First candidate that is not yet paired with another usage
pub fn first_unlinked(candidates: &[Document]) -> Option<&Document> {
    candidates
        .iter()
        .find(|doc| doc.as_usage().is_some_and(|u| u.partner_usage_id.is_none()))
}

/// Point `usage` at `partner_id`; returns false when it already did
pub fn link_partner(usage: &mut Document, partner_id: &str) -> bool {
    let Some(details) = usage.as_usage_mut() else {
        return false;
    };
    if details.partner_usage_id.as_deref() == Some(partner_id) {
        return false;
    }
    details.partner_usage_id = Some(partner_id.to_string());
    usage.record(HistoryAction::PartnerLinked);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContractParties, MspParty};
    use serde_json::json;

    fn contract(state: DocumentState) -> Document {
        let mut doc = Document::new(
            "c-1".into(),
            DocumentKind::Contract(ContractParties {
                from_msp: MspParty::new("A1"),
                to_msp: MspParty::new("B1"),
            }),
            "contract".into(),
            "1".into(),
            state,
            json!({}),
            HistoryAction::Created,
        );
        doc.reference_id = Some("ref-c".into());
        doc
    }

    fn new_usage(owner: Option<&str>) -> NewUsage {
        NewUsage {
            name: "usage".into(),
            version: "1".into(),
            contract_id: "c-1".into(),
            msp_owner: owner.map(str::to_string),
            body: json!({}),
        }
    }

    #[test]
    fn test_draft_resolves_receiver() {
        let usage = draft("u-1".into(), new_usage(None), &contract(DocumentState::Sent), "B1").unwrap();
        let details = usage.as_usage().unwrap();
        assert_eq!(details.msp_owner, "B1");
        assert_eq!(details.msp_receiver, "A1");
        assert_eq!(details.contract_reference_id.as_deref(), Some("ref-c"));
    }

    #[test]
    fn test_draft_rejects_outsider() {
        let result = draft(
            "u-1".into(),
            new_usage(Some("Z9")),
            &contract(DocumentState::Sent),
            "A1",
        );
        assert!(matches!(result, Err(BridgeError::BadRequest(_))));
    }

    #[test]
    fn test_send_requires_exchanged_contract_and_local_owner() {
        let sent = contract(DocumentState::Sent);
        let usage = draft("u-1".into(), new_usage(Some("A1")), &sent, "A1").unwrap();

        assert!(check_send(&usage, &sent, "A1").is_ok());
        assert!(matches!(
            check_send(&usage, &contract(DocumentState::Draft), "A1"),
            Err(BridgeError::SendNotAllowed(_))
        ));
        assert!(matches!(
            check_send(&usage, &sent, "B1"),
            Err(BridgeError::SendNotAllowed(_))
        ));
    }

    #[test]
    fn test_partner_queries_swap_pair() {
        let usage = draft("u-1".into(), new_usage(Some("A1")), &contract(DocumentState::Sent), "A1").unwrap();

        let outgoing = outgoing_partner_query(&usage).unwrap();
        assert_eq!(outgoing.msp_owner.as_deref(), Some("B1"));
        assert_eq!(outgoing.msp_receiver.as_deref(), Some("A1"));
        assert_eq!(outgoing.states, vec![DocumentState::Received]);
        assert_eq!(outgoing.sort, SortOrder::Newest);

        let incoming = incoming_partner_query(&usage).unwrap();
        assert_eq!(incoming.states.len(), 2);
    }

    #[test]
    fn test_link_partner_once() {
        let mut usage = draft("u-1".into(), new_usage(None), &contract(DocumentState::Sent), "A1").unwrap();
        assert!(link_partner(&mut usage, "u-9"));
        assert!(!link_partner(&mut usage, "u-9"));
        assert_eq!(usage.as_usage().unwrap().partner_usage_id.as_deref(), Some("u-9"));
        assert_eq!(usage.history.last().unwrap().action, HistoryAction::PartnerLinked);
        assert!(first_unlinked(std::slice::from_ref(&usage)).is_none());
    }
}
