//! Contract rules

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{
    ContractParties, Document, DocumentKind, DocumentState, HistoryAction, MspParty,
};
use crate::types::{BridgeError, Result};

fn default_version() -> String {
    "1.0".to_string()
}

/// Input for a new contract draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContract {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Defaults to the local participant when `mspId` is omitted
    #[serde(default)]
    pub from_msp: MspParty,
    pub to_msp: MspParty,
    #[serde(default)]
    pub body: Value,
}

/// Build a DRAFT contract authored by `local_msp`
pub fn draft(id: String, input: NewContract, local_msp: &str) -> Result<Document> {
    let mut from_msp = input.from_msp;
    if from_msp.msp_id.is_none() {
        from_msp.msp_id = Some(local_msp.to_string());
    }

    let Some(to_id) = input.to_msp.msp_id.as_deref() else {
        return Err(BridgeError::BadRequest("contract toMsp.mspId is required".into()));
    };
    if from_msp.is(to_id) {
        return Err(BridgeError::BadRequest(format!(
            "contract parties must differ, both are {}",
            to_id
        )));
    }

    Ok(Document::new(
        id,
        DocumentKind::Contract(ContractParties {
            from_msp,
            to_msp: input.to_msp,
        }),
        input.name,
        input.version,
        DocumentState::Draft,
        input.body,
        HistoryAction::Created,
    ))
}

/// A contract can be sent once, by its `fromMsp`, while still a DRAFT
pub fn check_send(doc: &Document, local_msp: &str) -> Result<()> {
    let parties = doc.as_contract().ok_or_else(|| {
        BridgeError::Internal(format!("{} {} is not a contract", doc.doc_type(), doc.id))
    })?;

    if doc.state != DocumentState::Draft {
        return Err(BridgeError::SendNotAllowed(format!(
            "contract {} is {}, only DRAFT can be sent",
            doc.id, doc.state
        )));
    }

    if !parties.from_msp.is(local_msp) {
        return Err(BridgeError::SendNotAllowed(format!(
            "contract {} is issued by {}, not by {}",
            doc.id,
            parties.from_msp.msp_id.as_deref().unwrap_or("nobody"),
            local_msp
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input() -> NewContract {
        serde_json::from_value(json!({
            "name": "Roaming 2026",
            "fromMsp": { "mspId": "A1" },
            "toMsp": { "mspId": "B1" },
            "body": { "discounts": [] }
        }))
        .unwrap()
    }

    #[test]
    fn test_draft_contract_has_empty_signers() {
        let doc = draft("c-1".into(), input(), "A1").unwrap();
        assert_eq!(doc.state, DocumentState::Draft);
        assert_eq!(doc.version, "1.0");

        let parties = doc.as_contract().unwrap();
        assert!(parties.from_msp.signatures.is_empty());
        assert!(parties.to_msp.signatures.is_empty());
        assert_eq!(doc.history[0].action, HistoryAction::Created);
    }

    #[test]
    fn test_draft_defaults_from_to_local() {
        let mut input = input();
        input.from_msp = MspParty::default();
        let doc = draft("c-1".into(), input, "A1").unwrap();
        assert!(doc.as_contract().unwrap().from_msp.is("A1"));
    }

    #[test]
    fn test_draft_requires_distinct_counterparty() {
        let mut input = input();
        input.to_msp = MspParty::default();
        assert!(matches!(
            draft("c-1".into(), input.clone(), "A1"),
            Err(BridgeError::BadRequest(_))
        ));

        input.to_msp = MspParty::new("A1");
        assert!(matches!(
            draft("c-1".into(), input, "A1"),
            Err(BridgeError::BadRequest(_))
        ));
    }

    #[test]
    fn test_check_send() {
        let mut doc = draft("c-1".into(), input(), "A1").unwrap();
        assert!(check_send(&doc, "A1").is_ok());
        assert!(matches!(check_send(&doc, "B1"), Err(BridgeError::SendNotAllowed(_))));

        doc.state = DocumentState::Sent;
        assert!(matches!(check_send(&doc, "A1"), Err(BridgeError::SendNotAllowed(_))));
    }
}
