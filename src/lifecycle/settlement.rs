//! Settlement rules

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::model::{
    Document, DocumentKind, DocumentState, HistoryAction, SettlementDetails, SettlementTag,
};
use crate::types::{BridgeError, Result};

use super::check_child_send;

/// What `generate_settlement` does after calculating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerateMode {
    /// Store the DRAFT only
    #[default]
    Preview,
    /// Store and send in the same call
    Commit,
}

impl FromStr for GenerateMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "preview" => Ok(GenerateMode::Preview),
            "commit" => Ok(GenerateMode::Commit),
            other => Err(BridgeError::BadRequest(format!(
                "unknown settlement mode '{}', expected preview or commit",
                other
            ))),
        }
    }
}

/// A settlement can be generated from an exchanged usage the local participant is party to
///
/// Returns the participant the settlement will be addressed to.
pub fn check_generate(usage: &Document, local_msp: &str) -> Result<String> {
    let details = usage.as_usage().ok_or_else(|| {
        BridgeError::BadRequest(format!(
            "{} is a {}, settlements are generated from usages",
            usage.id,
            usage.doc_type()
        ))
    })?;

    if !usage.state.is_exchanged() {
        return Err(BridgeError::BadRequest(format!(
            "usage {} is {}, it must be SENT or RECEIVED before settling",
            usage.id, usage.state
        )));
    }

    if details.msp_owner == local_msp {
        Ok(details.msp_receiver.clone())
    } else if details.msp_receiver == local_msp {
        Ok(details.msp_owner.clone())
    } else {
        Err(BridgeError::BadRequest(format!(
            "{} is not a party of usage {}",
            local_msp, usage.id
        )))
    }
}

/// Build a DRAFT settlement for `usage` from a calculator result
///
/// The settlement is owned by `local_msp` and addressed to the other party
/// of the usage.
pub fn draft(id: String, usage: &Document, result: Value, local_msp: &str) -> Result<Document> {
    let receiver = check_generate(usage, local_msp)?;
    let details = usage.as_usage().ok_or_else(|| {
        BridgeError::Internal(format!("usage {} lost its usage fields", usage.id))
    })?;

    Ok(Document::new(
        id,
        DocumentKind::Settlement(SettlementDetails {
            contract_id: details.contract_id.clone(),
            contract_reference_id: details.contract_reference_id.clone(),
            msp_owner: local_msp.to_string(),
            msp_receiver: receiver,
            usage_id: Some(usage.id.clone()),
            tag: None,
            generated_result: Some(result.clone()),
        }),
        format!("Settlement for {}", usage.name),
        usage.version.clone(),
        DocumentState::Draft,
        result,
        HistoryAction::Created,
    ))
}

pub fn check_send(settlement: &Document, contract: &Document, local_msp: &str) -> Result<()> {
    if settlement.as_settlement().is_none() {
        return Err(BridgeError::Internal(format!(
            "{} {} is not a settlement",
            settlement.doc_type(),
            settlement.id
        )));
    }
    check_child_send(settlement, contract, local_msp)
}

/// Tag a DRAFT settlement as rejected and restore the calculated body
pub fn reject(doc: &mut Document) -> Result<()> {
    if doc.as_settlement().is_none() {
        return Err(BridgeError::BadRequest(format!(
            "{} is a {}, only settlements can be rejected",
            doc.id,
            doc.doc_type()
        )));
    }
    if doc.state != DocumentState::Draft {
        return Err(BridgeError::ModificationNotAllowed(format!(
            "settlement {} is {}, only DRAFT can be rejected",
            doc.id, doc.state
        )));
    }

    let mut restored = None;
    if let Some(settlement) = doc.as_settlement_mut() {
        settlement.tag = Some(SettlementTag::Rejected);
        restored = settlement.generated_result.clone();
    }
    if let Some(body) = restored {
        doc.body = body;
    }

    doc.record(HistoryAction::Rejected);
    Ok(())
}
