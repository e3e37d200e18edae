//! Document record shared by contracts, usages and settlements
//!
//! A `Document` carries the common lifecycle fields (state, history,
//! ledger reference, signature slots) and a `DocumentKind` with the
//! kind-specific participant fields. The kind is flattened next to the common
//! fields with a `type` discriminant, which is also how it is persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::signature::{SignatureLinkEntry, SignatureSide};

/// Document kind discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Contract,
    Usage,
    Settlement,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Contract => "contract",
            DocumentType::Usage => "usage",
            DocumentType::Settlement => "settlement",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentState {
    /// Locally authored, still editable
    Draft,
    /// Published to the counter-party through the ledger
    Sent,
    /// Received from the counter-party through the ledger
    Received,
}

impl DocumentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentState::Draft => "DRAFT",
            DocumentState::Sent => "SENT",
            DocumentState::Received => "RECEIVED",
        }
    }

    /// Whether the document has been through a full ledger exchange
    pub fn is_exchanged(&self) -> bool {
        matches!(self, DocumentState::Sent | DocumentState::Received)
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// History action recorded on every lifecycle step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryAction {
    Created,
    Updated,
    Sent,
    Received,
    Rejected,
    Signed,
    PartnerLinked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: HistoryAction,
    pub date: DateTime<Utc>,
}

/// Where a document landed on the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockchainRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub tx_id: String,
    pub timestamp: String,
}

/// A configured signer on one side of a contract
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Signer {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
}

/// One contract party: its network identity plus its signers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MspParty {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msp_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_signatures: Option<u32>,
    #[serde(default)]
    pub signatures: Vec<Signer>,
}

impl MspParty {
    pub fn new(msp_id: impl Into<String>) -> Self {
        Self {
            msp_id: Some(msp_id.into()),
            ..Default::default()
        }
    }

    pub fn is(&self, msp_id: &str) -> bool {
        self.msp_id.as_deref() == Some(msp_id)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractParties {
    #[serde(default)]
    pub from_msp: MspParty,
    #[serde(default)]
    pub to_msp: MspParty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageDetails {
    pub contract_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_reference_id: Option<String>,
    pub msp_owner: String,
    pub msp_receiver: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_usage_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SettlementTag {
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementDetails {
    pub contract_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_reference_id: Option<String>,
    pub msp_owner: String,
    pub msp_receiver: String,
    /// Usage the settlement was generated from (local only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<SettlementTag>,
    /// Calculator output kept aside so a rejection can restore it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_result: Option<Value>,
}

/// Kind-specific fields, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DocumentKind {
    Contract(ContractParties),
    Usage(UsageDetails),
    Settlement(SettlementDetails),
}

/// A commercial document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    #[serde(flatten)]
    pub kind: DocumentKind,
    pub version: String,
    pub name: String,
    pub state: DocumentState,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    pub creation_date: DateTime<Utc>,
    pub last_modification_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockchain_ref: Option<BlockchainRef>,
    #[serde(default)]
    pub storage_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_link: Option<Vec<SignatureLinkEntry>>,
    #[serde(default)]
    pub body: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<String>,
}

impl Document {
    /// Build a fresh document; history starts with the given action
    pub fn new(
        id: String,
        kind: DocumentKind,
        name: String,
        version: String,
        state: DocumentState,
        body: Value,
        action: HistoryAction,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind,
            version,
            name,
            state,
            history: vec![HistoryEntry { action, date: now }],
            creation_date: now,
            last_modification_date: now,
            reference_id: None,
            blockchain_ref: None,
            storage_keys: Vec::new(),
            signature_link: None,
            body,
            raw_data: None,
        }
    }

    pub fn doc_type(&self) -> DocumentType {
        match self.kind {
            DocumentKind::Contract(_) => DocumentType::Contract,
            DocumentKind::Usage(_) => DocumentType::Usage,
            DocumentKind::Settlement(_) => DocumentType::Settlement,
        }
    }

    pub fn as_contract(&self) -> Option<&ContractParties> {
        match &self.kind {
            DocumentKind::Contract(parties) => Some(parties),
            _ => None,
        }
    }

    pub fn as_usage(&self) -> Option<&UsageDetails> {
        match &self.kind {
            DocumentKind::Usage(usage) => Some(usage),
            _ => None,
        }
    }

    pub fn as_usage_mut(&mut self) -> Option<&mut UsageDetails> {
        match &mut self.kind {
            DocumentKind::Usage(usage) => Some(usage),
            _ => None,
        }
    }

    pub fn as_settlement(&self) -> Option<&SettlementDetails> {
        match &self.kind {
            DocumentKind::Settlement(settlement) => Some(settlement),
            _ => None,
        }
    }

    pub fn as_settlement_mut(&mut self) -> Option<&mut SettlementDetails> {
        match &mut self.kind {
            DocumentKind::Settlement(settlement) => Some(settlement),
            _ => None,
        }
    }

    /// Parent contract id for usages and settlements
    pub fn contract_id(&self) -> Option<&str> {
        match &self.kind {
            DocumentKind::Contract(_) => None,
            DocumentKind::Usage(u) => Some(&u.contract_id),
            DocumentKind::Settlement(s) => Some(&s.contract_id),
        }
    }

    /// Owning participant: the contract's `fromMsp`, or `mspOwner`
    pub fn owner_msp_id(&self) -> Option<&str> {
        self.side_msp_id(SignatureSide::FromMsp)
    }

    /// Participant standing on one side of the document
    ///
    /// Usages and settlements map `fromMsp` to the owner and `toMsp` to the
    /// receiver.
    pub fn side_msp_id(&self, side: SignatureSide) -> Option<&str> {
        match (&self.kind, side) {
            (DocumentKind::Contract(c), SignatureSide::FromMsp) => c.from_msp.msp_id.as_deref(),
            (DocumentKind::Contract(c), SignatureSide::ToMsp) => c.to_msp.msp_id.as_deref(),
            (DocumentKind::Usage(u), SignatureSide::FromMsp) => Some(&u.msp_owner),
            (DocumentKind::Usage(u), SignatureSide::ToMsp) => Some(&u.msp_receiver),
            (DocumentKind::Settlement(s), SignatureSide::FromMsp) => Some(&s.msp_owner),
            (DocumentKind::Settlement(s), SignatureSide::ToMsp) => Some(&s.msp_receiver),
        }
    }

    /// The participant on the other side from `local_msp`
    pub fn counterparty(&self, local_msp: &str) -> Option<&str> {
        let from = self.side_msp_id(SignatureSide::FromMsp);
        let to = self.side_msp_id(SignatureSide::ToMsp);
        if from == Some(local_msp) {
            to
        } else {
            from
        }
    }

    /// Append a history entry and bump the modification date
    pub fn record(&mut self, action: HistoryAction) {
        let now = Utc::now();
        self.history.push(HistoryEntry { action, date: now });
        self.last_modification_date = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn usage() -> Document {
        Document::new(
            "u-1".into(),
            DocumentKind::Usage(UsageDetails {
                contract_id: "c-1".into(),
                contract_reference_id: Some("ref-c".into()),
                msp_owner: "A1".into(),
                msp_receiver: "B1".into(),
                partner_usage_id: None,
            }),
            "Q1 usage".into(),
            "1.0".into(),
            DocumentState::Draft,
            json!({ "inbound": [] }),
            HistoryAction::Created,
        )
    }

    #[test]
    fn test_kind_is_flattened_with_type_tag() {
        let doc = usage();
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["type"], "usage");
        assert_eq!(value["contractId"], "c-1");
        assert_eq!(value["mspOwner"], "A1");
        assert_eq!(value["state"], "DRAFT");
        assert!(value.get("referenceId").is_none());

        let back: Document = serde_json::from_value(value).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_sides_and_counterparty() {
        let doc = usage();
        assert_eq!(doc.owner_msp_id(), Some("A1"));
        assert_eq!(doc.side_msp_id(SignatureSide::ToMsp), Some("B1"));
        assert_eq!(doc.counterparty("A1"), Some("B1"));
        assert_eq!(doc.counterparty("B1"), Some("A1"));
    }

    #[test]
    fn test_record_appends_history() {
        let mut doc = usage();
        doc.record(HistoryAction::Sent);
        assert_eq!(doc.history.len(), 2);
        assert_eq!(doc.history[1].action, HistoryAction::Sent);
        assert!(doc.last_modification_date >= doc.creation_date);
    }
}
