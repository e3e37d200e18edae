//! Document service
//!
//! Local actor operations over contracts, usages and settlements. Each call
//! is retrieve → apply lifecycle rule → (publish) → persist; the lifecycle
//! module decides, this module does the I/O.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::codec::{encode, Envelope};
use crate::db::{DocumentQuery, SortOrder};
use crate::ledger::NewPrivateDocument;
use crate::lifecycle::{
    self, contract, settlement, usage, DocumentUpdate, GenerateMode, NewDocument,
};
use crate::model::{Document, DocumentState, DocumentType};
use crate::types::{BridgeError, Result};

use super::{ServiceContext, SettlementCalculator};

/// Filter for `list_documents`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFilter {
    #[serde(default, rename = "type")]
    pub doc_type: Option<DocumentType>,
    #[serde(default)]
    pub state: Option<DocumentState>,
    #[serde(default)]
    pub contract_id: Option<String>,
}

impl DocumentFilter {
    fn to_query(&self) -> DocumentQuery {
        DocumentQuery {
            doc_type: self.doc_type,
            states: self.state.into_iter().collect(),
            contract_id: self.contract_id.clone(),
            sort: SortOrder::Newest,
            ..Default::default()
        }
    }
}

pub struct DocumentService {
    ctx: ServiceContext,
    calculator: Arc<dyn SettlementCalculator>,
}

impl DocumentService {
    pub fn new(ctx: ServiceContext, calculator: Arc<dyn SettlementCalculator>) -> Self {
        Self { ctx, calculator }
    }

    /// Create a DRAFT contract or usage
    ///
    /// Settlements are only created through `generate_settlement`.
    pub async fn create_document(&self, input: NewDocument) -> Result<Document> {
        let id = self.ctx.ids.allocate();
        let doc = match input {
            NewDocument::Contract(input) => contract::draft(id, input, self.ctx.msp_id())?,
            NewDocument::Usage(input) => {
                let parent = self
                    .ctx
                    .store
                    .find_one(&DocumentQuery::by_id(input.contract_id.as_str()))
                    .await?;
                usage::draft(id, input, &parent, self.ctx.msp_id())?
            }
        };

        let created = self.ctx.store.create(doc).await?;
        info!(id = %created.id, doc_type = %created.doc_type(), "Document created");
        Ok(created)
    }

    pub async fn get_document(&self, id: &str) -> Result<Document> {
        self.ctx.store.find_one(&DocumentQuery::by_id(id)).await
    }

    /// Matching documents, newest first
    pub async fn list_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>> {
        self.ctx.store.find_all(&filter.to_query()).await
    }

    pub async fn update_document(&self, id: &str, update: DocumentUpdate) -> Result<Document> {
        let mut doc = self.get_document(id).await?;
        lifecycle::apply_update(&mut doc, update)?;
        let updated = self.ctx.store.replace(&doc).await?;
        debug!(id = %id, "Document updated");
        Ok(updated)
    }

    pub async fn delete_document(&self, id: &str) -> Result<Document> {
        let removed = self.ctx.store.remove(&DocumentQuery::by_id(id)).await?;
        info!(id = %id, state = %removed.state, "Document deleted");
        Ok(removed)
    }

    /// Publish a DRAFT to its counterparty through the ledger
    pub async fn send_document(&self, id: &str) -> Result<Document> {
        let mut doc = self.get_document(id).await?;
        let local = self.ctx.msp_id().to_string();
        let mut partner = None;

        match doc.doc_type() {
            DocumentType::Contract => {
                contract::check_send(&doc, &local)?;
                self.publish(&mut doc).await?;
                if let Some(parties) = doc.as_contract().cloned() {
                    lifecycle::ensure_signature_link(&mut doc, &parties, self.ctx.ids.as_ref());
                }
            }
            DocumentType::Usage => {
                let parent = self.parent_contract(&doc).await?;
                usage::check_send(&doc, &parent, &local)?;
                lifecycle::bind_contract_reference(&mut doc, &parent);
                partner = self.link_outgoing_partner(&mut doc).await?;
                self.publish(&mut doc).await?;
                if let Some(parties) = parent.as_contract() {
                    lifecycle::ensure_signature_link(&mut doc, parties, self.ctx.ids.as_ref());
                }
            }
            DocumentType::Settlement => {
                let parent = self.parent_contract(&doc).await?;
                settlement::check_send(&doc, &parent, &local)?;
                lifecycle::bind_contract_reference(&mut doc, &parent);
                self.publish(&mut doc).await?;
            }
        }

        let sent = self.ctx.store.replace(&doc).await?;
        // the reciprocal link only exists once the usage is on the ledger
        if let Some(partner) = partner {
            self.ctx.store.replace(&partner).await?;
        }
        info!(
            id = %sent.id,
            doc_type = %sent.doc_type(),
            reference_id = sent.reference_id.as_deref().unwrap_or_default(),
            "Document sent"
        );
        Ok(sent)
    }

    /// Calculate a settlement for a usage; `Commit` also sends it
    pub async fn generate_settlement(&self, usage_id: &str, mode: GenerateMode) -> Result<Document> {
        let usage = self.get_document(usage_id).await?;
        settlement::check_generate(&usage, self.ctx.msp_id())?;
        let partner = match usage.as_usage().and_then(|u| u.partner_usage_id.as_deref()) {
            Some(partner_id) => self.ctx.find_optional(&DocumentQuery::by_id(partner_id)).await?,
            None => None,
        };

        let result = self.calculator.calculate(&usage, partner.as_ref()).await?;
        let draft = settlement::draft(self.ctx.ids.allocate(), &usage, result, self.ctx.msp_id())?;
        let created = self.ctx.store.create(draft).await?;
        info!(
            id = %created.id,
            usage_id = %usage_id,
            partner_usage_id = partner.as_ref().map(|p| p.id.as_str()).unwrap_or_default(),
            mode = ?mode,
            "Settlement generated"
        );

        match mode {
            GenerateMode::Preview => Ok(created),
            GenerateMode::Commit => self.send_document(&created.id).await,
        }
    }

    pub async fn reject_settlement(&self, id: &str) -> Result<Document> {
        let mut doc = self.get_document(id).await?;
        settlement::reject(&mut doc)?;
        let rejected = self.ctx.store.replace(&doc).await?;
        info!(id = %id, "Settlement rejected");
        Ok(rejected)
    }

    async fn parent_contract(&self, doc: &Document) -> Result<Document> {
        let contract_id = doc.contract_id().ok_or_else(|| {
            BridgeError::Internal(format!("{} {} has no contract", doc.doc_type(), doc.id))
        })?;
        self.ctx
            .store
            .find_one(&DocumentQuery::by_id(contract_id).of_type(DocumentType::Contract))
            .await
    }

    /// Pair an outgoing usage with the newest received usage of the other side
    ///
    /// Returns the partner when it needs the reciprocal link; the caller
    /// persists it after a successful publish.
    async fn link_outgoing_partner(&self, doc: &mut Document) -> Result<Option<Document>> {
        let Some(query) = usage::outgoing_partner_query(doc) else {
            return Ok(None);
        };
        let Some(mut partner) = self.ctx.find_optional(&query).await? else {
            return Ok(None);
        };

        usage::link_partner(doc, &partner.id);
        debug!(id = %doc.id, partner_usage_id = %partner.id, "Usage paired before send");
        if partner.as_usage().is_some_and(|u| u.partner_usage_id.is_none()) {
            usage::link_partner(&mut partner, &doc.id);
            return Ok(Some(partner));
        }
        Ok(None)
    }

    async fn publish(&self, doc: &mut Document) -> Result<()> {
        let to_msp = doc
            .counterparty(self.ctx.msp_id())
            .ok_or_else(|| {
                BridgeError::SendNotAllowed(format!(
                    "{} {} has no counterparty",
                    doc.doc_type(),
                    doc.id
                ))
            })?
            .to_string();

        let payload = encode(&Envelope::from_document(doc))?;
        let published = self
            .ctx
            .ledger
            .publish_private_document(&NewPrivateDocument {
                to_msp,
                payload: payload.clone(),
            })
            .await?;

        lifecycle::mark_sent(
            doc,
            &published.delivery(),
            payload,
            &self.ctx.config.blockchain_type,
        )
    }
}
