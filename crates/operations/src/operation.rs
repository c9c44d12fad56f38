use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, LocationId, OperationId, ProductId, WarehouseId};

/// Which way an operation moves stock across the warehouse boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Incoming shipment from a vendor into the warehouse.
    Receipt,
    /// Outgoing shipment from the warehouse to a customer.
    Delivery,
}

impl OperationKind {
    /// Receipts bring stock in; they have no source-side stock requirement.
    pub fn requires_available_stock(self) -> bool {
        matches!(self, OperationKind::Delivery)
    }
}

/// Operation status lifecycle: `Draft → Waiting ⇄ Ready → Done`, with
/// `Cancelled` reachable from any non-Done state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Draft,
    Waiting,
    Ready,
    Done,
    Cancelled,
}

impl OperationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationStatus::Draft => "draft",
            OperationStatus::Waiting => "waiting",
            OperationStatus::Ready => "ready",
            OperationStatus::Done => "done",
            OperationStatus::Cancelled => "cancelled",
        }
    }
}

/// One line of an operation: a product and a requested quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationLine {
    pub product: ProductId,
    pub quantity: i64,
}

/// The warehouse-side endpoint of an operation.
///
/// A warehouse endpoint is resolved to that warehouse's default stock
/// location by the topology collaborator before any ledger effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockEndpoint {
    Location(LocationId),
    Warehouse(WarehouseId),
}

/// A line that is still short of stock, with the figures the caller needs to
/// render the shortfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub product: ProductId,
    pub requested: i64,
    pub available: i64,
}

/// Outcome of a sufficiency evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sufficiency {
    Sufficient,
    Short(Vec<Shortfall>),
}

impl Sufficiency {
    pub fn is_sufficient(&self) -> bool {
        matches!(self, Sufficiency::Sufficient)
    }

    pub fn shortfalls(&self) -> &[Shortfall] {
        match self {
            Sufficiency::Sufficient => &[],
            Sufficiency::Short(shortfalls) => shortfalls,
        }
    }
}

/// Fields of a freshly created operation document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDraft {
    pub kind: OperationKind,
    pub contact: String,
    pub scheduled_date: NaiveDate,
    pub endpoint: StockEndpoint,
    pub responsible: String,
    pub source_doc: Option<String>,
    pub delivery_address: Option<String>,
    pub lines: Vec<OperationLine>,
}

/// Draft-only edits. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftEdit {
    pub contact: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub responsible: Option<String>,
    pub source_doc: Option<String>,
    pub delivery_address: Option<String>,
    pub lines: Option<Vec<OperationLine>>,
}

/// A receipt or delivery document progressing through the status lifecycle.
///
/// Line contents and dates are mutable only while `Draft`; past that, the
/// document's effect is committed through the ledger and reversed only by
/// corrective moves, never by editing history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    id: OperationId,
    kind: OperationKind,
    reference: String,
    contact: String,
    scheduled_date: NaiveDate,
    endpoint: StockEndpoint,
    responsible: String,
    source_doc: Option<String>,
    delivery_address: Option<String>,
    status: OperationStatus,
    lines: Vec<OperationLine>,
}

impl Operation {
    pub fn create(id: OperationId, reference: String, draft: OperationDraft) -> DomainResult<Self> {
        if reference.trim().is_empty() {
            return Err(DomainError::validation("reference cannot be empty"));
        }
        if draft.contact.trim().is_empty() {
            return Err(DomainError::validation("contact cannot be empty"));
        }
        validate_lines(&draft.lines)?;

        Ok(Self {
            id,
            kind: draft.kind,
            reference,
            contact: draft.contact,
            scheduled_date: draft.scheduled_date,
            endpoint: draft.endpoint,
            responsible: draft.responsible,
            source_doc: draft.source_doc,
            delivery_address: draft.delivery_address,
            status: OperationStatus::Draft,
            lines: draft.lines,
        })
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn contact(&self) -> &str {
        &self.contact
    }

    pub fn scheduled_date(&self) -> NaiveDate {
        self.scheduled_date
    }

    pub fn endpoint(&self) -> StockEndpoint {
        self.endpoint
    }

    pub fn responsible(&self) -> &str {
        &self.responsible
    }

    pub fn source_doc(&self) -> Option<&str> {
        self.source_doc.as_deref()
    }

    pub fn delivery_address(&self) -> Option<&str> {
        self.delivery_address.as_deref()
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    pub fn lines(&self) -> &[OperationLine] {
        &self.lines
    }

    pub fn is_editable(&self) -> bool {
        matches!(self.status, OperationStatus::Draft)
    }

    /// Apply draft-only edits to the document.
    pub fn apply_edit(&mut self, edit: DraftEdit) -> DomainResult<()> {
        if !self.is_editable() {
            return Err(DomainError::invalid_transition(format!(
                "cannot edit a {} operation, only drafts are editable",
                self.status.as_str()
            )));
        }

        if let Some(lines) = &edit.lines {
            validate_lines(lines)?;
        }
        if let Some(contact) = &edit.contact {
            if contact.trim().is_empty() {
                return Err(DomainError::validation("contact cannot be empty"));
            }
        }

        if let Some(contact) = edit.contact {
            self.contact = contact;
        }
        if let Some(scheduled_date) = edit.scheduled_date {
            self.scheduled_date = scheduled_date;
        }
        if let Some(responsible) = edit.responsible {
            self.responsible = responsible;
        }
        if let Some(source_doc) = edit.source_doc {
            self.source_doc = Some(source_doc);
        }
        if let Some(delivery_address) = edit.delivery_address {
            self.delivery_address = Some(delivery_address);
        }
        if let Some(lines) = edit.lines {
            self.lines = lines;
        }

        Ok(())
    }

    /// Requested quantity per product, aggregated across lines.
    ///
    /// Two lines for the same product must not each pass a sufficiency check
    /// against the same units, so checks always compare the aggregate.
    pub fn required_quantities(&self) -> BTreeMap<ProductId, i64> {
        let mut required = BTreeMap::new();
        for line in &self.lines {
            *required.entry(line.product).or_insert(0) += line.quantity;
        }
        required
    }

    /// Evaluate sufficiency against an availability snapshot read by the
    /// caller inside its atomic section. Receipts are always sufficient.
    pub fn evaluate_sufficiency<F>(&self, available: F) -> Sufficiency
    where
        F: Fn(ProductId) -> i64,
    {
        if !self.kind.requires_available_stock() {
            return Sufficiency::Sufficient;
        }

        let mut shortfalls = Vec::new();
        for (product, requested) in self.required_quantities() {
            let on_hand = available(product);
            if on_hand < requested {
                shortfalls.push(Shortfall {
                    product,
                    requested,
                    available: on_hand,
                });
            }
        }

        if shortfalls.is_empty() {
            Sufficiency::Sufficient
        } else {
            Sufficiency::Short(shortfalls)
        }
    }

    /// "To DO": leave Draft for Ready or Waiting depending on sufficiency.
    /// No ledger effect.
    pub fn mark_to_do(&mut self, sufficiency: &Sufficiency) -> DomainResult<OperationStatus> {
        if self.status != OperationStatus::Draft {
            return Err(DomainError::invalid_transition(format!(
                "to-do requires a draft operation, found {}",
                self.status.as_str()
            )));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation(
                "cannot release an operation without lines",
            ));
        }

        self.status = if sufficiency.is_sufficient() {
            OperationStatus::Ready
        } else {
            OperationStatus::Waiting
        };
        Ok(self.status)
    }

    /// "Recheck Stock": re-run the sufficiency test from Waiting.
    pub fn recheck(&mut self, sufficiency: &Sufficiency) -> DomainResult<OperationStatus> {
        if self.status != OperationStatus::Waiting {
            return Err(DomainError::invalid_transition(format!(
                "recheck requires a waiting operation, found {}",
                self.status.as_str()
            )));
        }

        if sufficiency.is_sufficient() {
            self.status = OperationStatus::Ready;
        }
        Ok(self.status)
    }

    /// Stock changed between Ready and the validate-time re-verification;
    /// fall back to Waiting instead of partially applying.
    pub fn demote_to_waiting(&mut self) -> DomainResult<OperationStatus> {
        if self.status != OperationStatus::Ready {
            return Err(DomainError::invalid_transition(format!(
                "demotion requires a ready operation, found {}",
                self.status.as_str()
            )));
        }
        self.status = OperationStatus::Waiting;
        Ok(self.status)
    }

    /// Finalize after the operation's moves were committed to the ledger.
    pub fn complete(&mut self) -> DomainResult<OperationStatus> {
        if self.status != OperationStatus::Ready {
            return Err(DomainError::invalid_transition(format!(
                "validate requires a ready operation, found {}",
                self.status.as_str()
            )));
        }
        self.status = OperationStatus::Done;
        Ok(self.status)
    }

    /// Cancel the document. Allowed from any non-Done state, idempotent on an
    /// already-cancelled document, never touches the ledger. A Done operation
    /// is reversed with a corrective adjustment, not by un-committing history.
    pub fn cancel(&mut self) -> DomainResult<OperationStatus> {
        if self.status == OperationStatus::Done {
            return Err(DomainError::invalid_transition(
                "cannot cancel a done operation, reverse it with an adjustment",
            ));
        }
        self.status = OperationStatus::Cancelled;
        Ok(self.status)
    }
}

fn validate_lines(lines: &[OperationLine]) -> DomainResult<()> {
    for line in lines {
        if line.quantity <= 0 {
            return Err(DomainError::validation("line quantity must be positive"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    fn draft(kind: OperationKind, lines: Vec<OperationLine>) -> Operation {
        Operation::create(
            OperationId::new(),
            "WH/00001".to_string(),
            OperationDraft {
                kind,
                contact: "IKEA Supply Co.".to_string(),
                scheduled_date: test_date(),
                endpoint: StockEndpoint::Warehouse(WarehouseId::new()),
                responsible: "mitchell".to_string(),
                source_doc: None,
                delivery_address: None,
                lines,
            },
        )
        .unwrap()
    }

    fn line(product: ProductId, quantity: i64) -> OperationLine {
        OperationLine { product, quantity }
    }

    #[test]
    fn create_starts_in_draft() {
        let op = draft(OperationKind::Receipt, vec![line(ProductId::new(), 5)]);
        assert_eq!(op.status(), OperationStatus::Draft);
        assert!(op.is_editable());
    }

    #[test]
    fn create_rejects_non_positive_line_quantity() {
        let err = Operation::create(
            OperationId::new(),
            "WH/00001".to_string(),
            OperationDraft {
                kind: OperationKind::Receipt,
                contact: "IKEA Supply Co.".to_string(),
                scheduled_date: test_date(),
                endpoint: StockEndpoint::Warehouse(WarehouseId::new()),
                responsible: "mitchell".to_string(),
                source_doc: None,
                delivery_address: None,
                lines: vec![line(ProductId::new(), 0)],
            },
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn edits_are_draft_only() {
        let mut op = draft(OperationKind::Receipt, vec![line(ProductId::new(), 5)]);
        op.apply_edit(DraftEdit {
            contact: Some("New Vendor".to_string()),
            source_doc: Some("PO001".to_string()),
            ..DraftEdit::default()
        })
        .unwrap();
        assert_eq!(op.contact(), "New Vendor");
        assert_eq!(op.source_doc(), Some("PO001"));

        op.mark_to_do(&Sufficiency::Sufficient).unwrap();
        let err = op
            .apply_edit(DraftEdit {
                contact: Some("Other".to_string()),
                ..DraftEdit::default()
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn receipt_is_always_sufficient() {
        let op = draft(OperationKind::Receipt, vec![line(ProductId::new(), 500)]);
        let sufficiency = op.evaluate_sufficiency(|_| 0);
        assert!(sufficiency.is_sufficient());
    }

    #[test]
    fn delivery_sufficiency_aggregates_duplicate_product_lines() {
        let product = ProductId::new();
        let op = draft(
            OperationKind::Delivery,
            vec![line(product, 3), line(product, 4)],
        );

        // 5 on hand covers each line alone but not both together.
        let sufficiency = op.evaluate_sufficiency(|_| 5);
        let shortfalls = sufficiency.shortfalls();
        assert_eq!(shortfalls.len(), 1);
        assert_eq!(shortfalls[0].requested, 7);
        assert_eq!(shortfalls[0].available, 5);
    }

    #[test]
    fn to_do_routes_to_ready_or_waiting() {
        let product = ProductId::new();
        let stock: HashMap<ProductId, i64> = [(product, 4)].into();

        let mut short = draft(OperationKind::Delivery, vec![line(product, 10)]);
        let sufficiency = short.evaluate_sufficiency(|p| stock.get(&p).copied().unwrap_or(0));
        assert_eq!(short.mark_to_do(&sufficiency).unwrap(), OperationStatus::Waiting);

        let mut covered = draft(OperationKind::Delivery, vec![line(product, 3)]);
        let sufficiency = covered.evaluate_sufficiency(|p| stock.get(&p).copied().unwrap_or(0));
        assert_eq!(covered.mark_to_do(&sufficiency).unwrap(), OperationStatus::Ready);
    }

    #[test]
    fn to_do_requires_lines() {
        let mut op = draft(OperationKind::Receipt, vec![]);
        let err = op.mark_to_do(&Sufficiency::Sufficient).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(op.status(), OperationStatus::Draft);
    }

    #[test]
    fn recheck_moves_waiting_to_ready_only_when_covered() {
        let product = ProductId::new();
        let mut op = draft(OperationKind::Delivery, vec![line(product, 10)]);
        op.mark_to_do(&op.clone().evaluate_sufficiency(|_| 4)).unwrap();
        assert_eq!(op.status(), OperationStatus::Waiting);

        let still_short = op.evaluate_sufficiency(|_| 6);
        assert_eq!(op.recheck(&still_short).unwrap(), OperationStatus::Waiting);

        let covered = op.evaluate_sufficiency(|_| 12);
        assert_eq!(op.recheck(&covered).unwrap(), OperationStatus::Ready);
    }

    #[test]
    fn complete_requires_ready() {
        let mut op = draft(OperationKind::Receipt, vec![line(ProductId::new(), 5)]);
        assert!(matches!(
            op.complete().unwrap_err(),
            DomainError::InvalidTransition(_)
        ));

        op.mark_to_do(&Sufficiency::Sufficient).unwrap();
        assert_eq!(op.complete().unwrap(), OperationStatus::Done);
    }

    #[test]
    fn demotion_falls_back_to_waiting() {
        let mut op = draft(OperationKind::Delivery, vec![line(ProductId::new(), 2)]);
        op.mark_to_do(&Sufficiency::Sufficient).unwrap();
        assert_eq!(op.demote_to_waiting().unwrap(), OperationStatus::Waiting);
    }

    #[test]
    fn cancel_is_blocked_only_after_done() {
        let mut op = draft(OperationKind::Receipt, vec![line(ProductId::new(), 5)]);
        op.mark_to_do(&Sufficiency::Sufficient).unwrap();
        op.complete().unwrap();
        assert!(matches!(
            op.cancel().unwrap_err(),
            DomainError::InvalidTransition(_)
        ));

        let mut waiting = draft(OperationKind::Delivery, vec![line(ProductId::new(), 5)]);
        waiting
            .mark_to_do(&Sufficiency::Short(vec![]))
            .unwrap();
        assert_eq!(waiting.cancel().unwrap(), OperationStatus::Cancelled);
        // Idempotent on an already-cancelled document.
        assert_eq!(waiting.cancel().unwrap(), OperationStatus::Cancelled);
    }
}
