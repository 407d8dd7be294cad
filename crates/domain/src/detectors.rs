use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::automation::{EvidenceRef, Finding, FindingKind, RelatedEntity, Severity};

/// Payment status of an invoice snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Not yet sent.
    Draft,
    /// Sent and awaiting payment.
    Sent,
    /// Fully paid.
    Paid,
    /// Past its due date.
    Overdue,
}

impl InvoiceStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
        }
    }
}

/// Read-only invoice projection handed to the detectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSnapshot {
    /// Invoice record identifier.
    pub id: String,
    /// Sequential invoice number as printed on the document.
    pub invoice_number: String,
    /// Gross amount in integer cents.
    pub amount_cents: i64,
    /// Billed client name.
    pub client_name: String,
    /// Payment status.
    pub status: InvoiceStatus,
}

/// Read-only bank transaction projection handed to the detectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransactionSnapshot {
    /// Transaction record identifier.
    pub id: String,
    /// Amount in integer cents; negative for outgoing.
    pub amount_cents: i64,
}

/// Read-only invoice payment projection handed to the detectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSnapshot {
    /// Paid invoice record identifier.
    pub invoice_id: String,
    /// Matched bank transaction, when reconciled.
    pub bank_transaction_id: Option<String>,
}

/// Pre-fetched, immutable company data the detectors inspect.
///
/// Detectors never touch storage themselves; whoever assembles the snapshot
/// decides which records automation is allowed to see (purpose limitation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanySnapshot {
    /// Invoices in scope for the run.
    pub invoices: Vec<InvoiceSnapshot>,
    /// Bank transactions in scope for the run.
    pub bank_transactions: Vec<BankTransactionSnapshot>,
    /// Invoice payments in scope for the run.
    pub invoice_payments: Vec<PaymentSnapshot>,
    /// Current bank balance in integer cents.
    pub bank_balance_cents: i64,
}

/// Runs every detector over the snapshot and collects the findings.
///
/// Detectors are pure and deterministic: no clock, no randomness, no I/O.
/// Their relative order carries no meaning.
#[must_use]
pub fn run_detectors(snapshot: &CompanySnapshot) -> Vec<Finding> {
    let mut findings = detect_duplicate_invoices(&snapshot.invoices);
    findings.extend(detect_unmatched_bank_transactions(
        &snapshot.bank_transactions,
        &snapshot.invoice_payments,
    ));
    findings.extend(detect_cash_flow_risk(
        &snapshot.invoices,
        snapshot.bank_balance_cents,
    ));
    findings
}

/// Flags invoices that share number, amount, and client.
///
/// The first occurrence of a key is the reference; every later occurrence
/// yields one finding against it, so three identical invoices yield two
/// findings.
#[must_use]
pub fn detect_duplicate_invoices(invoices: &[InvoiceSnapshot]) -> Vec<Finding> {
    let mut first_seen: HashMap<(&str, i64, &str), &InvoiceSnapshot> = HashMap::new();
    let mut findings = Vec::new();

    for invoice in invoices {
        let key = (
            invoice.invoice_number.as_str(),
            invoice.amount_cents,
            invoice.client_name.as_str(),
        );

        let Some(original) = first_seen.get(&key) else {
            first_seen.insert(key, invoice);
            continue;
        };

        findings.push(Finding {
            kind: FindingKind::DuplicateInvoice,
            severity: Severity::Medium,
            confidence: 0.87,
            title: format!("Possible duplicate invoice {}", invoice.invoice_number),
            explanation: format!(
                "Invoice '{}' matches invoice '{}' on number '{}', amount, and client.",
                invoice.id, original.id, invoice.invoice_number
            ),
            evidence: vec![
                EvidenceRef {
                    id: original.id.clone(),
                    entity_type: "invoice".to_owned(),
                    summary: "first occurrence of the matching invoice".to_owned(),
                },
                EvidenceRef {
                    id: invoice.id.clone(),
                    entity_type: "invoice".to_owned(),
                    summary: "later invoice with identical number, amount, and client".to_owned(),
                },
            ],
            related_entities: vec![
                RelatedEntity {
                    entity_type: "invoice".to_owned(),
                    entity_id: original.id.clone(),
                },
                RelatedEntity {
                    entity_type: "invoice".to_owned(),
                    entity_id: invoice.id.clone(),
                },
            ],
        });
    }

    findings
}

/// Flags bank transactions that no invoice payment references.
#[must_use]
pub fn detect_unmatched_bank_transactions(
    transactions: &[BankTransactionSnapshot],
    payments: &[PaymentSnapshot],
) -> Vec<Finding> {
    let matched: HashSet<&str> = payments
        .iter()
        .filter_map(|payment| payment.bank_transaction_id.as_deref())
        .collect();

    transactions
        .iter()
        .filter(|transaction| !matched.contains(transaction.id.as_str()))
        .map(|transaction| Finding {
            kind: FindingKind::UnmatchedBankTransaction,
            severity: Severity::Medium,
            confidence: 0.8,
            title: format!("Unmatched bank transaction {}", transaction.id),
            explanation: format!(
                "Bank transaction '{}' is not referenced by any invoice payment.",
                transaction.id
            ),
            evidence: vec![EvidenceRef {
                id: transaction.id.clone(),
                entity_type: "bank_transaction".to_owned(),
                summary: "transaction without a matching invoice payment".to_owned(),
            }],
            related_entities: vec![RelatedEntity {
                entity_type: "bank_transaction".to_owned(),
                entity_id: transaction.id.clone(),
            }],
        })
        .collect()
}

/// Flags companies whose open invoices outweigh the bank balance.
///
/// Sums the amounts of all unpaid invoices. A zero sum yields no finding;
/// otherwise the severity is high when the sum exceeds the balance, medium
/// when it exceeds half of it, and low below that, with confidence
/// 0.95/0.8/0.6 respectively. Up to three unpaid invoices become evidence.
#[must_use]
pub fn detect_cash_flow_risk(
    invoices: &[InvoiceSnapshot],
    bank_balance_cents: i64,
) -> Vec<Finding> {
    let unpaid: Vec<&InvoiceSnapshot> = invoices
        .iter()
        .filter(|invoice| invoice.status != InvoiceStatus::Paid)
        .collect();
    let open_cents: i64 = unpaid.iter().map(|invoice| invoice.amount_cents).sum();

    if open_cents == 0 {
        return Vec::new();
    }

    // Comparisons stay in integer cents; doubling avoids a lossy halving.
    let (severity, confidence) = if open_cents > bank_balance_cents {
        (Severity::High, 0.95)
    } else if open_cents * 2 > bank_balance_cents {
        (Severity::Medium, 0.8)
    } else {
        (Severity::Low, 0.6)
    };

    let evidence: Vec<EvidenceRef> = unpaid
        .iter()
        .take(3)
        .map(|invoice| EvidenceRef {
            id: invoice.id.clone(),
            entity_type: "invoice".to_owned(),
            summary: format!("unpaid invoice {}", invoice.invoice_number),
        })
        .collect();
    let related_entities: Vec<RelatedEntity> = unpaid
        .iter()
        .take(3)
        .map(|invoice| RelatedEntity {
            entity_type: "invoice".to_owned(),
            entity_id: invoice.id.clone(),
        })
        .collect();

    vec![Finding {
        kind: FindingKind::CashFlowRisk,
        severity,
        confidence,
        title: "Open invoices outweigh the bank balance".to_owned(),
        explanation: format!(
            "Unpaid invoices total {open_cents} cents against a balance of \
             {bank_balance_cents} cents."
        ),
        evidence,
        related_entities,
    }]
}
