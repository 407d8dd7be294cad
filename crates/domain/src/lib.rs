//! Domain entities and invariants for the audit and AI-governance core.

#![forbid(unsafe_code)]

mod audit;
mod automation;
mod context;
mod detectors;
mod insight;

pub use audit::{AuditAction, AuditDraft, AuditRecord, ChainVerification, verify_chain};
pub use automation::{
    EvidenceRef, Finding, FindingKind, RelatedEntity, Severity, Suggestion,
    assert_no_mutation_intent, assert_read_only_context, assert_suggestion_valid,
    build_suggestion_from_finding, validate_automation_suggestion,
};
pub use context::{EventClass, EventStatus, ScopeType, SystemContext, assert_system_context};
pub use detectors::{
    BankTransactionSnapshot, CompanySnapshot, InvoiceSnapshot, InvoiceStatus, PaymentSnapshot,
    detect_cash_flow_risk, detect_duplicate_invoices, detect_unmatched_bank_transactions,
    run_detectors,
};
pub use insight::{AiInsight, DecisionActor, DecisionKind, InsightDecision, UserRole};
