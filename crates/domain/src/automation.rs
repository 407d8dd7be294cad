use std::str::FromStr;

use belegwerk_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Mutation verbs that automation prompts must never carry.
///
/// The scan is a plain case-insensitive substring match; automation is
/// advisory only and refuses to run for any text that even hints at a write.
const MUTATION_VERBS: [&str; 12] = [
    "apply", "update", "change", "delete", "remove", "create", "edit", "execute", "trigger",
    "write", "save", "submit",
];

/// Kinds of findings the detectors can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Two invoices share number, amount, and client.
    DuplicateInvoice,
    /// A bank transaction has no matching invoice payment.
    UnmatchedBankTransaction,
    /// Open invoices outweigh the bank balance.
    CashFlowRisk,
}

impl FindingKind {
    /// Returns a stable storage value for this finding kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateInvoice => "duplicate_invoice",
            Self::UnmatchedBankTransaction => "unmatched_bank_transaction",
            Self::CashFlowRisk => "cash_flow_risk",
        }
    }
}

impl FromStr for FindingKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "duplicate_invoice" => Ok(Self::DuplicateInvoice),
            "unmatched_bank_transaction" => Ok(Self::UnmatchedBankTransaction),
            "cash_flow_risk" => Ok(Self::CashFlowRisk),
            _ => Err(AppError::Validation(format!(
                "unknown finding kind '{value}'"
            ))),
        }
    }
}

/// Severity of a finding or insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational.
    Low,
    /// Worth reviewing soon.
    Medium,
    /// Needs prompt attention.
    High,
}

impl Severity {
    /// Returns a stable storage value for this severity.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for Severity {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(AppError::Validation(format!("unknown severity '{value}'"))),
        }
    }
}

/// A single piece of supporting evidence, free of personal data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRef {
    /// Identifier of the referenced record.
    pub id: String,
    /// Type label of the referenced record.
    pub entity_type: String,
    /// Short neutral summary of why the record is evidence.
    pub summary: String,
}

/// A domain entity a finding relates to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedEntity {
    /// Type label of the related entity.
    pub entity_type: String,
    /// Identifier of the related entity.
    pub entity_id: String,
}

/// Raw detector output before it is shaped into a user-facing suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Kind of the finding.
    pub kind: FindingKind,
    /// Severity of the finding.
    pub severity: Severity,
    /// Detector confidence in the range 0..=1.
    pub confidence: f64,
    /// Short title for display.
    pub title: String,
    /// Explanation of what was detected and why.
    pub explanation: String,
    /// Supporting evidence, free of personal data.
    pub evidence: Vec<EvidenceRef>,
    /// Entities the finding relates to.
    pub related_entities: Vec<RelatedEntity>,
}

/// User-facing, contract-validated, advisory-only suggestion.
///
/// Every suggestion requires human approval; no code path may emit one that
/// does not pass [`validate_automation_suggestion`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Unique suggestion identifier.
    pub id: String,
    /// Kind of the underlying finding.
    pub kind: FindingKind,
    /// Severity of the underlying finding.
    pub severity: Severity,
    /// Detector confidence in the range 0..=1.
    pub confidence: f64,
    /// Short title for display.
    pub title: String,
    /// Explanation of what was detected and why.
    pub explanation: String,
    /// Supporting evidence, free of personal data.
    pub evidence: Vec<EvidenceRef>,
    /// Entities the suggestion relates to.
    pub related_entities: Vec<RelatedEntity>,
    /// Advisory text only; nothing is ever applied automatically.
    pub recommended_next_step: String,
    /// Always true; validated, never trusted implicitly.
    pub requires_human_approval: bool,
}

/// Refuses any automation run whose originating request could mutate state.
///
/// Only an absent method or a literal GET (any casing) passes.
pub fn assert_read_only_context(method: Option<&str>) -> AppResult<()> {
    let Some(method) = method else {
        return Ok(());
    };

    if method.trim().to_ascii_uppercase() == "GET" {
        return Ok(());
    }

    Err(AppError::Validation(format!(
        "automation requires a read-only context; refusing method '{method}'"
    )))
}

/// Refuses prompt text that carries any mutation verb.
///
/// Absent or empty text passes; the first matching verb is named in the
/// error so the rejection can be audited without echoing the prompt.
pub fn assert_no_mutation_intent(prompt: Option<&str>) -> AppResult<()> {
    let Some(prompt) = prompt else {
        return Ok(());
    };

    let lowered = prompt.to_lowercase();
    for verb in MUTATION_VERBS {
        if lowered.contains(verb) {
            return Err(AppError::Validation(format!(
                "prompt text carries mutation verb '{verb}'"
            )));
        }
    }

    Ok(())
}

/// Asserts that a suggestion satisfies the explainability contract.
pub fn assert_suggestion_valid(suggestion: &Suggestion) -> AppResult<()> {
    validate_automation_suggestion(suggestion)
}

/// Validates the suggestion contract, naming the first offending field.
pub fn validate_automation_suggestion(suggestion: &Suggestion) -> AppResult<()> {
    require_filled("id", &suggestion.id)?;
    require_filled("title", &suggestion.title)?;
    require_filled("explanation", &suggestion.explanation)?;
    require_filled("recommended_next_step", &suggestion.recommended_next_step)?;

    if !(0.0..=1.0).contains(&suggestion.confidence) {
        return Err(AppError::Validation(
            "suggestion field 'confidence' must be within 0 and 1".to_owned(),
        ));
    }

    if suggestion.evidence.is_empty() {
        return Err(AppError::Validation(
            "suggestion field 'evidence' must not be empty".to_owned(),
        ));
    }

    if suggestion.related_entities.is_empty() {
        return Err(AppError::Validation(
            "suggestion field 'related_entities' must not be empty".to_owned(),
        ));
    }

    if !suggestion.requires_human_approval {
        return Err(AppError::Validation(
            "suggestion must require human approval".to_owned(),
        ));
    }

    Ok(())
}

fn require_filled(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!(
            "suggestion field '{field}' must not be blank"
        )));
    }

    Ok(())
}

/// Shapes a finding into a user-facing suggestion.
///
/// Fields map one to one; the next step is a fixed advisory sentence
/// referencing the finding kind, and human approval is always required.
#[must_use]
pub fn build_suggestion_from_finding(finding: Finding) -> Suggestion {
    let recommended_next_step = format!(
        "Review this {} suggestion and record an accept or reject decision; \
         nothing is applied without your approval.",
        finding.kind.as_str()
    );

    Suggestion {
        id: Uuid::new_v4().to_string(),
        kind: finding.kind,
        severity: finding.severity,
        confidence: finding.confidence,
        title: finding.title,
        explanation: finding.explanation,
        evidence: finding.evidence,
        related_entities: finding.related_entities,
        recommended_next_step,
        requires_human_approval: true,
    }
}
