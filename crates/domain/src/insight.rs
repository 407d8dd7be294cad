use std::str::FromStr;

use belegwerk_core::{AppError, AppResult, CompanyId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::audit::AuditAction;
use crate::automation::{FindingKind, Severity};

/// Role of a user within a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Read-only access; may never decide on insights.
    Viewer,
    /// Day-to-day bookkeeping; may accept and reject insights.
    Accountant,
    /// Full control; additionally may override insights.
    Admin,
}

impl UserRole {
    /// Returns a stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Accountant => "accountant",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for UserRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "viewer" => Ok(Self::Viewer),
            "accountant" => Ok(Self::Accountant),
            "admin" => Ok(Self::Admin),
            _ => Err(AppError::Validation(format!("unknown user role '{value}'"))),
        }
    }
}

/// The user submitting a decision on an insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionActor {
    /// Identifier of the deciding user.
    pub user_id: UserId,
    /// Role of the deciding user within the company.
    pub role: UserRole,
}

/// Human verdict on an AI insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// The suggestion is correct and will be acted on manually.
    Accepted,
    /// The suggestion is wrong or unwanted.
    Rejected,
    /// An admin supersedes the suggestion with their own judgement.
    Overridden,
}

impl DecisionKind {
    /// Returns a stable storage value for this decision.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Overridden => "overridden",
        }
    }

    /// Parses a transport value into a decision kind.
    pub fn from_transport(value: &str) -> AppResult<Self> {
        Self::from_str(value)
    }

    /// Returns true when this decision must carry a reason.
    #[must_use]
    pub fn requires_reason(&self) -> bool {
        matches!(self, Self::Rejected | Self::Overridden)
    }

    /// Returns the audit action recorded for this decision.
    #[must_use]
    pub fn audit_action(&self) -> AuditAction {
        match self {
            Self::Accepted => AuditAction::UserAccepted,
            Self::Rejected => AuditAction::UserRejected,
            Self::Overridden => AuditAction::UserOverridden,
        }
    }
}

impl FromStr for DecisionKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "overridden" => Ok(Self::Overridden),
            _ => Err(AppError::Validation(format!(
                "unknown decision value '{value}'"
            ))),
        }
    }
}

/// Persisted, explainable AI suggestion awaiting human review.
///
/// Insights are never mutated after creation; decisions attach to them as
/// separate append-only rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiInsight {
    /// Unique insight identifier.
    pub id: Uuid,
    /// Company the insight belongs to.
    pub company_id: CompanyId,
    /// Type label of the entity the insight is about.
    pub entity_type: String,
    /// Identifier of the entity the insight is about.
    pub entity_id: String,
    /// Kind of the underlying finding.
    pub kind: FindingKind,
    /// Severity of the underlying finding.
    pub severity: Severity,
    /// Detector confidence in the range 0..=1.
    pub confidence: f64,
    /// Short display summary.
    pub summary: String,
    /// Rationale: why the detector flagged this.
    pub why: String,
    /// Legal framing shown alongside the insight.
    pub legal_context: String,
    /// Structured evidence, free of personal data.
    pub evidence: Value,
    /// Identifier of the rule that produced the insight.
    pub rule_id: String,
    /// Version tag of the producing model or rule set.
    pub model_version: String,
    /// Feature flag the insight was produced under.
    pub feature_flag: String,
    /// Advisory-only disclaimer shown to the user.
    pub disclaimer: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Persisted human decision on an insight.
///
/// Decisions accumulate per insight; the latest one is authoritative for
/// display while the full history stays retained for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightDecision {
    /// Unique decision identifier.
    pub id: Uuid,
    /// Insight the decision belongs to.
    pub insight_id: Uuid,
    /// Company scope of the decision.
    pub company_id: CompanyId,
    /// User who made the decision.
    pub actor_user_id: UserId,
    /// The verdict.
    pub decision: DecisionKind,
    /// Reason; required for rejections and overrides.
    pub reason: Option<String>,
    /// Timestamp of the decision.
    pub decided_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use belegwerk_core::AppError;

    use super::{DecisionKind, UserRole};

    #[test]
    fn decision_roundtrip_storage_value() {
        let decision = DecisionKind::Overridden;
        let restored = DecisionKind::from_transport(decision.as_str());
        assert!(restored.is_ok());
        assert_eq!(restored.unwrap_or(DecisionKind::Accepted), decision);
    }

    #[test]
    fn unknown_decision_is_rejected() {
        let parsed = DecisionKind::from_transport("approved");
        assert!(matches!(parsed, Err(AppError::Validation(_))));
    }

    #[test]
    fn rejections_and_overrides_require_a_reason() {
        assert!(!DecisionKind::Accepted.requires_reason());
        assert!(DecisionKind::Rejected.requires_reason());
        assert!(DecisionKind::Overridden.requires_reason());
    }

    #[test]
    fn unknown_role_is_rejected() {
        let parsed = UserRole::from_str("owner");
        assert!(parsed.is_err());
    }
}
