use std::str::FromStr;

use belegwerk_core::{Actor, AppError, CompanyId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Stable audit actions emitted by application use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A resource was created.
    Create,
    /// A resource was updated.
    Update,
    /// A resource was deleted.
    Delete,
    /// A user logged in.
    Login,
    /// An AI insight was persisted.
    AiSuggest,
    /// An automation run was started.
    AutomationTriggered,
    /// An automation run produced suggestions.
    AutomationProduced,
    /// An automation run was refused by a guard.
    AutomationRejected,
    /// A user accepted an AI insight.
    UserAccepted,
    /// A user rejected an AI insight.
    UserRejected,
    /// An admin overrode an AI insight.
    UserOverridden,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Login => "login",
            Self::AiSuggest => "ai_suggest",
            Self::AutomationTriggered => "automation_triggered",
            Self::AutomationProduced => "automation_produced",
            Self::AutomationRejected => "automation_rejected",
            Self::UserAccepted => "user_accepted",
            Self::UserRejected => "user_rejected",
            Self::UserOverridden => "user_overridden",
        }
    }
}

impl FromStr for AuditAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "login" => Ok(Self::Login),
            "ai_suggest" => Ok(Self::AiSuggest),
            "automation_triggered" => Ok(Self::AutomationTriggered),
            "automation_produced" => Ok(Self::AutomationProduced),
            "automation_rejected" => Ok(Self::AutomationRejected),
            "user_accepted" => Ok(Self::UserAccepted),
            "user_rejected" => Ok(Self::UserRejected),
            "user_overridden" => Ok(Self::UserOverridden),
            _ => Err(AppError::Validation(format!(
                "unknown audit action '{value}'"
            ))),
        }
    }
}

/// Unsealed audit entry, produced by application services.
///
/// A draft has no hash and no position in any chain yet; sealing it against
/// the current chain tail turns it into an immutable [`AuditRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditDraft {
    /// Action the entry describes.
    pub action: AuditAction,
    /// Type label of the acted-upon resource.
    pub resource_type: String,
    /// Identifier of the acted-upon resource.
    pub resource_id: String,
    /// Party responsible for the action.
    pub actor: Actor,
    /// Company chain the entry belongs to, when company scoped.
    pub company_id: Option<CompanyId>,
    /// State snapshot before the change, if any.
    pub old_values: Option<Value>,
    /// State snapshot after the change; may embed AI output and rationale.
    pub new_values: Option<Value>,
    /// Human-readable reason; never blank, carries denial reasons.
    pub reason: String,
    /// Timestamp assigned by the caller's clock.
    pub recorded_at: DateTime<Utc>,
}

impl AuditDraft {
    /// Seals the draft against the current chain tail.
    ///
    /// Computes the content hash over the fixed field order, links the entry
    /// to its predecessor, and marks it immutable. Sealing is pure; the
    /// repository is responsible for reading the tail and inserting the
    /// result under a single-writer guarantee.
    #[must_use]
    pub fn seal(self, previous_hash: Option<String>) -> AuditRecord {
        let hash = chain_digest(&self, previous_hash.as_deref());
        AuditRecord {
            id: Uuid::new_v4(),
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            actor: self.actor,
            company_id: self.company_id,
            old_values: self.old_values,
            new_values: self.new_values,
            reason: self.reason,
            recorded_at: self.recorded_at,
            hash,
            previous_hash,
            immutable: true,
        }
    }
}

/// Sealed, hash-chained audit entry.
///
/// Records are append-only: there is no interface to update or delete one,
/// and any tampering with stored fields is detectable through
/// [`verify_chain`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique entry identifier.
    pub id: Uuid,
    /// Action the entry describes.
    pub action: AuditAction,
    /// Type label of the acted-upon resource.
    pub resource_type: String,
    /// Identifier of the acted-upon resource.
    pub resource_id: String,
    /// Party responsible for the action.
    pub actor: Actor,
    /// Company chain the entry belongs to, when company scoped.
    pub company_id: Option<CompanyId>,
    /// State snapshot before the change, if any.
    pub old_values: Option<Value>,
    /// State snapshot after the change.
    pub new_values: Option<Value>,
    /// Human-readable reason for the entry.
    pub reason: String,
    /// Timestamp of the entry.
    pub recorded_at: DateTime<Utc>,
    /// Hex SHA-256 content fingerprint of this entry.
    pub hash: String,
    /// Hash of the immediately preceding entry in the same chain.
    pub previous_hash: Option<String>,
    /// Always true once sealed; never unset.
    pub immutable: bool,
}

impl AuditRecord {
    /// Recomputes the content hash from the stored fields.
    #[must_use]
    pub fn recompute_hash(&self) -> String {
        let draft = AuditDraft {
            action: self.action,
            resource_type: self.resource_type.clone(),
            resource_id: self.resource_id.clone(),
            actor: self.actor.clone(),
            company_id: self.company_id,
            old_values: self.old_values.clone(),
            new_values: self.new_values.clone(),
            reason: self.reason.clone(),
            recorded_at: self.recorded_at,
        };
        chain_digest(&draft, self.previous_hash.as_deref())
    }
}

/// Computes the hex SHA-256 digest over the fixed chain field order.
///
/// The algorithm is fixed for schema compatibility; there is no per-entry
/// negotiation. The digest commits to the predecessor hash, which is what
/// links entries into a tamper-evident chain.
fn chain_digest(draft: &AuditDraft, previous_hash: Option<&str>) -> String {
    let material = json!([
        draft.action.as_str(),
        draft.resource_type,
        draft.resource_id,
        draft.actor.actor_type().as_str(),
        draft.actor.user_id().map(|user_id| user_id.to_string()),
        draft.actor.model_version(),
        draft.company_id.map(|company_id| company_id.to_string()),
        draft.old_values,
        draft.new_values,
        draft.recorded_at.to_rfc3339(),
        previous_hash,
    ]);

    // json! of an array serializes in element order, so the input is stable.
    let encoded = material.to_string();
    let digest = Sha256::digest(encoded.as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Outcome of verifying a chain of audit records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainVerification {
    /// Every entry verified against its content and predecessor.
    Valid,
    /// Verification failed at the given zero-based position.
    Broken {
        /// Position of the first entry that failed verification.
        position: usize,
        /// What failed at that position.
        detail: String,
    },
}

impl ChainVerification {
    /// Returns true when the whole chain verified.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Verifies a chain of audit records in creation order.
///
/// Recomputes every entry's hash from its stored content and compares it to
/// the stored hash and to the next entry's declared predecessor. Stops at the
/// first mismatch. Operational tooling uses this to verify backups and
/// restores; the result is never user facing.
#[must_use]
pub fn verify_chain(records: &[AuditRecord]) -> ChainVerification {
    for (position, record) in records.iter().enumerate() {
        if !record.immutable {
            return ChainVerification::Broken {
                position,
                detail: "entry lost its immutable flag".to_owned(),
            };
        }

        if record.recompute_hash() != record.hash {
            return ChainVerification::Broken {
                position,
                detail: "stored hash does not match entry content".to_owned(),
            };
        }

        if position == 0 {
            continue;
        }

        let predecessor = &records[position - 1];
        if record.previous_hash.as_deref() != Some(predecessor.hash.as_str()) {
            return ChainVerification::Broken {
                position,
                detail: "previous hash does not match predecessor".to_owned(),
            };
        }
    }

    ChainVerification::Valid
}

#[cfg(test)]
mod tests {
    use belegwerk_core::{Actor, CompanyId, UserId};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::{AuditAction, AuditDraft, verify_chain};

    fn draft(action: AuditAction, resource_id: &str) -> AuditDraft {
        AuditDraft {
            action,
            resource_type: "invoice".to_owned(),
            resource_id: resource_id.to_owned(),
            actor: Actor::user(UserId::new()),
            company_id: Some(CompanyId::new()),
            old_values: None,
            new_values: Some(json!({ "amount_cents": 11900 })),
            reason: "invoice created".to_owned(),
            recorded_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).single().unwrap_or_default(),
        }
    }

    #[test]
    fn sealing_is_deterministic_for_identical_content() {
        let first = draft(AuditAction::Create, "inv-1").seal(None);
        let second = draft(AuditAction::Create, "inv-1").seal(None);
        assert_eq!(first.hash, second.hash);
    }

    #[test]
    fn sealed_record_is_immutable_and_linked() {
        let first = draft(AuditAction::Create, "inv-1").seal(None);
        let second = draft(AuditAction::Update, "inv-1").seal(Some(first.hash.clone()));

        assert!(first.immutable);
        assert_eq!(first.previous_hash, None);
        assert_eq!(second.previous_hash, Some(first.hash.clone()));
        assert_ne!(first.hash, second.hash);
    }

    #[test]
    fn well_formed_chain_verifies() {
        let first = draft(AuditAction::Create, "inv-1").seal(None);
        let second = draft(AuditAction::Update, "inv-1").seal(Some(first.hash.clone()));
        let third = draft(AuditAction::Delete, "inv-1").seal(Some(second.hash.clone()));

        let verification = verify_chain(&[first, second, third]);
        assert!(verification.is_valid());
    }

    #[test]
    fn tampered_content_breaks_verification() {
        let first = draft(AuditAction::Create, "inv-1").seal(None);
        let mut second = draft(AuditAction::Update, "inv-1").seal(Some(first.hash.clone()));
        second.new_values = Some(json!({ "amount_cents": 1 }));

        let verification = verify_chain(&[first, second]);
        assert!(!verification.is_valid());
    }

    #[test]
    fn rewired_previous_hash_breaks_verification() {
        let first = draft(AuditAction::Create, "inv-1").seal(None);
        let second = draft(AuditAction::Update, "inv-1").seal(Some("0".repeat(64)));

        let verification = verify_chain(&[first, second]);
        assert!(!verification.is_valid());
    }
}
