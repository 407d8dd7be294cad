use belegwerk_core::{Actor, ActorType, AppError, AppResult, CompanyId};
use serde::{Deserialize, Serialize};

/// Scope of an audit-relevant event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeType {
    /// Event belongs to a single company.
    Company,
    /// Event affects the platform as a whole.
    Global,
}

impl ScopeType {
    /// Returns a stable storage value for this scope.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Global => "global",
        }
    }
}

/// Classification of an audit-relevant event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventClass {
    /// Bookkeeping-relevant events; always company scoped.
    Accounting,
    /// Authentication and authorization events.
    Security,
    /// Operational platform events.
    Ops,
    /// AI suggestion and decision lifecycle events.
    AiGovernance,
    /// Outbound notification events.
    Notification,
}

impl EventClass {
    /// Returns a stable storage value for this event class.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accounting => "accounting",
            Self::Security => "security",
            Self::Ops => "ops",
            Self::AiGovernance => "ai_governance",
            Self::Notification => "notification",
        }
    }
}

/// Outcome of the action the event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// The action completed.
    Success,
    /// The action was refused.
    Denied,
}

impl EventStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Denied => "denied",
        }
    }
}

/// Validated metadata that every audit-relevant event must carry.
///
/// The context is ephemeral: it is never persisted on its own but is the
/// required input for building an audit record. The traceability fields
/// (`request_id`, `ip_address`, `user_agent`) are allowed to be empty but
/// always travel with the context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemContext {
    /// Party responsible for the event.
    pub actor: Actor,
    /// Scope of the event.
    pub scope: ScopeType,
    /// Company the event belongs to, when company scoped.
    pub company_id: Option<CompanyId>,
    /// Classification of the event.
    pub event_class: EventClass,
    /// Outcome of the described action.
    pub status: EventStatus,
    /// Human-readable reason for the event; never blank.
    pub reason: String,
    /// Correlation id of the originating request, if any.
    pub request_id: Option<String>,
    /// Client address of the originating request, if any.
    pub ip_address: Option<String>,
    /// Client user agent of the originating request, if any.
    pub user_agent: Option<String>,
}

impl SystemContext {
    /// Validates the context invariants, in a fixed order.
    ///
    /// Enum-typed fields are valid by construction; the remaining rules are
    /// checked here and every violation identifies the offending field.
    /// Callers must abort the write on error rather than catch and continue.
    pub fn validate(&self) -> AppResult<()> {
        if self.reason.trim().is_empty() {
            return Err(AppError::Validation(
                "system context reason must not be blank".to_owned(),
            ));
        }

        if self.event_class == EventClass::Accounting {
            if self.scope != ScopeType::Company {
                return Err(AppError::Validation(
                    "accounting events must use company scope".to_owned(),
                ));
            }
            if self.company_id.is_none() {
                return Err(AppError::Validation(
                    "accounting events require a company id".to_owned(),
                ));
            }
        }

        if self.scope == ScopeType::Company && self.company_id.is_none() {
            return Err(AppError::Validation(
                "company-scoped events require a company id".to_owned(),
            ));
        }

        if self.actor.actor_type() == ActorType::User && self.company_id.is_none() {
            return Err(AppError::Validation(
                "user actors require a company id".to_owned(),
            ));
        }

        if self.status == EventStatus::Denied && self.reason.trim().is_empty() {
            return Err(AppError::Validation(
                "denied events require a non-blank reason".to_owned(),
            ));
        }

        Ok(())
    }
}

/// Asserts that a system context satisfies every invariant.
///
/// This is the gate in front of every audit append; a validation failure
/// must abort the write.
pub fn assert_system_context(context: &SystemContext) -> AppResult<()> {
    context.validate()
}
