use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use belegwerk_core::{AppResult, CompanyId};
use belegwerk_domain::{
    AuditAction, AuditDraft, AuditRecord, SystemContext, assert_system_context, verify_chain,
};

use crate::Clock;

/// The audit-relevant facts of one action, supplied by the calling use-case.
///
/// The surrounding [`SystemContext`] carries actor, scope, status, and
/// reason; this input carries what was acted upon.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEventInput {
    /// Action the entry describes.
    pub action: AuditAction,
    /// Type label of the acted-upon resource.
    pub resource_type: String,
    /// Identifier of the acted-upon resource.
    pub resource_id: String,
    /// State snapshot before the change, if any.
    pub old_values: Option<Value>,
    /// State snapshot after the change; may embed AI output and rationale.
    pub new_values: Option<Value>,
}

/// Query parameters for audit log listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogQuery {
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
    /// Optional action filter, matched against the stable storage value.
    pub action: Option<String>,
}

/// Port for the append-only, hash-chained audit store.
///
/// There is deliberately no update or delete operation. Implementations must
/// serialize appends per chain: the read of the current tail and the insert
/// of the sealed entry must never interleave between two writers.
#[async_trait]
pub trait AuditChainRepository: Send + Sync {
    /// Seals the draft against the current chain tail and persists it.
    async fn append(&self, draft: AuditDraft) -> AppResult<AuditRecord>;

    /// Returns the full chain for a company in creation order.
    async fn list_chain(&self, company_id: Option<CompanyId>) -> AppResult<Vec<AuditRecord>>;

    /// Returns the most recent entries for administrative views.
    async fn list_recent(
        &self,
        company_id: Option<CompanyId>,
        query: AuditLogQuery,
    ) -> AppResult<Vec<AuditRecord>>;
}

/// Application service in front of the hash-chained audit log.
#[derive(Clone)]
pub struct AuditLogService {
    repository: Arc<dyn AuditChainRepository>,
    clock: Arc<dyn Clock>,
}

impl AuditLogService {
    /// Creates a new service from a chain repository and a clock.
    #[must_use]
    pub fn new(repository: Arc<dyn AuditChainRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Validates the context and appends one chained audit entry.
    ///
    /// Context validation failures abort the append; callers must propagate
    /// them rather than log around them.
    pub async fn record(
        &self,
        context: &SystemContext,
        event: AuditEventInput,
    ) -> AppResult<AuditRecord> {
        assert_system_context(context)?;

        let draft = AuditDraft {
            action: event.action,
            resource_type: event.resource_type,
            resource_id: event.resource_id,
            actor: context.actor.clone(),
            company_id: context.company_id,
            old_values: event.old_values,
            new_values: event.new_values,
            reason: context.reason.clone(),
            recorded_at: self.clock.now(),
        };

        self.repository.append(draft).await
    }

    /// Verifies the stored chain for a company end to end.
    ///
    /// Operational tooling calls this after backups and restores; the result
    /// is never shown to end users.
    pub async fn validate_chain(&self, company_id: Option<CompanyId>) -> AppResult<bool> {
        let records = self.repository.list_chain(company_id).await?;
        Ok(verify_chain(&records).is_valid())
    }

    /// Returns the most recent entries for administrative views.
    pub async fn list_recent(
        &self,
        company_id: Option<CompanyId>,
        query: AuditLogQuery,
    ) -> AppResult<Vec<AuditRecord>> {
        self.repository.list_recent(company_id, query).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use tokio::sync::Mutex;

    use belegwerk_core::{Actor, AppError, AppResult, CompanyId, UserId};
    use belegwerk_domain::{
        AuditAction, AuditDraft, AuditRecord, EventClass, EventStatus, ScopeType, SystemContext,
    };

    use crate::Clock;

    use super::{AuditChainRepository, AuditEventInput, AuditLogQuery, AuditLogService};

    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0)
                .single()
                .unwrap_or_default()
        }
    }

    #[derive(Default)]
    struct FakeAuditChainRepository {
        records: Mutex<Vec<AuditRecord>>,
    }

    #[async_trait]
    impl AuditChainRepository for FakeAuditChainRepository {
        async fn append(&self, draft: AuditDraft) -> AppResult<AuditRecord> {
            let mut records = self.records.lock().await;
            let previous_hash = records.last().map(|record| record.hash.clone());
            let record = draft.seal(previous_hash);
            records.push(record.clone());
            Ok(record)
        }

        async fn list_chain(
            &self,
            _company_id: Option<CompanyId>,
        ) -> AppResult<Vec<AuditRecord>> {
            Ok(self.records.lock().await.clone())
        }

        async fn list_recent(
            &self,
            _company_id: Option<CompanyId>,
            query: AuditLogQuery,
        ) -> AppResult<Vec<AuditRecord>> {
            let records = self.records.lock().await;
            Ok(records.iter().rev().take(query.limit).cloned().collect())
        }
    }

    fn context(company_id: CompanyId) -> SystemContext {
        SystemContext {
            actor: Actor::user(UserId::new()),
            scope: ScopeType::Company,
            company_id: Some(company_id),
            event_class: EventClass::Accounting,
            status: EventStatus::Success,
            reason: "invoice created".to_owned(),
            request_id: Some("req-1".to_owned()),
            ip_address: None,
            user_agent: None,
        }
    }

    fn event(resource_id: &str) -> AuditEventInput {
        AuditEventInput {
            action: AuditAction::Create,
            resource_type: "invoice".to_owned(),
            resource_id: resource_id.to_owned(),
            old_values: None,
            new_values: None,
        }
    }

    fn service(repository: Arc<FakeAuditChainRepository>) -> AuditLogService {
        AuditLogService::new(repository, Arc::new(FixedClock))
    }

    #[tokio::test]
    async fn recorded_entries_form_a_valid_chain() {
        let repository = Arc::new(FakeAuditChainRepository::default());
        let service = service(repository.clone());
        let company_id = CompanyId::new();
        let context = context(company_id);

        for index in 0..4 {
            let result = service
                .record(&context, event(&format!("inv-{index}")))
                .await;
            assert!(result.is_ok());
        }

        let valid = service.validate_chain(Some(company_id)).await;
        assert!(matches!(valid, Ok(true)));
    }

    #[tokio::test]
    async fn first_entry_has_no_predecessor() {
        let repository = Arc::new(FakeAuditChainRepository::default());
        let service = service(repository.clone());
        let company_id = CompanyId::new();

        let record = service.record(&context(company_id), event("inv-1")).await;

        assert!(matches!(record, Ok(record) if record.previous_hash.is_none()));
    }

    #[tokio::test]
    async fn invalid_context_aborts_the_append() {
        let repository = Arc::new(FakeAuditChainRepository::default());
        let service = service(repository.clone());
        let company_id = CompanyId::new();
        let mut context = context(company_id);
        context.company_id = None;

        let result = service.record(&context, event("inv-1")).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(repository.records.lock().await.is_empty());
    }

    #[tokio::test]
    async fn tampered_store_fails_chain_validation() {
        let repository = Arc::new(FakeAuditChainRepository::default());
        let service = service(repository.clone());
        let company_id = CompanyId::new();
        let context = context(company_id);

        for index in 0..3 {
            let result = service
                .record(&context, event(&format!("inv-{index}")))
                .await;
            assert!(result.is_ok());
        }
        repository.records.lock().await[1].resource_id = "inv-forged".to_owned();

        let valid = service.validate_chain(Some(company_id)).await;
        assert!(matches!(valid, Ok(false)));
    }
}
