use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use belegwerk_core::{Actor, AppError, AppResult, CompanyId, UserId};
use belegwerk_domain::{
    AuditAction, CompanySnapshot, EventClass, EventStatus, ScopeType, Suggestion, SystemContext,
    assert_no_mutation_intent, assert_read_only_context, assert_suggestion_valid,
    build_suggestion_from_finding, run_detectors,
};

use crate::audit_service::{AuditEventInput, AuditLogService};

/// Port for assembling the read-only company data a detector run inspects.
///
/// The adapter decides which records automation may see at all; detectors
/// receive nothing beyond this snapshot (purpose limitation).
#[async_trait]
pub trait CompanySnapshotRepository: Send + Sync {
    /// Loads the pre-fetched detector input for one company.
    async fn load_snapshot(&self, company_id: CompanyId) -> AppResult<CompanySnapshot>;
}

/// One inbound request to run the advisory automation pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomationRunRequest {
    /// User who triggered the run.
    pub user_id: UserId,
    /// Company the run is scoped to.
    pub company_id: CompanyId,
    /// HTTP method of the originating request, if it came over HTTP.
    pub method: Option<String>,
    /// Free-text context supplied by the caller, if any.
    pub prompt: Option<String>,
    /// Correlation id of the originating request.
    pub request_id: Option<String>,
}

/// Single entry point combining guard checks, detectors, and audit logging.
///
/// Every run is recorded: triggered on entry, produced on success, rejected
/// with the refusal reason when a guard fires. Nothing in this pipeline
/// mutates domain data.
#[derive(Clone)]
pub struct AutomationService {
    snapshots: Arc<dyn CompanySnapshotRepository>,
    audit: AuditLogService,
}

impl AutomationService {
    /// Creates a new service from a snapshot port and the audit log.
    #[must_use]
    pub fn new(snapshots: Arc<dyn CompanySnapshotRepository>, audit: AuditLogService) -> Self {
        Self { snapshots, audit }
    }

    /// Runs the guards, the detectors, and the suggestion builder.
    ///
    /// Guard order is fixed: read-only context, then mutation intent, then
    /// the suggestion contract on every built suggestion. A failed guard
    /// aborts the run, leaves an `automation_rejected` entry carrying the
    /// error message (never the prompt), and propagates the error.
    pub async fn run_automation(
        &self,
        request: AutomationRunRequest,
    ) -> AppResult<Vec<Suggestion>> {
        let run_id = Uuid::new_v4().to_string();

        self.audit
            .record(
                &self.run_context(&request, EventStatus::Success, "automation run triggered"),
                AuditEventInput {
                    action: AuditAction::AutomationTriggered,
                    resource_type: "automation_run".to_owned(),
                    resource_id: run_id.clone(),
                    old_values: None,
                    new_values: Some(json!({ "request_id": request.request_id })),
                },
            )
            .await?;

        if let Err(error) = Self::run_guards(&request) {
            self.record_rejection(&request, &run_id, &error).await?;
            return Err(error);
        }

        let snapshot = self.snapshots.load_snapshot(request.company_id).await?;
        let suggestions: Vec<Suggestion> = run_detectors(&snapshot)
            .into_iter()
            .map(build_suggestion_from_finding)
            .collect();

        for suggestion in &suggestions {
            if let Err(error) = assert_suggestion_valid(suggestion) {
                self.record_rejection(&request, &run_id, &error).await?;
                return Err(error);
            }
        }

        let kinds: Vec<&str> = suggestions
            .iter()
            .map(|suggestion| suggestion.kind.as_str())
            .collect();
        self.audit
            .record(
                &self.run_context(&request, EventStatus::Success, "automation run produced"),
                AuditEventInput {
                    action: AuditAction::AutomationProduced,
                    resource_type: "automation_run".to_owned(),
                    resource_id: run_id,
                    old_values: None,
                    new_values: Some(json!({
                        "suggestion_count": suggestions.len(),
                        "kinds": kinds,
                    })),
                },
            )
            .await?;

        Ok(suggestions)
    }

    fn run_guards(request: &AutomationRunRequest) -> AppResult<()> {
        assert_read_only_context(request.method.as_deref())?;
        assert_no_mutation_intent(request.prompt.as_deref())
    }

    fn run_context(
        &self,
        request: &AutomationRunRequest,
        status: EventStatus,
        reason: &str,
    ) -> SystemContext {
        SystemContext {
            actor: Actor::user(request.user_id),
            scope: ScopeType::Company,
            company_id: Some(request.company_id),
            event_class: EventClass::AiGovernance,
            status,
            reason: reason.to_owned(),
            request_id: request.request_id.clone(),
            ip_address: None,
            user_agent: None,
        }
    }

    async fn record_rejection(
        &self,
        request: &AutomationRunRequest,
        run_id: &str,
        error: &AppError,
    ) -> AppResult<()> {
        self.audit
            .record(
                &self.run_context(request, EventStatus::Denied, &error.to_string()),
                AuditEventInput {
                    action: AuditAction::AutomationRejected,
                    resource_type: "automation_run".to_owned(),
                    resource_id: run_id.to_owned(),
                    old_values: None,
                    new_values: Some(json!({ "error": error.to_string() })),
                },
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use tokio::sync::Mutex;

    use belegwerk_core::{AppError, AppResult, CompanyId, UserId};
    use belegwerk_domain::{
        AuditAction, AuditDraft, AuditRecord, BankTransactionSnapshot, CompanySnapshot,
        FindingKind, InvoiceSnapshot, InvoiceStatus, Severity,
    };

    use crate::audit_service::{AuditChainRepository, AuditLogQuery, AuditLogService};
    use crate::clock::Clock;

    use super::{AutomationRunRequest, AutomationService, CompanySnapshotRepository};

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

    struct FakeSnapshotRepository {
        snapshot: CompanySnapshot,
    }

    #[async_trait]
    impl CompanySnapshotRepository for FakeSnapshotRepository {
        async fn load_snapshot(&self, _company_id: CompanyId) -> AppResult<CompanySnapshot> {
            Ok(self.snapshot.clone())
        }
    }

    fn invoice(id: &str, number: &str, amount_cents: i64, status: InvoiceStatus) -> InvoiceSnapshot {
        InvoiceSnapshot {
            id: id.to_owned(),
            invoice_number: number.to_owned(),
            amount_cents,
            client_name: "Musterfirma GmbH".to_owned(),
            status,
        }
    }

    fn snapshot(invoices: Vec<InvoiceSnapshot>, bank_balance_cents: i64) -> CompanySnapshot {
        CompanySnapshot {
            invoices,
            bank_transactions: Vec::new(),
            invoice_payments: Vec::new(),
            bank_balance_cents,
        }
    }

    fn service(
        snapshot: CompanySnapshot,
    ) -> (AutomationService, Arc<FakeAuditChainRepository>) {
        let chain = Arc::new(FakeAuditChainRepository::default());
        let audit = AuditLogService::new(chain.clone(), Arc::new(FixedClock));
        let service = AutomationService::new(Arc::new(FakeSnapshotRepository { snapshot }), audit);
        (service, chain)
    }

    fn request() -> AutomationRunRequest {
        AutomationRunRequest {
            user_id: UserId::new(),
            company_id: CompanyId::new(),
            method: Some("GET".to_owned()),
            prompt: None,
            request_id: Some("req-1".to_owned()),
        }
    }

    async fn recorded_actions(chain: &FakeAuditChainRepository) -> Vec<AuditAction> {
        chain
            .records
            .lock()
            .await
            .iter()
            .map(|record| record.action)
            .collect()
    }

    #[tokio::test]
    async fn successful_run_logs_triggered_and_produced() {
        let (service, chain) = service(snapshot(Vec::new(), 10_000));

        let result = service.run_automation(request()).await;

        assert!(matches!(result, Ok(suggestions) if suggestions.is_empty()));
        assert_eq!(
            recorded_actions(&chain).await,
            vec![
                AuditAction::AutomationTriggered,
                AuditAction::AutomationProduced
            ]
        );
    }

    #[tokio::test]
    async fn non_get_method_is_rejected_and_logged() {
        let (service, chain) = service(snapshot(Vec::new(), 10_000));
        let mut request = request();
        request.method = Some("POST".to_owned());

        let result = service.run_automation(request).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(
            recorded_actions(&chain).await,
            vec![
                AuditAction::AutomationTriggered,
                AuditAction::AutomationRejected
            ]
        );
    }

    #[tokio::test]
    async fn mutation_intent_is_rejected_before_detectors_run() {
        let (service, chain) = service(snapshot(Vec::new(), 10_000));
        let mut request = request();
        request.prompt = Some("please delete old invoices".to_owned());

        let result = service.run_automation(request).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        let records = chain.records.lock().await;
        let rejection = records
            .iter()
            .find(|record| record.action == AuditAction::AutomationRejected);
        assert!(
            matches!(rejection, Some(record) if record.reason.contains("delete")),
            "rejection entry must carry the guard error as its reason"
        );
    }

    #[tokio::test]
    async fn every_suggestion_satisfies_the_contract() {
        let invoices = vec![
            invoice("inv-1", "RE-1001", 11900, InvoiceStatus::Sent),
            invoice("inv-2", "RE-1001", 11900, InvoiceStatus::Sent),
        ];
        let (service, _) = service(snapshot(invoices, 1_000));

        let result = service.run_automation(request()).await;

        let Ok(suggestions) = result else {
            unreachable!("run must succeed");
        };
        assert!(!suggestions.is_empty());
        for suggestion in &suggestions {
            assert!(suggestion.requires_human_approval);
            assert!(!suggestion.recommended_next_step.is_empty());
        }
    }

    #[tokio::test]
    async fn open_invoices_above_balance_yield_a_high_risk_suggestion() {
        let invoices = vec![invoice("inv-1", "RE-1001", 1_200, InvoiceStatus::Sent)];
        let (service, _) = service(snapshot(invoices, 1_000));

        let result = service.run_automation(request()).await;

        let Ok(suggestions) = result else {
            unreachable!("run must succeed");
        };
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].kind, FindingKind::CashFlowRisk);
        assert_eq!(suggestions[0].severity, Severity::High);
        assert!((suggestions[0].confidence - 0.95).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn comfortable_balance_yields_a_low_risk_suggestion() {
        let invoices = vec![invoice("inv-1", "RE-1001", 1_200, InvoiceStatus::Sent)];
        let (service, _) = service(snapshot(invoices, 3_000));

        let result = service.run_automation(request()).await;

        let Ok(suggestions) = result else {
            unreachable!("run must succeed");
        };
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].severity, Severity::Low);
        assert!((suggestions[0].confidence - 0.6).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn unmatched_transactions_surface_as_suggestions() {
        let mut company_snapshot = snapshot(Vec::new(), 10_000);
        company_snapshot.bank_transactions = vec![BankTransactionSnapshot {
            id: "tx-1".to_owned(),
            amount_cents: 5_000,
        }];
        let (service, _) = service(company_snapshot);

        let result = service.run_automation(request()).await;

        let Ok(suggestions) = result else {
            unreachable!("run must succeed");
        };
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].kind, FindingKind::UnmatchedBankTransaction);
    }
}
