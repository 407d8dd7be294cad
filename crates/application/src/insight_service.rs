use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use belegwerk_core::{Actor, AppError, AppResult, CompanyId};
use belegwerk_domain::{
    AiInsight, AuditAction, DecisionActor, DecisionKind, EventClass, EventStatus, InsightDecision,
    ScopeType, Suggestion, SystemContext, UserRole,
};

use crate::audit_service::{AuditEventInput, AuditLogService};
use crate::automation_service::{AutomationRunRequest, AutomationService};
use crate::clock::Clock;

/// Version tag stamped on every insight produced by the rule detectors.
const MODEL_VERSION: &str = "belegwerk-rules-2026.03";

/// Feature flag insights are produced under.
const FEATURE_FLAG: &str = "ai_insights";

/// Advisory-only disclaimer attached to every insight.
const DISCLAIMER: &str = "Automatisch erzeugter Hinweis. Prüfen Sie den Vorschlag; \
     es wird nichts ohne Ihre Freigabe geändert.";

/// Legal framing attached to every insight.
const LEGAL_CONTEXT: &str = "Hinweis zur Prüfung nach GoBD; gebuchte Belege bleiben unverändert. \
     Ersetzt keine steuerliche Beratung.";

/// AI-related settings of a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompanyAiSettings {
    /// Whether AI insights are switched on for the company.
    pub ai_enabled: bool,
}

/// Port for reading company settings.
#[async_trait]
pub trait CompanyRepository: Send + Sync {
    /// Returns the AI settings for one company.
    async fn ai_settings(&self, company_id: CompanyId) -> AppResult<CompanyAiSettings>;
}

/// Port for persisting insights and their decision history.
///
/// `ensure_schema` reports whether the insight tables are provisioned at
/// all; adapters return [`AppError::SchemaUnavailable`] when they are not.
#[async_trait]
pub trait InsightRepository: Send + Sync {
    /// Fails when the insight schema is not provisioned.
    async fn ensure_schema(&self) -> AppResult<()>;

    /// Persists one insight.
    async fn insert_insight(&self, insight: AiInsight) -> AppResult<()>;

    /// Finds one insight scoped to a company.
    async fn find_insight(
        &self,
        company_id: CompanyId,
        insight_id: Uuid,
    ) -> AppResult<Option<AiInsight>>;

    /// Lists every insight of a company in creation order.
    async fn list_insights(&self, company_id: CompanyId) -> AppResult<Vec<AiInsight>>;

    /// Appends one decision to an insight's history.
    async fn insert_decision(&self, decision: InsightDecision) -> AppResult<()>;

    /// Lists the decision history of one insight in creation order.
    async fn list_decisions(
        &self,
        company_id: CompanyId,
        insight_id: Uuid,
    ) -> AppResult<Vec<InsightDecision>>;
}

/// One insight joined with its full decision history.
#[derive(Debug, Clone, PartialEq)]
pub struct InsightExport {
    /// The insight itself.
    pub insight: AiInsight,
    /// All decisions ever taken on it, in creation order.
    pub decisions: Vec<InsightDecision>,
}

impl InsightExport {
    /// Returns the authoritative (latest) decision, if any.
    #[must_use]
    pub fn latest_decision(&self) -> Option<&InsightDecision> {
        self.decisions.last()
    }
}

/// Application service for the insight lifecycle: generation, listing,
/// export, and the human decision workflow.
#[derive(Clone)]
pub struct InsightService {
    automation: AutomationService,
    insights: Arc<dyn InsightRepository>,
    companies: Arc<dyn CompanyRepository>,
    audit: AuditLogService,
    clock: Arc<dyn Clock>,
}

impl InsightService {
    /// Creates a new service from its collaborators.
    #[must_use]
    pub fn new(
        automation: AutomationService,
        insights: Arc<dyn InsightRepository>,
        companies: Arc<dyn CompanyRepository>,
        audit: AuditLogService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            automation,
            insights,
            companies,
            audit,
            clock,
        }
    }

    /// Runs the automation pipeline and persists every suggestion as an
    /// insight.
    ///
    /// This is a write path: feature and schema failures always propagate,
    /// there is no degraded mode here.
    pub async fn generate_insights_for_company(
        &self,
        request: AutomationRunRequest,
    ) -> AppResult<Vec<AiInsight>> {
        let company_id = request.company_id;
        self.require_ai_enabled(company_id).await?;
        self.insights.ensure_schema().await?;

        let suggestions = self.automation.run_automation(request).await?;
        let mut insights = Vec::with_capacity(suggestions.len());

        for suggestion in suggestions {
            let insight = self.insight_from_suggestion(company_id, suggestion)?;
            self.insights.insert_insight(insight.clone()).await?;
            self.record_suggestion_audit(&insight).await?;
            insights.push(insight);
        }

        Ok(insights)
    }

    /// Records a human decision on an insight.
    ///
    /// The validation order is part of the contract: decision shape, then
    /// reason, then the viewer ban, then schema availability, then insight
    /// existence, then the admin requirement for overrides, and the company
    /// feature flag last, so invalid input is always reported before a
    /// feature-flag problem.
    pub async fn decide_insight(
        &self,
        company_id: CompanyId,
        insight_id: Uuid,
        actor: DecisionActor,
        decision: &str,
        reason: Option<&str>,
    ) -> AppResult<InsightDecision> {
        let kind = DecisionKind::from_transport(decision)?;

        let reason = reason
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .map(str::to_owned);
        if kind.requires_reason() && reason.is_none() {
            return Err(AppError::Validation(format!(
                "decision '{}' requires a reason",
                kind.as_str()
            )));
        }

        if actor.role == UserRole::Viewer {
            return Err(AppError::Forbidden(
                "viewers may not decide on insights".to_owned(),
            ));
        }

        self.insights.ensure_schema().await?;

        let insight = self
            .insights
            .find_insight(company_id, insight_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "insight '{insight_id}' does not exist for company '{company_id}'"
                ))
            })?;

        if kind == DecisionKind::Overridden && actor.role != UserRole::Admin {
            return Err(AppError::Forbidden(
                "only admins may override an insight".to_owned(),
            ));
        }

        self.require_ai_enabled(company_id).await?;

        let record = InsightDecision {
            id: Uuid::new_v4(),
            insight_id,
            company_id,
            actor_user_id: actor.user_id,
            decision: kind,
            reason: reason.clone(),
            decided_at: self.clock.now(),
        };
        self.insights.insert_decision(record.clone()).await?;

        let context = SystemContext {
            actor: Actor::user(actor.user_id),
            scope: ScopeType::Company,
            company_id: Some(company_id),
            event_class: EventClass::AiGovernance,
            status: EventStatus::Success,
            reason: reason
                .clone()
                .unwrap_or_else(|| format!("insight {}", kind.as_str())),
            request_id: None,
            ip_address: None,
            user_agent: None,
        };
        self.audit
            .record(
                &context,
                AuditEventInput {
                    action: kind.audit_action(),
                    resource_type: "ai_insight".to_owned(),
                    resource_id: insight_id.to_string(),
                    old_values: None,
                    new_values: Some(json!({
                        "decision": kind.as_str(),
                        "reason": reason,
                        "model_version": insight.model_version,
                    })),
                },
            )
            .await?;

        Ok(record)
    }

    /// Lists a company's insights for dashboard rendering.
    ///
    /// Read path with graceful degradation: a missing schema or a disabled
    /// feature yields an empty list so dashboards stay functional. Every
    /// other error propagates.
    pub async fn list_insights_for_client(
        &self,
        company_id: CompanyId,
    ) -> AppResult<Vec<AiInsight>> {
        match self.load_insights(company_id).await {
            Ok(insights) => Ok(insights),
            Err(AppError::FeatureUnavailable(_) | AppError::SchemaUnavailable(_)) => {
                Ok(Vec::new())
            }
            Err(error) => Err(error),
        }
    }

    /// Exports a company's insights joined with their decision histories.
    ///
    /// Same degradation rule as [`Self::list_insights_for_client`].
    pub async fn export_insights(&self, company_id: CompanyId) -> AppResult<Vec<InsightExport>> {
        let insights = match self.load_insights(company_id).await {
            Ok(insights) => insights,
            Err(AppError::FeatureUnavailable(_) | AppError::SchemaUnavailable(_)) => {
                return Ok(Vec::new());
            }
            Err(error) => return Err(error),
        };

        let mut exports = Vec::with_capacity(insights.len());
        for insight in insights {
            let decisions = self
                .insights
                .list_decisions(company_id, insight.id)
                .await?;
            exports.push(InsightExport { insight, decisions });
        }

        Ok(exports)
    }

    async fn load_insights(&self, company_id: CompanyId) -> AppResult<Vec<AiInsight>> {
        self.require_ai_enabled(company_id).await?;
        self.insights.ensure_schema().await?;
        self.insights.list_insights(company_id).await
    }

    async fn require_ai_enabled(&self, company_id: CompanyId) -> AppResult<()> {
        let settings = self.companies.ai_settings(company_id).await?;
        if !settings.ai_enabled {
            return Err(AppError::FeatureUnavailable(format!(
                "AI insights are disabled for company '{company_id}'"
            )));
        }

        Ok(())
    }

    fn insight_from_suggestion(
        &self,
        company_id: CompanyId,
        suggestion: Suggestion,
    ) -> AppResult<AiInsight> {
        let (entity_type, entity_id) = suggestion
            .related_entities
            .first()
            .map(|entity| (entity.entity_type.clone(), entity.entity_id.clone()))
            .unwrap_or_else(|| ("company".to_owned(), company_id.to_string()));

        let evidence = serde_json::to_value(&suggestion.evidence).map_err(|error| {
            AppError::Internal(format!("failed to encode insight evidence: {error}"))
        })?;

        Ok(AiInsight {
            id: Uuid::new_v4(),
            company_id,
            entity_type,
            entity_id,
            kind: suggestion.kind,
            severity: suggestion.severity,
            confidence: suggestion.confidence,
            summary: suggestion.title,
            why: suggestion.explanation,
            legal_context: LEGAL_CONTEXT.to_owned(),
            evidence,
            rule_id: format!("rule.{}.v1", suggestion.kind.as_str()),
            model_version: MODEL_VERSION.to_owned(),
            feature_flag: FEATURE_FLAG.to_owned(),
            disclaimer: DISCLAIMER.to_owned(),
            created_at: self.clock.now(),
        })
    }

    async fn record_suggestion_audit(&self, insight: &AiInsight) -> AppResult<()> {
        let context = SystemContext {
            actor: Actor::ai(MODEL_VERSION),
            scope: ScopeType::Company,
            company_id: Some(insight.company_id),
            event_class: EventClass::AiGovernance,
            status: EventStatus::Success,
            reason: "ai insight generated".to_owned(),
            request_id: None,
            ip_address: None,
            user_agent: None,
        };

        self.audit
            .record(
                &context,
                AuditEventInput {
                    action: AuditAction::AiSuggest,
                    resource_type: "ai_insight".to_owned(),
                    resource_id: insight.id.to_string(),
                    old_values: None,
                    new_values: Some(json!({
                        "summary": insight.summary,
                        "why": insight.why,
                        "confidence": insight.confidence,
                        "rule_id": insight.rule_id,
                        "model_version": insight.model_version,
                    })),
                },
            )
            .await?;
        Ok(())
    }
}
