use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use belegwerk_application::InsightRepository;
use belegwerk_core::{AppError, AppResult, CompanyId, UserId};
use belegwerk_domain::{AiInsight, DecisionKind, FindingKind, InsightDecision, Severity};

/// PostgreSQL-backed insight repository.
///
/// Insight rows are written once and never updated; decisions accumulate in
/// their own table. The schema probe runs before every operation so a
/// half-provisioned database degrades deterministically instead of failing
/// with raw SQL errors.
#[derive(Clone)]
pub struct PostgresInsightRepository {
    pool: PgPool,
}

impl PostgresInsightRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct InsightRow {
    id: Uuid,
    company_id: Uuid,
    entity_type: String,
    entity_id: String,
    kind: String,
    severity: String,
    confidence: f64,
    summary: String,
    why: String,
    legal_context: String,
    evidence: Value,
    rule_id: String,
    model_version: String,
    feature_flag: String,
    disclaimer: String,
    created_at: DateTime<Utc>,
}

fn insight_from_row(row: InsightRow) -> AppResult<AiInsight> {
    Ok(AiInsight {
        id: row.id,
        company_id: CompanyId::from_uuid(row.company_id),
        entity_type: row.entity_type,
        entity_id: row.entity_id,
        kind: FindingKind::from_str(&row.kind)?,
        severity: Severity::from_str(&row.severity)?,
        confidence: row.confidence,
        summary: row.summary,
        why: row.why,
        legal_context: row.legal_context,
        evidence: row.evidence,
        rule_id: row.rule_id,
        model_version: row.model_version,
        feature_flag: row.feature_flag,
        disclaimer: row.disclaimer,
        created_at: row.created_at,
    })
}

#[derive(Debug, FromRow)]
struct DecisionRow {
    id: Uuid,
    insight_id: Uuid,
    company_id: Uuid,
    actor_user_id: Uuid,
    decision: String,
    reason: Option<String>,
    decided_at: DateTime<Utc>,
}

fn decision_from_row(row: DecisionRow) -> AppResult<InsightDecision> {
    Ok(InsightDecision {
        id: row.id,
        insight_id: row.insight_id,
        company_id: CompanyId::from_uuid(row.company_id),
        actor_user_id: UserId::from_uuid(row.actor_user_id),
        decision: DecisionKind::from_str(&row.decision)?,
        reason: row.reason,
        decided_at: row.decided_at,
    })
}

#[async_trait]
impl InsightRepository for PostgresInsightRepository {
    async fn ensure_schema(&self) -> AppResult<()> {
        let (provisioned,): (bool,) = sqlx::query_as(
            r#"
            SELECT to_regclass('ai_insights') IS NOT NULL
                AND to_regclass('ai_insight_decisions') IS NOT NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to probe insight schema: {error}")))?;

        if provisioned {
            Ok(())
        } else {
            tracing::warn!("ai insight tables are not provisioned");
            Err(AppError::SchemaUnavailable(
                "ai insight tables are not provisioned".to_owned(),
            ))
        }
    }

    async fn insert_insight(&self, insight: AiInsight) -> AppResult<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO ai_insights (
                id,
                company_id,
                entity_type,
                entity_id,
                kind,
                severity,
                confidence,
                summary,
                why,
                legal_context,
                evidence,
                rule_id,
                model_version,
                feature_flag,
                disclaimer,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(insight.id)
        .bind(insight.company_id.as_uuid())
        .bind(insight.entity_type.as_str())
        .bind(insight.entity_id.as_str())
        .bind(insight.kind.as_str())
        .bind(insight.severity.as_str())
        .bind(insight.confidence)
        .bind(insight.summary.as_str())
        .bind(insight.why.as_str())
        .bind(insight.legal_context.as_str())
        .bind(insight.evidence.clone())
        .bind(insight.rule_id.as_str())
        .bind(insight.model_version.as_str())
        .bind(insight.feature_flag.as_str())
        .bind(insight.disclaimer.as_str())
        .bind(insight.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to insert insight: {error}")))?;

        Ok(())
    }

    async fn find_insight(
        &self,
        company_id: CompanyId,
        insight_id: Uuid,
    ) -> AppResult<Option<AiInsight>> {
        self.ensure_schema().await?;

        let row = sqlx::query_as::<_, InsightRow>(
            r#"
            SELECT
                id,
                company_id,
                entity_type,
                entity_id,
                kind,
                severity,
                confidence,
                summary,
                why,
                legal_context,
                evidence,
                rule_id,
                model_version,
                feature_flag,
                disclaimer,
                created_at
            FROM ai_insights
            WHERE id = $1 AND company_id = $2
            "#,
        )
        .bind(insight_id)
        .bind(company_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load insight: {error}")))?;

        row.map(insight_from_row).transpose()
    }

    async fn list_insights(&self, company_id: CompanyId) -> AppResult<Vec<AiInsight>> {
        self.ensure_schema().await?;

        let rows = sqlx::query_as::<_, InsightRow>(
            r#"
            SELECT
                id,
                company_id,
                entity_type,
                entity_id,
                kind,
                severity,
                confidence,
                summary,
                why,
                legal_context,
                evidence,
                rule_id,
                model_version,
                feature_flag,
                disclaimer,
                created_at
            FROM ai_insights
            WHERE company_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(company_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list insights: {error}")))?;

        rows.into_iter().map(insight_from_row).collect()
    }

    async fn insert_decision(&self, decision: InsightDecision) -> AppResult<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO ai_insight_decisions (
                id,
                insight_id,
                company_id,
                actor_user_id,
                decision,
                reason,
                decided_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(decision.id)
        .bind(decision.insight_id)
        .bind(decision.company_id.as_uuid())
        .bind(decision.actor_user_id.as_uuid())
        .bind(decision.decision.as_str())
        .bind(decision.reason.clone())
        .bind(decision.decided_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to insert decision: {error}")))?;

        Ok(())
    }

    async fn list_decisions(
        &self,
        company_id: CompanyId,
        insight_id: Uuid,
    ) -> AppResult<Vec<InsightDecision>> {
        self.ensure_schema().await?;

        let rows = sqlx::query_as::<_, DecisionRow>(
            r#"
            SELECT
                id,
                insight_id,
                company_id,
                actor_user_id,
                decision,
                reason,
                decided_at
            FROM ai_insight_decisions
            WHERE insight_id = $1 AND company_id = $2
            ORDER BY decided_at ASC
            "#,
        )
        .bind(insight_id)
        .bind(company_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list decisions: {error}")))?;

        rows.into_iter().map(decision_from_row).collect()
    }
}
