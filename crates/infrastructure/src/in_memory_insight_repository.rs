use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use belegwerk_application::InsightRepository;
use belegwerk_core::{AppError, AppResult, CompanyId};
use belegwerk_domain::{AiInsight, InsightDecision};

/// In-memory insight repository.
///
/// Construct it without a schema to exercise the degraded read paths and
/// the strict write paths.
#[derive(Debug)]
pub struct InMemoryInsightRepository {
    schema_available: bool,
    insights: RwLock<Vec<AiInsight>>,
    decisions: RwLock<Vec<InsightDecision>>,
}

impl InMemoryInsightRepository {
    /// Creates an empty repository with a provisioned schema.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema_available: true,
            insights: RwLock::new(Vec::new()),
            decisions: RwLock::new(Vec::new()),
        }
    }

    /// Creates a repository that reports its schema as missing.
    #[must_use]
    pub fn without_schema() -> Self {
        Self {
            schema_available: false,
            insights: RwLock::new(Vec::new()),
            decisions: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryInsightRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InsightRepository for InMemoryInsightRepository {
    async fn ensure_schema(&self) -> AppResult<()> {
        if self.schema_available {
            Ok(())
        } else {
            Err(AppError::SchemaUnavailable(
                "ai insight tables are not provisioned".to_owned(),
            ))
        }
    }

    async fn insert_insight(&self, insight: AiInsight) -> AppResult<()> {
        self.ensure_schema().await?;
        self.insights.write().await.push(insight);
        Ok(())
    }

    async fn find_insight(
        &self,
        company_id: CompanyId,
        insight_id: Uuid,
    ) -> AppResult<Option<AiInsight>> {
        self.ensure_schema().await?;
        Ok(self
            .insights
            .read()
            .await
            .iter()
            .find(|insight| insight.id == insight_id && insight.company_id == company_id)
            .cloned())
    }

    async fn list_insights(&self, company_id: CompanyId) -> AppResult<Vec<AiInsight>> {
        self.ensure_schema().await?;
        Ok(self
            .insights
            .read()
            .await
            .iter()
            .filter(|insight| insight.company_id == company_id)
            .cloned()
            .collect())
    }

    async fn insert_decision(&self, decision: InsightDecision) -> AppResult<()> {
        self.ensure_schema().await?;
        self.decisions.write().await.push(decision);
        Ok(())
    }

    async fn list_decisions(
        &self,
        company_id: CompanyId,
        insight_id: Uuid,
    ) -> AppResult<Vec<InsightDecision>> {
        self.ensure_schema().await?;
        Ok(self
            .decisions
            .read()
            .await
            .iter()
            .filter(|decision| {
                decision.insight_id == insight_id && decision.company_id == company_id
            })
            .cloned()
            .collect())
    }
}
