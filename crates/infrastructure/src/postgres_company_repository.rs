use async_trait::async_trait;
use sqlx::PgPool;

use belegwerk_application::{CompanyAiSettings, CompanyRepository};
use belegwerk_core::{AppError, AppResult, CompanyId};

/// PostgreSQL-backed company settings repository.
#[derive(Clone)]
pub struct PostgresCompanyRepository {
    pool: PgPool,
}

impl PostgresCompanyRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CompanyRepository for PostgresCompanyRepository {
    async fn ai_settings(&self, company_id: CompanyId) -> AppResult<CompanyAiSettings> {
        let row: Option<(bool,)> = sqlx::query_as(
            "SELECT ai_enabled FROM companies WHERE id = $1",
        )
        .bind(company_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load company settings: {error}"))
        })?;

        row.map(|(ai_enabled,)| CompanyAiSettings { ai_enabled })
            .ok_or_else(|| AppError::NotFound(format!("company '{company_id}' does not exist")))
    }
}
