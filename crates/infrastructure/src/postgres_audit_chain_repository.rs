use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use belegwerk_application::{AuditChainRepository, AuditLogQuery};
use belegwerk_core::{Actor, AppError, AppResult, CompanyId, UserId};
use belegwerk_domain::{AuditAction, AuditDraft, AuditRecord};

/// PostgreSQL-backed append-only audit chain repository.
///
/// Appends run inside a serializable transaction that locks the chain tail
/// before sealing the new entry, so two writers can never compute the same
/// predecessor. The table carries no update or delete path in this codebase;
/// `position` is monotonic per chain.
#[derive(Clone)]
pub struct PostgresAuditChainRepository {
    pool: PgPool,
}

impl PostgresAuditChainRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditChainRow {
    id: Uuid,
    action: String,
    resource_type: String,
    resource_id: String,
    actor_type: String,
    actor_user_id: Option<Uuid>,
    model_version: Option<String>,
    company_id: Option<Uuid>,
    old_values: Option<Value>,
    new_values: Option<Value>,
    reason: String,
    recorded_at: DateTime<Utc>,
    hash: String,
    previous_hash: Option<String>,
    immutable: bool,
}

fn record_from_row(row: AuditChainRow) -> AppResult<AuditRecord> {
    let actor = match row.actor_type.as_str() {
        "user" => {
            let user_id = row.actor_user_id.ok_or_else(|| {
                AppError::Internal(format!("audit entry '{}' lost its actor user id", row.id))
            })?;
            Actor::user(UserId::from_uuid(user_id))
        }
        "system" => Actor::System,
        "ai" => {
            let model_version = row.model_version.ok_or_else(|| {
                AppError::Internal(format!("audit entry '{}' lost its model version", row.id))
            })?;
            Actor::ai(model_version)
        }
        other => {
            return Err(AppError::Internal(format!(
                "audit entry '{}' has unknown actor type '{other}'",
                row.id
            )));
        }
    };

    Ok(AuditRecord {
        id: row.id,
        action: AuditAction::from_str(&row.action)?,
        resource_type: row.resource_type,
        resource_id: row.resource_id,
        actor,
        company_id: row.company_id.map(CompanyId::from_uuid),
        old_values: row.old_values,
        new_values: row.new_values,
        reason: row.reason,
        recorded_at: row.recorded_at,
        hash: row.hash,
        previous_hash: row.previous_hash,
        immutable: row.immutable,
    })
}

fn map_append_error(error: sqlx::Error) -> AppError {
    let code = error
        .as_database_error()
        .and_then(|database_error| database_error.code())
        .map(|code| code.into_owned());
    classify_append_failure(code.as_deref(), &error.to_string())
}

/// Maps an append failure to the error contract by its SQLSTATE.
///
/// A serialization failure (40001) means a concurrent appender won the
/// chain tail; the caller retries with a fresh transaction. A unique
/// violation on the position column (23505) means the tail was duplicated
/// outside this code path, which is fatal.
fn classify_append_failure(code: Option<&str>, detail: &str) -> AppError {
    match code {
        Some("40001") => AppError::Conflict(format!(
            "concurrent audit append lost the chain tail: {detail}"
        )),
        Some("23505") => AppError::Immutability(format!(
            "audit chain position is already sealed: {detail}"
        )),
        _ => AppError::Internal(format!("failed to append audit entry: {detail}")),
    }
}

#[async_trait]
impl AuditChainRepository for PostgresAuditChainRepository {
    async fn append(&self, draft: AuditDraft) -> AppResult<AuditRecord> {
        let company_uuid = draft.company_id.map(|company_id| company_id.as_uuid());

        let mut tx = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to open audit append transaction: {error}"))
        })?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to raise isolation level: {error}"))
            })?;

        let tail: Option<(String, i64)> = sqlx::query_as(
            r#"
            SELECT hash, position
            FROM audit_chain_entries
            WHERE company_id IS NOT DISTINCT FROM $1
            ORDER BY position DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(company_uuid)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read chain tail: {error}")))?;

        let position = tail.as_ref().map_or(0, |(_, position)| position + 1);
        let previous_hash = tail.map(|(hash, _)| hash);
        let record = draft.seal(previous_hash);

        sqlx::query(
            r#"
            INSERT INTO audit_chain_entries (
                id,
                position,
                company_id,
                action,
                resource_type,
                resource_id,
                actor_type,
                actor_user_id,
                model_version,
                old_values,
                new_values,
                reason,
                recorded_at,
                hash,
                previous_hash,
                immutable
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(record.id)
        .bind(position)
        .bind(company_uuid)
        .bind(record.action.as_str())
        .bind(record.resource_type.as_str())
        .bind(record.resource_id.as_str())
        .bind(record.actor.actor_type().as_str())
        .bind(record.actor.user_id().map(|user_id| user_id.as_uuid()))
        .bind(record.actor.model_version())
        .bind(record.old_values.clone())
        .bind(record.new_values.clone())
        .bind(record.reason.as_str())
        .bind(record.recorded_at)
        .bind(record.hash.as_str())
        .bind(record.previous_hash.clone())
        .bind(record.immutable)
        .execute(&mut *tx)
        .await
        .map_err(map_append_error)?;

        // Serialization failures can also surface at COMMIT.
        tx.commit().await.map_err(map_append_error)?;

        Ok(record)
    }

    async fn list_chain(&self, company_id: Option<CompanyId>) -> AppResult<Vec<AuditRecord>> {
        let rows = sqlx::query_as::<_, AuditChainRow>(
            r#"
            SELECT
                id,
                action,
                resource_type,
                resource_id,
                actor_type,
                actor_user_id,
                model_version,
                company_id,
                old_values,
                new_values,
                reason,
                recorded_at,
                hash,
                previous_hash,
                immutable
            FROM audit_chain_entries
            WHERE company_id IS NOT DISTINCT FROM $1
            ORDER BY position ASC
            "#,
        )
        .bind(company_id.map(|company_id| company_id.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list audit chain: {error}")))?;

        rows.into_iter().map(record_from_row).collect()
    }

    async fn list_recent(
        &self,
        company_id: Option<CompanyId>,
        query: AuditLogQuery,
    ) -> AppResult<Vec<AuditRecord>> {
        let capped_limit = query.limit.clamp(1, 200) as i64;
        let capped_offset = query.offset.min(5_000) as i64;

        let rows = sqlx::query_as::<_, AuditChainRow>(
            r#"
            SELECT
                id,
                action,
                resource_type,
                resource_id,
                actor_type,
                actor_user_id,
                model_version,
                company_id,
                old_values,
                new_values,
                reason,
                recorded_at,
                hash,
                previous_hash,
                immutable
            FROM audit_chain_entries
            WHERE company_id IS NOT DISTINCT FROM $1
                AND ($2::TEXT IS NULL OR action = $2)
            ORDER BY position DESC
            LIMIT $3
            OFFSET $4
            "#,
        )
        .bind(company_id.map(|company_id| company_id.as_uuid()))
        .bind(query.action)
        .bind(capped_limit)
        .bind(capped_offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list recent audit entries: {error}"))
        })?;

        rows.into_iter().map(record_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use belegwerk_core::AppError;

    use super::classify_append_failure;

    #[test]
    fn serialization_failure_is_a_retryable_conflict() {
        let error = classify_append_failure(Some("40001"), "could not serialize access");
        assert!(matches!(error, AppError::Conflict(_)));
    }

    #[test]
    fn duplicated_chain_position_is_an_immutability_violation() {
        let error = classify_append_failure(Some("23505"), "duplicate key value");
        assert!(matches!(error, AppError::Immutability(_)));
    }

    #[test]
    fn other_database_failures_stay_internal() {
        let error = classify_append_failure(Some("57P01"), "terminating connection");
        assert!(matches!(error, AppError::Internal(_)));
        let error = classify_append_failure(None, "connection reset");
        assert!(matches!(error, AppError::Internal(_)));
    }
}
