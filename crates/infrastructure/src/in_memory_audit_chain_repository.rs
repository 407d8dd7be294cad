use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use belegwerk_application::{AuditChainRepository, AuditLogQuery};
use belegwerk_core::{AppResult, CompanyId};
use belegwerk_domain::{AuditDraft, AuditRecord};

/// In-memory audit chain repository.
///
/// One mutex guards all chains, so the read of a chain's tail and the insert
/// of the sealed entry never interleave between two appenders. Company
/// chains are independent; entries without a company id share one global
/// chain.
#[derive(Debug, Default)]
pub struct InMemoryAuditChainRepository {
    chains: Mutex<HashMap<Option<CompanyId>, Vec<AuditRecord>>>,
}

impl InMemoryAuditChainRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chains: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub(crate) async fn tamper_with_entry<F>(
        &self,
        company_id: Option<CompanyId>,
        position: usize,
        mutate: F,
    ) where
        F: FnOnce(&mut AuditRecord),
    {
        let mut chains = self.chains.lock().await;
        if let Some(record) = chains
            .get_mut(&company_id)
            .and_then(|chain| chain.get_mut(position))
        {
            mutate(record);
        }
    }
}

#[async_trait]
impl AuditChainRepository for InMemoryAuditChainRepository {
    async fn append(&self, draft: AuditDraft) -> AppResult<AuditRecord> {
        let mut chains = self.chains.lock().await;
        let chain = chains.entry(draft.company_id).or_default();
        let previous_hash = chain.last().map(|record| record.hash.clone());
        let record = draft.seal(previous_hash);
        chain.push(record.clone());
        Ok(record)
    }

    async fn list_chain(&self, company_id: Option<CompanyId>) -> AppResult<Vec<AuditRecord>> {
        let chains = self.chains.lock().await;
        Ok(chains.get(&company_id).cloned().unwrap_or_default())
    }

    async fn list_recent(
        &self,
        company_id: Option<CompanyId>,
        query: AuditLogQuery,
    ) -> AppResult<Vec<AuditRecord>> {
        let chains = self.chains.lock().await;
        let chain = chains.get(&company_id).cloned().unwrap_or_default();
        let capped_limit = query.limit.clamp(1, 200);

        Ok(chain
            .into_iter()
            .rev()
            .filter(|record| {
                query
                    .action
                    .as_deref()
                    .is_none_or(|action| record.action.as_str() == action)
            })
            .skip(query.offset)
            .take(capped_limit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use belegwerk_application::{AuditChainRepository, AuditLogQuery};
    use belegwerk_core::{Actor, CompanyId, UserId};
    use belegwerk_domain::{AuditAction, AuditDraft, verify_chain};

    use super::InMemoryAuditChainRepository;

    fn draft(company_id: CompanyId, resource_id: &str) -> AuditDraft {
        AuditDraft {
            action: AuditAction::Create,
            resource_type: "invoice".to_owned(),
            resource_id: resource_id.to_owned(),
            actor: Actor::user(UserId::new()),
            company_id: Some(company_id),
            old_values: None,
            new_values: None,
            reason: "invoice created".to_owned(),
            recorded_at: Utc
                .with_ymd_and_hms(2026, 3, 1, 9, 30, 0)
                .single()
                .unwrap_or_default(),
        }
    }

    #[tokio::test]
    async fn appended_entries_form_a_verifiable_chain() {
        let repository = InMemoryAuditChainRepository::new();
        let company_id = CompanyId::new();

        for index in 0..5 {
            let result = repository
                .append(draft(company_id, &format!("inv-{index}")))
                .await;
            assert!(result.is_ok());
        }

        let chain = repository.list_chain(Some(company_id)).await;
        assert!(matches!(&chain, Ok(records) if records.len() == 5));
        if let Ok(records) = chain {
            assert!(verify_chain(&records).is_valid());
        }
    }

    #[tokio::test]
    async fn tampering_with_any_entry_breaks_verification() {
        let repository = InMemoryAuditChainRepository::new();
        let company_id = CompanyId::new();

        for index in 0..3 {
            let result = repository
                .append(draft(company_id, &format!("inv-{index}")))
                .await;
            assert!(result.is_ok());
        }

        repository
            .tamper_with_entry(Some(company_id), 1, |record| {
                record.reason = "rewritten".to_owned();
            })
            .await;

        let chain = repository.list_chain(Some(company_id)).await;
        if let Ok(records) = chain {
            assert!(!verify_chain(&records).is_valid());
        } else {
            unreachable!("listing must succeed");
        }
    }

    #[tokio::test]
    async fn company_chains_are_independent() {
        let repository = InMemoryAuditChainRepository::new();
        let first_company = CompanyId::new();
        let second_company = CompanyId::new();

        let first = repository.append(draft(first_company, "inv-1")).await;
        let second = repository.append(draft(second_company, "inv-1")).await;

        assert!(matches!(first, Ok(record) if record.previous_hash.is_none()));
        assert!(matches!(second, Ok(record) if record.previous_hash.is_none()));
    }

    #[tokio::test]
    async fn concurrent_appends_never_fork_the_chain() {
        let repository = Arc::new(InMemoryAuditChainRepository::new());
        let company_id = CompanyId::new();

        let mut handles = Vec::new();
        for index in 0..16 {
            let repository = repository.clone();
            handles.push(tokio::spawn(async move {
                repository
                    .append(draft(company_id, &format!("inv-{index}")))
                    .await
            }));
        }
        for handle in handles {
            let joined = handle.await;
            assert!(matches!(joined, Ok(Ok(_))));
        }

        let chain = repository.list_chain(Some(company_id)).await;
        if let Ok(records) = chain {
            assert_eq!(records.len(), 16);
            assert!(verify_chain(&records).is_valid());
        } else {
            unreachable!("listing must succeed");
        }
    }

    #[tokio::test]
    async fn recent_listing_filters_by_action_and_caps_the_limit() {
        let repository = InMemoryAuditChainRepository::new();
        let company_id = CompanyId::new();

        for index in 0..4 {
            let result = repository
                .append(draft(company_id, &format!("inv-{index}")))
                .await;
            assert!(result.is_ok());
        }

        let recent = repository
            .list_recent(
                Some(company_id),
                AuditLogQuery {
                    limit: 2,
                    offset: 0,
                    action: Some("create".to_owned()),
                },
            )
            .await;

        assert!(matches!(recent, Ok(records) if records.len() == 2));
    }
}
