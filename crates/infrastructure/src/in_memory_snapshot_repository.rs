use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use belegwerk_application::CompanySnapshotRepository;
use belegwerk_core::{AppResult, CompanyId};
use belegwerk_domain::CompanySnapshot;

/// In-memory snapshot repository.
///
/// Whatever is stored here is everything the detectors get to see for a
/// company; an unknown company yields an empty snapshot.
#[derive(Debug, Default)]
pub struct InMemorySnapshotRepository {
    snapshots: RwLock<HashMap<CompanyId, CompanySnapshot>>,
}

impl InMemorySnapshotRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Stores the detector input for a company.
    pub async fn put_snapshot(&self, company_id: CompanyId, snapshot: CompanySnapshot) {
        self.snapshots.write().await.insert(company_id, snapshot);
    }
}

#[async_trait]
impl CompanySnapshotRepository for InMemorySnapshotRepository {
    async fn load_snapshot(&self, company_id: CompanyId) -> AppResult<CompanySnapshot> {
        Ok(self
            .snapshots
            .read()
            .await
            .get(&company_id)
            .cloned()
            .unwrap_or(CompanySnapshot {
                invoices: Vec::new(),
                bank_transactions: Vec::new(),
                invoice_payments: Vec::new(),
                bank_balance_cents: 0,
            }))
    }
}
