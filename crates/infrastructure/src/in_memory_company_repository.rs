use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use belegwerk_application::{CompanyAiSettings, CompanyRepository};
use belegwerk_core::{AppError, AppResult, CompanyId};

/// In-memory company settings repository.
#[derive(Debug, Default)]
pub struct InMemoryCompanyRepository {
    settings: RwLock<HashMap<CompanyId, CompanyAiSettings>>,
}

impl InMemoryCompanyRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            settings: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a company with the given AI setting.
    pub async fn put_company(&self, company_id: CompanyId, ai_enabled: bool) {
        self.settings
            .write()
            .await
            .insert(company_id, CompanyAiSettings { ai_enabled });
    }
}

#[async_trait]
impl CompanyRepository for InMemoryCompanyRepository {
    async fn ai_settings(&self, company_id: CompanyId) -> AppResult<CompanyAiSettings> {
        self.settings
            .read()
            .await
            .get(&company_id)
            .copied()
            .ok_or_else(|| AppError::NotFound(format!("company '{company_id}' does not exist")))
    }
}

#[cfg(test)]
mod tests {
    use belegwerk_application::CompanyRepository;
    use belegwerk_core::{AppError, CompanyId};

    use super::InMemoryCompanyRepository;

    #[tokio::test]
    async fn unknown_company_is_not_found() {
        let repository = InMemoryCompanyRepository::new();
        let result = repository.ai_settings(CompanyId::new()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn registered_company_returns_its_setting() {
        let repository = InMemoryCompanyRepository::new();
        let company_id = CompanyId::new();
        repository.put_company(company_id, true).await;

        let result = repository.ai_settings(company_id).await;

        assert!(matches!(result, Ok(settings) if settings.ai_enabled));
    }
}
