//! Adapters implementing the application ports.

#![forbid(unsafe_code)]

mod in_memory_audit_chain_repository;
mod in_memory_company_repository;
mod in_memory_insight_repository;
mod in_memory_snapshot_repository;
mod postgres_audit_chain_repository;
mod postgres_company_repository;
mod postgres_insight_repository;

pub use in_memory_audit_chain_repository::InMemoryAuditChainRepository;
pub use in_memory_company_repository::InMemoryCompanyRepository;
pub use in_memory_insight_repository::InMemoryInsightRepository;
pub use in_memory_snapshot_repository::InMemorySnapshotRepository;
pub use postgres_audit_chain_repository::PostgresAuditChainRepository;
pub use postgres_company_repository::PostgresCompanyRepository;
pub use postgres_insight_repository::PostgresInsightRepository;
