//! Application services and ports for the audit and AI-governance core.

#![forbid(unsafe_code)]

mod audit_service;
mod automation_service;
mod clock;
mod insight_service;

pub use audit_service::{
    AuditChainRepository, AuditEventInput, AuditLogQuery, AuditLogService,
};
pub use automation_service::{
    AutomationRunRequest, AutomationService, CompanySnapshotRepository,
};
pub use clock::{Clock, SystemClock};
pub use insight_service::{
    CompanyAiSettings, CompanyRepository, InsightExport, InsightRepository, InsightService,
};
