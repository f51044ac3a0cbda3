//! SurrealDB repository implementations.

mod audit;
mod notification;
mod service_request;
mod sla_policy;
mod tenant;
mod user;

pub use audit::SurrealAuditLogRepository;
pub use notification::SurrealNotificationOutbox;
pub use service_request::SurrealServiceRequestRepository;
pub use sla_policy::SurrealSlaPolicyRepository;
pub use tenant::SurrealTenantRepository;
pub use user::SurrealUserRepository;

use surrealdb_types::SurrealValue;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub(crate) total: u64,
}
