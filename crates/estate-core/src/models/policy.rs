//! Per-tenant SLA policy (the "system settings" of the surrounding
//! application).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::request::{Priority, RequestKind};

/// Allowed time between creation and required action for one
/// `(kind, priority)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaPolicy {
    pub tenant_id: Uuid,
    pub kind: RequestKind,
    pub priority: Priority,
    pub window_secs: u64,
    pub updated_at: DateTime<Utc>,
}

impl SlaPolicy {
    pub fn window(&self) -> Duration {
        Duration::seconds(i64::try_from(self.window_secs).unwrap_or(i64::MAX))
    }
}
