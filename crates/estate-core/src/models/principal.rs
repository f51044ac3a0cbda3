//! The acting principal of an inbound command.
//!
//! Supplied by the identity collaborator and trusted as-is; the core
//! never re-authenticates it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::{Department, Role, User};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub department: Option<Department>,
}

impl Principal {
    pub fn new(tenant_id: Uuid, user_id: Uuid, role: Role) -> Self {
        Self {
            tenant_id,
            user_id,
            role,
            department: None,
        }
    }

    pub fn with_department(mut self, department: Department) -> Self {
        self.department = Some(department);
        self
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            tenant_id: user.tenant_id,
            user_id: user.id,
            role: user.role,
            department: user.department,
        }
    }
}
