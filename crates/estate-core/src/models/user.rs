//! User domain model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    SuperUser,
    Admin,
    Tenant,
    DepartmentUser,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperUser => "SuperUser",
            Self::Admin => "Admin",
            Self::Tenant => "Tenant",
            Self::DepartmentUser => "DepartmentUser",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SuperUser" => Some(Self::SuperUser),
            "Admin" => Some(Self::Admin),
            "Tenant" => Some(Self::Tenant),
            "DepartmentUser" => Some(Self::DepartmentUser),
            _ => None,
        }
    }

    /// Admin and SuperUser manage every request in their tenant.
    pub fn is_manager(&self) -> bool {
        matches!(self, Self::SuperUser | Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Staff department a `DepartmentUser` belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Department {
    Maintenance,
    Taxi,
    /// Handles rental listing enquiries.
    Leasing,
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Maintenance => "Maintenance",
            Self::Taxi => "Taxi",
            Self::Leasing => "Leasing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Maintenance" => Some(Self::Maintenance),
            "Taxi" => Some(Self::Taxi),
            "Leasing" => Some(Self::Leasing),
            _ => None,
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(Self::Active),
            "Inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Set iff `role` is [`Role::DepartmentUser`].
    pub department: Option<Department>,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub tenant_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: Option<Department>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: Option<UserStatus>,
}
