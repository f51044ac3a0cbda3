//! Estate Core: domain models, error taxonomy, tenant isolation, and
//! repository trait definitions shared by every other crate.

pub mod error;
pub mod models;
pub mod repository;
pub mod tenancy;
