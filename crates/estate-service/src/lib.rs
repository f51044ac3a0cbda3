//! Estate Service: the service-request lifecycle engine.
//!
//! Creation, eligibility-checked assignment, state-machine-governed
//! transitions and SLA escalation, each scoped to one tenant and recorded
//! in the append-only audit log. Generic over the repository traits of
//! `estate-core`, so this crate has no dependency on the database crate.

pub mod assignment;
pub mod audit;
pub mod config;
pub mod error;
pub mod escalation;
pub mod lifecycle;
pub mod policy;
pub mod service;
pub mod validation;

pub use audit::{Actor, AuditLogger};
pub use config::ServiceConfig;
pub use error::RequestError;
pub use escalation::{EscalationMonitor, SweepReport};
pub use policy::{Action, can_perform};
pub use service::RequestService;
