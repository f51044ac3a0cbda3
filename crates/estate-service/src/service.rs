//! Request service: the command surface of the lifecycle engine.
//!
//! Every command resolves the target through the tenant-guarded
//! repository, authorizes the principal, validates the lifecycle edge and
//! commits with a compare-and-set on the request version. The audit entry
//! is written in the same transaction as the mutation.

use chrono::{DateTime, Utc};
use estate_core::error::{EstateError, EstateResult};
use estate_core::models::audit::{AuditAction, AuditLogEntry};
use estate_core::models::principal::Principal;
use estate_core::models::request::{
    CreateServiceRequest, NewServiceRequest, Priority, RequestStatus, RequestUpdate, ServiceRequest,
    ServiceRequestFilter,
};
use estate_core::models::user::Role;
use estate_core::repository::{
    AuditLogRepository, NotificationSink, PaginatedResult, Pagination, ServiceRequestRepository,
    SlaPolicyRepository, UserRepository,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{self, Actor, AuditLogger};
use crate::config::ServiceConfig;
use crate::error::RequestError;
use crate::escalation;
use crate::lifecycle::lifecycle;
use crate::policy::{self, Action};
use crate::validation::validate_new_request;

/// Request service.
///
/// Generic over repository implementations so that the lifecycle engine
/// has no dependency on the database crate.
pub struct RequestService<R, U, A, P, N>
where
    R: ServiceRequestRepository,
    U: UserRepository,
    A: AuditLogRepository,
    P: SlaPolicyRepository,
    N: NotificationSink,
{
    pub(crate) requests: R,
    pub(crate) users: U,
    audit: AuditLogger<A>,
    policies: P,
    pub(crate) notifier: N,
    config: ServiceConfig,
}

impl<R, U, A, P, N> RequestService<R, U, A, P, N>
where
    R: ServiceRequestRepository,
    U: UserRepository,
    A: AuditLogRepository,
    P: SlaPolicyRepository,
    N: NotificationSink,
{
    pub fn new(
        requests: R,
        users: U,
        audit_repo: A,
        policies: P,
        notifier: N,
        config: ServiceConfig,
    ) -> Self {
        Self {
            requests,
            users,
            audit: AuditLogger::new(audit_repo),
            policies,
            notifier,
            config,
        }
    }

    /// Run `fut` within the configured command timeout.
    pub(crate) async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = EstateResult<T>>,
    ) -> EstateResult<T> {
        match tokio::time::timeout(self.config.command_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, "Command timed out");
                Err(EstateError::Timeout {
                    operation: operation.into(),
                })
            }
        }
    }

    /// Open a new request on behalf of `principal`.
    ///
    /// With an idempotency key the request id is derived from
    /// `(tenant, creator, key)`, and a retried create returns the request
    /// the first attempt stored. A replay whose payload differs from the
    /// stored request is rejected.
    pub async fn create_request(
        &self,
        principal: &Principal,
        input: CreateServiceRequest,
        now: DateTime<Utc>,
    ) -> EstateResult<ServiceRequest> {
        self.bounded("create_request", self.create_inner(principal, input, now))
            .await
    }

    async fn create_inner(
        &self,
        principal: &Principal,
        input: CreateServiceRequest,
        now: DateTime<Utc>,
    ) -> EstateResult<ServiceRequest> {
        if !policy::can_create(principal) {
            return Err(EstateError::denied(format!(
                "{} users may not create requests",
                principal.role
            )));
        }
        validate_new_request(&input, &self.config, now)?;

        let kind = input.details.kind();
        let priority = input.priority.unwrap_or_default();
        let window = match self
            .policies
            .get_window(principal.tenant_id, kind, priority)
            .await
        {
            Ok(window) => window,
            Err(EstateError::NotFound { .. }) => {
                return Err(RequestError::MissingSlaWindow { kind, priority }.into());
            }
            Err(e) => return Err(e),
        };

        let id = match &input.idempotency_key {
            Some(key) => idempotent_id(principal, key),
            None => Uuid::new_v4(),
        };
        let replay = input.clone();

        let new_request = NewServiceRequest {
            id,
            tenant_id: principal.tenant_id,
            status: lifecycle(kind).initial,
            priority,
            created_by: principal.user_id,
            unit_ref: input.unit_ref,
            details: input.details,
            idempotency_key: input.idempotency_key,
            escalation_deadline: now + window,
            created_at: now,
        };
        let entry = audit::created_entry(&new_request, Actor::from(principal));

        match self.requests.create_with_audit(new_request, entry).await {
            Ok(request) => {
                info!(
                    tenant_id = %request.tenant_id,
                    request_id = %request.id,
                    kind = %request.kind,
                    priority = %request.priority,
                    deadline = %request.escalation_deadline,
                    "Service request created"
                );
                Ok(request)
            }
            Err(EstateError::AlreadyExists { .. }) => {
                let existing = self.requests.get_by_id(principal.tenant_id, id).await?;
                check_replay(principal, &existing, &replay, priority)?;
                policy::authorize(principal, Action::Read, &existing)?;
                info!(
                    tenant_id = %existing.tenant_id,
                    request_id = %existing.id,
                    "Idempotent create replayed"
                );
                Ok(existing)
            }
            Err(e) => Err(e),
        }
    }

    /// Load a request the principal is allowed to see.
    pub async fn get(&self, principal: &Principal, request_id: Uuid) -> EstateResult<ServiceRequest> {
        self.bounded("get", async {
            let request = self
                .requests
                .get_by_id(principal.tenant_id, request_id)
                .await?;
            policy::authorize(principal, Action::Read, &request)?;
            Ok(request)
        })
        .await
    }

    /// Query requests of the principal's tenant.
    ///
    /// Tenant-role principals only ever see their own requests and
    /// department users only the kind their department serves; a filter
    /// asking for anything else is denied rather than narrowed.
    pub async fn query(
        &self,
        principal: &Principal,
        mut filter: ServiceRequestFilter,
        pagination: Pagination,
    ) -> EstateResult<PaginatedResult<ServiceRequest>> {
        match principal.role {
            Role::SuperUser | Role::Admin => {}
            Role::Tenant => match filter.created_by {
                Some(creator) if creator != principal.user_id => {
                    return Err(EstateError::denied(
                        "tenants may only query their own requests",
                    ));
                }
                _ => filter.created_by = Some(principal.user_id),
            },
            Role::DepartmentUser => {
                let Some(department) = principal.department else {
                    return Err(EstateError::denied("department user without a department"));
                };
                let served = policy::kind_for(department);
                match filter.kind {
                    Some(kind) if !policy::can_read_kind(principal, kind) => {
                        return Err(EstateError::denied(format!(
                            "{department} staff may not query {kind} requests"
                        )));
                    }
                    _ => filter.kind = Some(served),
                }
            }
        }

        self.bounded(
            "query",
            self.requests.list(principal.tenant_id, filter, pagination),
        )
        .await
    }

    /// Move a request along an edge of its kind's state graph.
    ///
    /// `expected_version` is the caller's view of the request; a request
    /// that has moved since is a `Conflict`.
    pub async fn transition(
        &self,
        principal: &Principal,
        request_id: Uuid,
        target: RequestStatus,
        expected_version: Option<u64>,
        now: DateTime<Utc>,
    ) -> EstateResult<ServiceRequest> {
        self.bounded("transition", async {
            let current = self
                .requests
                .get_by_id(principal.tenant_id, request_id)
                .await?;
            policy::authorize(principal, Action::Transition { to: target }, &current)?;
            check_expected_version(&current, expected_version)?;
            lifecycle(current.kind).check(current.status, target)?;

            let at = now.max(current.updated_at);
            let entry = audit::mutation_entry(
                &current,
                Actor::from(principal),
                AuditAction::StatusChanged,
                serde_json::json!({
                    "from": current.status.as_str(),
                    "to": target.as_str(),
                }),
                at,
            );
            let updated = self
                .requests
                .update_if_version_with_audit(
                    principal.tenant_id,
                    request_id,
                    current.version,
                    RequestUpdate {
                        status: Some(target),
                        ..RequestUpdate::at(at)
                    },
                    entry,
                )
                .await?;

            info!(
                tenant_id = %updated.tenant_id,
                request_id = %updated.id,
                from = %current.status,
                to = %target,
                version = updated.version,
                "Service request transitioned"
            );
            Ok(updated)
        })
        .await
    }

    /// Move the escalation deadline of an open request.
    ///
    /// Does not clear an escalation that already happened.
    pub async fn reschedule(
        &self,
        principal: &Principal,
        request_id: Uuid,
        new_deadline: DateTime<Utc>,
        expected_version: Option<u64>,
        now: DateTime<Utc>,
    ) -> EstateResult<ServiceRequest> {
        self.bounded("reschedule", async {
            let current = self
                .requests
                .get_by_id(principal.tenant_id, request_id)
                .await?;
            policy::authorize(principal, Action::Reschedule, &current)?;
            if current.is_terminal() {
                return Err(RequestError::Terminal(current.status).into());
            }
            check_expected_version(&current, expected_version)?;

            let at = now.max(current.updated_at);
            let entry = audit::mutation_entry(
                &current,
                Actor::from(principal),
                AuditAction::Rescheduled,
                serde_json::json!({
                    "from": current.escalation_deadline,
                    "to": new_deadline,
                }),
                at,
            );
            let updated = self
                .requests
                .update_if_version_with_audit(
                    principal.tenant_id,
                    request_id,
                    current.version,
                    RequestUpdate {
                        escalation_deadline: Some(new_deadline),
                        ..RequestUpdate::at(at)
                    },
                    entry,
                )
                .await?;

            info!(
                tenant_id = %updated.tenant_id,
                request_id = %updated.id,
                deadline = %new_deadline,
                "Escalation deadline rescheduled"
            );
            Ok(updated)
        })
        .await
    }

    /// Escalate a request now, ahead of its deadline.
    ///
    /// Takes the same write, audit and notification path as the monitor.
    /// Escalating an already escalated request returns it unchanged.
    pub async fn escalate(
        &self,
        principal: &Principal,
        request_id: Uuid,
        now: DateTime<Utc>,
    ) -> EstateResult<ServiceRequest> {
        self.bounded("escalate", async {
            let current = self
                .requests
                .get_by_id(principal.tenant_id, request_id)
                .await?;
            policy::authorize(principal, Action::Escalate, &current)?;
            if current.is_terminal() {
                return Err(RequestError::Terminal(current.status).into());
            }
            if current.escalated {
                return Ok(current);
            }

            escalation::escalate_request(
                &self.requests,
                &self.notifier,
                &current,
                Actor::from(principal),
                now,
            )
            .await
        })
        .await
    }

    /// The audit trail of a request the principal is allowed to see.
    pub async fn history(
        &self,
        principal: &Principal,
        request_id: Uuid,
    ) -> EstateResult<Vec<AuditLogEntry>> {
        self.bounded("history", async {
            let request = self
                .requests
                .get_by_id(principal.tenant_id, request_id)
                .await?;
            policy::authorize(principal, Action::Read, &request)?;
            self.audit.history(principal.tenant_id, request_id).await
        })
        .await
    }
}

/// Request id for an idempotent create. Two principals sending the same
/// key never collide.
fn idempotent_id(principal: &Principal, key: &str) -> Uuid {
    let namespace = Uuid::new_v5(&principal.tenant_id, principal.user_id.as_bytes());
    Uuid::new_v5(&namespace, key.as_bytes())
}

/// A replayed create must come from the original creator and carry the
/// original payload.
fn check_replay(
    principal: &Principal,
    existing: &ServiceRequest,
    input: &CreateServiceRequest,
    priority: Priority,
) -> EstateResult<()> {
    if existing.created_by != principal.user_id {
        return Err(EstateError::denied("idempotency key belongs to another principal"));
    }
    if existing.details != input.details
        || existing.priority != priority
        || existing.unit_ref != input.unit_ref
    {
        return Err(EstateError::validation(
            "idempotency_key",
            "key was already used for a different request",
        ));
    }
    Ok(())
}

pub(crate) fn check_expected_version(
    request: &ServiceRequest,
    expected_version: Option<u64>,
) -> EstateResult<()> {
    match expected_version {
        Some(expected) if expected != request.version => Err(EstateError::Conflict {
            entity: "service_request".into(),
            id: request.id.to_string(),
        }),
        _ => Ok(()),
    }
}
