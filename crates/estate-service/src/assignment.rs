//! Assignment resolver.
//!
//! Binds a request to an eligible staff member of the same tenant. The
//! caller's view of the current assignee is checked against the row read
//! just before the write, and the write itself is a compare-and-set on the
//! version of that row. Any assignment committed in between bumps the
//! version, so of two concurrent assignments at most one commits. Where
//! the kind has an assigned status the status change rides in the same
//! write.

use chrono::{DateTime, Utc};
use estate_core::error::{EstateError, EstateResult};
use estate_core::models::audit::AuditAction;
use estate_core::models::notification::{NotificationKind, assignment_key};
use estate_core::models::principal::Principal;
use estate_core::models::request::{RequestUpdate, ServiceRequest};
use estate_core::repository::{
    AuditLogRepository, NotificationSink, ServiceRequestRepository, SlaPolicyRepository,
    UserRepository,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{self, Actor};
use crate::error::RequestError;
use crate::lifecycle::lifecycle;
use crate::policy::{self, Action};
use crate::service::RequestService;

impl<R, U, A, P, N> RequestService<R, U, A, P, N>
where
    R: ServiceRequestRepository,
    U: UserRepository,
    A: AuditLogRepository,
    P: SlaPolicyRepository,
    N: NotificationSink,
{
    /// Assign `request_id` to `assignee_id`.
    ///
    /// `expected_assignee` is who the caller believes currently holds the
    /// request (`None`: unassigned). It is compared with the freshly read
    /// row; only the version is guarded by the write. If someone else got
    /// there first the caller receives `Conflict` and must re-read.
    pub async fn assign(
        &self,
        principal: &Principal,
        request_id: Uuid,
        assignee_id: Uuid,
        expected_assignee: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> EstateResult<ServiceRequest> {
        self.bounded("assign", async {
            let current = self
                .requests
                .get_by_id(principal.tenant_id, request_id)
                .await?;
            policy::authorize(principal, Action::Assign, &current)?;
            if current.is_terminal() {
                return Err(RequestError::Terminal(current.status).into());
            }

            // NotFound for an unknown user, AuthorizationDenied for a
            // user of another tenant.
            let assignee = self.users.get_by_id(principal.tenant_id, assignee_id).await?;
            if !policy::is_eligible_assignee(&assignee, current.kind) {
                return Err(EstateError::denied(format!(
                    "user {assignee_id} is not eligible for {} requests",
                    current.kind
                )));
            }

            if current.assigned_to != expected_assignee {
                return Err(EstateError::Conflict {
                    entity: "service_request".into(),
                    id: request_id.to_string(),
                });
            }

            let at = now.max(current.updated_at);
            let status = lifecycle(current.kind).status_on_assign(current.status);
            let entry = audit::mutation_entry(
                &current,
                Actor::from(principal),
                AuditAction::Assigned,
                serde_json::json!({
                    "assignee": assignee_id,
                    "previous": current.assigned_to,
                    "status": status.unwrap_or(current.status).as_str(),
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
                        status,
                        assigned_to: Some(assignee_id),
                        ..RequestUpdate::at(at)
                    },
                    entry,
                )
                .await?;

            info!(
                tenant_id = %updated.tenant_id,
                request_id = %updated.id,
                assignee = %assignee_id,
                status = %updated.status,
                "Service request assigned"
            );

            self.notify_assigned(&updated).await;
            Ok(updated)
        })
        .await
    }

    /// Best effort: the assignment has committed either way.
    async fn notify_assigned(&self, request: &ServiceRequest) {
        let key = assignment_key(request.id, request.version);
        let payload = serde_json::json!({
            "request_id": request.id,
            "kind": request.kind.as_str(),
            "assignee": request.assigned_to,
            "status": request.status.as_str(),
        });

        if let Err(e) = self
            .notifier
            .notify(request.tenant_id, NotificationKind::Assigned, &key, payload)
            .await
        {
            warn!(
                tenant_id = %request.tenant_id,
                request_id = %request.id,
                error = %e,
                "Assignment notification not delivered"
            );
        }
    }
}
