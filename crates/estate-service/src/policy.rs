//! Authorization policy for request commands.
//!
//! `can_perform` is a pure function of the acting principal, the action
//! and the target request. Tenant isolation is checked first: a principal
//! of another tenant can do nothing, whatever its role.

use estate_core::error::{EstateError, EstateResult};
use estate_core::models::principal::Principal;
use estate_core::models::request::{RequestKind, RequestStatus, ServiceRequest};
use estate_core::models::user::{Department, Role, User, UserStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Read,
    Assign,
    Transition { to: RequestStatus },
    Reschedule,
    Escalate,
}

/// The staff department that handles requests of `kind`.
pub fn department_for(kind: RequestKind) -> Department {
    match kind {
        RequestKind::Maintenance => Department::Maintenance,
        RequestKind::Taxi => Department::Taxi,
        RequestKind::Contact => Department::Leasing,
    }
}

/// The request kind a department serves.
pub fn kind_for(department: Department) -> RequestKind {
    match department {
        Department::Maintenance => RequestKind::Maintenance,
        Department::Taxi => RequestKind::Taxi,
        Department::Leasing => RequestKind::Contact,
    }
}

/// Whether `principal` may open new requests in its tenant.
pub fn can_create(principal: &Principal) -> bool {
    matches!(principal.role, Role::Tenant | Role::Admin)
}

/// Whether `principal` may see requests of `kind` at all.
pub fn can_read_kind(principal: &Principal, kind: RequestKind) -> bool {
    match principal.role {
        Role::DepartmentUser => principal.department == Some(department_for(kind)),
        _ => true,
    }
}

pub fn can_perform(principal: &Principal, action: Action, request: &ServiceRequest) -> bool {
    if principal.tenant_id != request.tenant_id {
        return false;
    }

    let is_creator = request.created_by == principal.user_id;
    let is_assignee = request.assigned_to == Some(principal.user_id);

    match action {
        Action::Create => can_create(principal),
        Action::Read => match principal.role {
            Role::SuperUser | Role::Admin => true,
            Role::Tenant => is_creator,
            Role::DepartmentUser => can_read_kind(principal, request.kind),
        },
        Action::Assign | Action::Reschedule | Action::Escalate => principal.role.is_manager(),
        Action::Transition { to } => match principal.role {
            Role::SuperUser | Role::Admin => true,
            Role::DepartmentUser => is_assignee,
            Role::Tenant => is_creator && to == RequestStatus::Cancelled,
        },
    }
}

/// [`can_perform`] as a guard returning `AuthorizationDenied`.
pub fn authorize(
    principal: &Principal,
    action: Action,
    request: &ServiceRequest,
) -> EstateResult<()> {
    if can_perform(principal, action, request) {
        Ok(())
    } else {
        Err(EstateError::denied(format!(
            "{} may not perform {action:?} on {} request {}",
            principal.role, request.kind, request.id
        )))
    }
}

/// Eligibility of `user` to be assigned a request of `kind`.
///
/// Admins take any kind; department users only the kind their department
/// serves. Inactive users are never eligible.
pub fn is_eligible_assignee(user: &User, kind: RequestKind) -> bool {
    if user.status != UserStatus::Active {
        return false;
    }
    match user.role {
        Role::Admin => true,
        Role::DepartmentUser => user.department == Some(department_for(kind)),
        Role::SuperUser | Role::Tenant => false,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use estate_core::models::request::{Priority, RequestDetails};
    use uuid::Uuid;

    use super::*;

    fn taxi_request(tenant_id: Uuid, created_by: Uuid) -> ServiceRequest {
        let now = Utc::now();
        ServiceRequest {
            id: Uuid::new_v4(),
            tenant_id,
            kind: RequestKind::Taxi,
            status: RequestStatus::Pending,
            priority: Priority::Medium,
            created_by,
            assigned_to: None,
            unit_ref: Some("12C".into()),
            details: RequestDetails::Taxi {
                pickup_location: "Lobby".into(),
                destination: "Airport".into(),
                pickup_time: now + Duration::hours(1),
            },
            idempotency_key: None,
            escalation_deadline: now + Duration::minutes(30),
            escalated: false,
            escalated_at: None,
            escalation_notified_at: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn user(role: Role, department: Option<Department>) -> User {
        User {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Lee".into(),
            email: "lee@example.com".into(),
            role,
            department,
            status: UserStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn other_tenant_can_do_nothing() {
        let request = taxi_request(Uuid::new_v4(), Uuid::new_v4());
        let admin = Principal::new(Uuid::new_v4(), Uuid::new_v4(), Role::SuperUser);
        for action in [
            Action::Read,
            Action::Assign,
            Action::Reschedule,
            Action::Escalate,
            Action::Transition {
                to: RequestStatus::Cancelled,
            },
        ] {
            assert!(!can_perform(&admin, action, &request), "{action:?}");
        }
    }

    #[test]
    fn tenant_reads_and_cancels_only_own_requests() {
        let tenant_id = Uuid::new_v4();
        let owner = Principal::new(tenant_id, Uuid::new_v4(), Role::Tenant);
        let neighbour = Principal::new(tenant_id, Uuid::new_v4(), Role::Tenant);
        let request = taxi_request(tenant_id, owner.user_id);

        assert!(can_perform(&owner, Action::Read, &request));
        assert!(!can_perform(&neighbour, Action::Read, &request));

        let cancel = Action::Transition {
            to: RequestStatus::Cancelled,
        };
        assert!(can_perform(&owner, cancel, &request));
        assert!(!can_perform(&neighbour, cancel, &request));
        assert!(!can_perform(
            &owner,
            Action::Transition {
                to: RequestStatus::Completed
            },
            &request
        ));
        assert!(!can_perform(&owner, Action::Assign, &request));
    }

    #[test]
    fn department_user_transitions_only_when_assigned() {
        let tenant_id = Uuid::new_v4();
        let driver = Principal::new(tenant_id, Uuid::new_v4(), Role::DepartmentUser)
            .with_department(Department::Taxi);
        let mut request = taxi_request(tenant_id, Uuid::new_v4());
        let complete = Action::Transition {
            to: RequestStatus::Completed,
        };

        assert!(can_perform(&driver, Action::Read, &request));
        assert!(!can_perform(&driver, complete, &request));

        request.assigned_to = Some(driver.user_id);
        assert!(can_perform(&driver, complete, &request));
    }

    #[test]
    fn department_user_reads_only_its_kind() {
        let tenant_id = Uuid::new_v4();
        let plumber = Principal::new(tenant_id, Uuid::new_v4(), Role::DepartmentUser)
            .with_department(Department::Maintenance);
        let request = taxi_request(tenant_id, Uuid::new_v4());
        assert!(!can_perform(&plumber, Action::Read, &request));
    }

    #[test]
    fn only_tenants_and_admins_create() {
        let tenant_id = Uuid::new_v4();
        assert!(can_create(&Principal::new(tenant_id, Uuid::new_v4(), Role::Tenant)));
        assert!(can_create(&Principal::new(tenant_id, Uuid::new_v4(), Role::Admin)));
        assert!(!can_create(&Principal::new(
            tenant_id,
            Uuid::new_v4(),
            Role::SuperUser
        )));
        assert!(!can_create(
            &Principal::new(tenant_id, Uuid::new_v4(), Role::DepartmentUser)
                .with_department(Department::Taxi)
        ));
    }

    #[test]
    fn eligibility_follows_department() {
        let driver = user(Role::DepartmentUser, Some(Department::Taxi));
        let leasing = user(Role::DepartmentUser, Some(Department::Leasing));
        let admin = user(Role::Admin, None);
        let resident = user(Role::Tenant, None);

        assert!(is_eligible_assignee(&driver, RequestKind::Taxi));
        assert!(!is_eligible_assignee(&driver, RequestKind::Maintenance));
        assert!(is_eligible_assignee(&leasing, RequestKind::Contact));
        assert!(is_eligible_assignee(&admin, RequestKind::Maintenance));
        assert!(!is_eligible_assignee(&resident, RequestKind::Taxi));
    }

    #[test]
    fn departments_and_kinds_pair_up() {
        for kind in RequestKind::ALL {
            assert_eq!(kind_for(department_for(kind)), kind);
        }
    }

    #[test]
    fn inactive_users_are_never_eligible() {
        let mut admin = user(Role::Admin, None);
        admin.status = UserStatus::Inactive;
        for kind in RequestKind::ALL {
            assert!(!is_eligible_assignee(&admin, kind));
        }
    }
}
