//! Per-kind lifecycle tables.
//!
//! Each request kind has a fixed state graph. Command transitions follow
//! `edges`; `on_assign` is the one edge taken only by the assignment
//! resolver, in the same write that binds the assignee.

use estate_core::error::{EstateError, EstateResult};
use estate_core::models::request::{RequestKind, RequestStatus};

use RequestStatus::*;

#[derive(Debug)]
pub struct Lifecycle {
    pub kind: RequestKind,
    pub initial: RequestStatus,
    edges: &'static [(RequestStatus, RequestStatus)],
    on_assign: Option<(RequestStatus, RequestStatus)>,
}

// No cancel path: maintenance tickets must be resolved.
static MAINTENANCE: Lifecycle = Lifecycle {
    kind: RequestKind::Maintenance,
    initial: Open,
    edges: &[(Open, InProgress), (InProgress, Resolved)],
    on_assign: None,
};

static TAXI: Lifecycle = Lifecycle {
    kind: RequestKind::Taxi,
    initial: Pending,
    edges: &[
        (Assigned, Completed),
        (Pending, Cancelled),
        (Assigned, Cancelled),
    ],
    on_assign: Some((Pending, Assigned)),
};

static CONTACT: Lifecycle = Lifecycle {
    kind: RequestKind::Contact,
    initial: New,
    edges: &[(New, InProgress), (InProgress, Resolved)],
    on_assign: None,
};

pub fn lifecycle(kind: RequestKind) -> &'static Lifecycle {
    match kind {
        RequestKind::Maintenance => &MAINTENANCE,
        RequestKind::Taxi => &TAXI,
        RequestKind::Contact => &CONTACT,
    }
}

impl Lifecycle {
    /// Whether a command may move a request from `from` to `to`.
    pub fn allows(&self, from: RequestStatus, to: RequestStatus) -> bool {
        self.edges.contains(&(from, to))
    }

    pub fn check(&self, from: RequestStatus, to: RequestStatus) -> EstateResult<()> {
        if self.allows(from, to) {
            Ok(())
        } else {
            Err(EstateError::InvalidTransition {
                kind: self.kind.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }

    /// Status an assignment moves the request to, if any.
    pub fn status_on_assign(&self, current: RequestStatus) -> Option<RequestStatus> {
        self.on_assign
            .filter(|(from, _)| *from == current)
            .map(|(_, to)| to)
    }

    /// Every status reachable in this lifecycle.
    pub fn statuses(&self) -> Vec<RequestStatus> {
        let mut statuses = vec![self.initial];
        let edges = self.edges.iter().chain(self.on_assign.iter());
        for (from, to) in edges {
            for status in [*from, *to] {
                if !statuses.contains(&status) {
                    statuses.push(status);
                }
            }
        }
        statuses
    }
}
