//! SLA escalation monitor.
//!
//! A sweep picks up every non-terminal, unescalated request of one tenant
//! whose deadline has passed and escalates it with a conditional write
//! guarded by the request version. Concurrent sweeps therefore escalate a
//! request at most once; the loser's write finds a newer version and is
//! skipped. Because candidates are selected by `deadline <= now` rather
//! than a time window, a sweep after any outage catches up on everything
//! it missed.
//!
//! The notification key is derived from the request and its deadline, so
//! a notification that has to be resent after a failure is deduplicated
//! by the dispatcher.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use estate_core::error::{EstateError, EstateResult};
use estate_core::models::audit::AuditAction;
use estate_core::models::notification::{NotificationKind, escalation_key};
use estate_core::models::request::{RequestUpdate, ServiceRequest};
use estate_core::repository::{
    NotificationSink, Pagination, ServiceRequestRepository, TenantRepository,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::{self, Actor};
use crate::config::ServiceConfig;

/// Outcome of one sweep over one tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub tenant_id: Uuid,
    /// Overdue candidates examined.
    pub scanned: usize,
    /// Candidates this sweep escalated.
    pub escalated: usize,
    /// Earlier escalations whose notification was sent again.
    pub renotified: usize,
    /// Candidates another writer changed first.
    pub skipped: usize,
    /// Candidates left for the next sweep after a store or notifier error.
    pub failed: usize,
}

impl SweepReport {
    fn new(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            ..Default::default()
        }
    }
}

/// Flip `escalated` together with its audit entry, then notify.
///
/// If the audit entry cannot be written the flag is not set either and
/// the request stays a candidate. A notification failure does not undo
/// the escalation: the request is left with `escalation_notified_at`
/// unset and the next sweep sends the notification again under the same
/// key.
pub(crate) async fn escalate_request<R, N>(
    requests: &R,
    notifier: &N,
    request: &ServiceRequest,
    actor: Actor,
    now: DateTime<Utc>,
) -> EstateResult<ServiceRequest>
where
    R: ServiceRequestRepository,
    N: NotificationSink,
{
    let at = now.max(request.updated_at);
    let entry = audit::mutation_entry(
        request,
        actor,
        AuditAction::Escalated,
        serde_json::json!({
            "deadline": request.escalation_deadline,
            "priority": request.priority.as_str(),
            "status": request.status.as_str(),
        }),
        at,
    );
    let updated = requests
        .update_if_version_with_audit(
            request.tenant_id,
            request.id,
            request.version,
            RequestUpdate {
                escalated_at: Some(at),
                ..RequestUpdate::at(at)
            },
            entry,
        )
        .await?;

    info!(
        tenant_id = %updated.tenant_id,
        request_id = %updated.id,
        kind = %updated.kind,
        deadline = %updated.escalation_deadline,
        actor = ?actor.actor_type(),
        "Service request escalated"
    );

    match deliver_escalation(requests, notifier, &updated, now).await {
        Ok(at) => Ok(ServiceRequest {
            escalation_notified_at: Some(at),
            ..updated
        }),
        Err(e) => {
            warn!(
                tenant_id = %updated.tenant_id,
                request_id = %updated.id,
                error = %e,
                "Escalation notification deferred to next sweep"
            );
            Ok(updated)
        }
    }
}

/// Hand the escalation to the notifier and record that it was accepted.
async fn deliver_escalation<R, N>(
    requests: &R,
    notifier: &N,
    request: &ServiceRequest,
    now: DateTime<Utc>,
) -> EstateResult<DateTime<Utc>>
where
    R: ServiceRequestRepository,
    N: NotificationSink,
{
    let key = escalation_key(request.id, request.escalation_deadline);
    let payload = serde_json::json!({
        "request_id": request.id,
        "kind": request.kind.as_str(),
        "priority": request.priority.as_str(),
        "status": request.status.as_str(),
        "assignee": request.assigned_to,
        "deadline": request.escalation_deadline,
        "escalated_at": request.escalated_at,
    });

    notifier
        .notify(request.tenant_id, NotificationKind::Escalated, &key, payload)
        .await?;
    requests
        .mark_escalation_notified(request.tenant_id, request.id, now)
        .await?;
    Ok(now)
}

struct MonitorInner<T, R, N>
where
    T: TenantRepository,
    R: ServiceRequestRepository,
    N: NotificationSink,
{
    tenants: T,
    requests: R,
    notifier: N,
    config: ServiceConfig,
}

/// Periodic escalation of overdue requests, one worker per tenant.
pub struct EscalationMonitor<T, R, N>
where
    T: TenantRepository,
    R: ServiceRequestRepository,
    N: NotificationSink,
{
    inner: Arc<MonitorInner<T, R, N>>,
}

impl<T, R, N> Clone for EscalationMonitor<T, R, N>
where
    T: TenantRepository,
    R: ServiceRequestRepository,
    N: NotificationSink,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, R, N> EscalationMonitor<T, R, N>
where
    T: TenantRepository,
    R: ServiceRequestRepository,
    N: NotificationSink,
{
    pub fn new(tenants: T, requests: R, notifier: N, config: ServiceConfig) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                tenants,
                requests,
                notifier,
                config,
            }),
        }
    }

    /// Run one sweep over `tenant_id` as of `now`.
    ///
    /// Fails only when the candidate list itself cannot be read; errors on
    /// individual candidates are logged, counted and left for the next
    /// sweep.
    pub async fn sweep_tenant(&self, tenant_id: Uuid, now: DateTime<Utc>) -> EstateResult<SweepReport> {
        let inner = &*self.inner;
        let batch = inner.config.sweep_batch_size;
        let mut report = SweepReport::new(tenant_id);

        match inner
            .requests
            .list_unnotified_escalations(tenant_id, batch)
            .await
        {
            Ok(pending) => {
                for request in pending {
                    match deliver_escalation(&inner.requests, &inner.notifier, &request, now).await {
                        Ok(_) => report.renotified += 1,
                        Err(e) => {
                            warn!(
                                %tenant_id,
                                request_id = %request.id,
                                error = %e,
                                "Escalation notification still undelivered"
                            );
                            report.failed += 1;
                        }
                    }
                }
            }
            Err(e) => {
                warn!(%tenant_id, error = %e, "Could not list undelivered escalations");
                report.failed += 1;
            }
        }

        let candidates = inner.requests.list_overdue(tenant_id, now, batch).await?;
        report.scanned = candidates.len();

        for candidate in candidates {
            match escalate_request(
                &inner.requests,
                &inner.notifier,
                &candidate,
                Actor::System,
                now,
            )
            .await
            {
                Ok(_) => report.escalated += 1,
                Err(EstateError::Conflict { .. }) => {
                    debug!(
                        %tenant_id,
                        request_id = %candidate.id,
                        "Request changed concurrently; escalation skipped"
                    );
                    report.skipped += 1;
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        %tenant_id,
                        request_id = %candidate.id,
                        error = %e,
                        "Escalation failed; will retry next sweep"
                    );
                    report.failed += 1;
                }
                Err(e) => {
                    error!(
                        %tenant_id,
                        request_id = %candidate.id,
                        error = %e,
                        "Escalation rejected"
                    );
                    report.failed += 1;
                }
            }
        }

        if report.scanned > 0 || report.renotified > 0 || report.failed > 0 {
            info!(
                %tenant_id,
                scanned = report.scanned,
                escalated = report.escalated,
                renotified = report.renotified,
                skipped = report.skipped,
                failed = report.failed,
                "Escalation sweep finished"
            );
        }

        Ok(report)
    }

    /// Every registered tenant id.
    async fn tenant_ids(&self) -> EstateResult<Vec<Uuid>> {
        let mut pagination = Pagination::default();
        let mut ids = Vec::new();

        loop {
            let page = self.inner.tenants.list(pagination.clone()).await?;
            let fetched = page.items.len() as u64;
            ids.extend(page.items.into_iter().map(|t| t.id));
            pagination.offset += fetched;
            if fetched == 0 || pagination.offset >= page.total {
                break;
            }
        }

        Ok(ids)
    }
}

impl<T, R, N> EscalationMonitor<T, R, N>
where
    T: TenantRepository + 'static,
    R: ServiceRequestRepository + 'static,
    N: NotificationSink + 'static,
{
    /// Supervise one sweep worker per tenant until `shutdown` turns true.
    ///
    /// The tenant list is refreshed periodically and a worker is started
    /// for every tenant without a live one, so a tenant's backlog never
    /// delays another tenant's sweep.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut workers: HashMap<Uuid, JoinHandle<()>> = HashMap::new();
        let mut refresh = tokio::time::interval(self.inner.config.tenant_refresh_interval());
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            sweep_interval_secs = self.inner.config.sweep_interval_secs,
            tenant_refresh_secs = self.inner.config.tenant_refresh_secs,
            "Escalation monitor started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = refresh.tick() => {
                    match self.tenant_ids().await {
                        Ok(ids) => {
                            for tenant_id in ids {
                                let alive = workers
                                    .get(&tenant_id)
                                    .is_some_and(|handle| !handle.is_finished());
                                if !alive {
                                    let handle = self.spawn_worker(tenant_id, shutdown.clone());
                                    workers.insert(tenant_id, handle);
                                }
                            }
                        }
                        Err(e) => warn!(error = %e, "Could not refresh tenant list"),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        for (tenant_id, handle) in workers {
            if let Err(e) = handle.await {
                warn!(%tenant_id, error = %e, "Escalation worker ended abnormally");
            }
        }
        info!("Escalation monitor stopped");
    }

    fn spawn_worker(&self, tenant_id: Uuid, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let monitor = self.clone();
        debug!(%tenant_id, "Starting escalation worker");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.inner.config.sweep_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                if *shutdown.borrow() {
                    break;
                }

                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = monitor.sweep_tenant(tenant_id, Utc::now()).await {
                            warn!(%tenant_id, error = %e, "Escalation sweep failed");
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }

            debug!(%tenant_id, "Escalation worker stopped");
        })
    }
}
