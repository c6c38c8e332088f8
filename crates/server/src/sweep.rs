use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;

use signoff_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use signoff_core::engine::WorkflowEngine;
use signoff_db::repositories::{RepositoryError, RequestRepository};

/// Thresholds for the background deadline sweep.
///
/// A request past its due date is escalated; once it stays unresolved for
/// `expire_after` beyond the due date it is expired instead.
#[derive(Clone, Copy, Debug)]
pub struct SweepPolicy {
    pub expire_after: Duration,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub examined: usize,
    pub escalated: usize,
    pub expired: usize,
}

/// One pass over the overdue requests. Each change is saved individually so a
/// failure on one request does not lose the markers already applied.
pub async fn run_sweep_once(
    repository: &dyn RequestRepository,
    audit: &dyn AuditSink,
    policy: SweepPolicy,
    now: DateTime<Utc>,
) -> Result<SweepOutcome, RepositoryError> {
    let engine = WorkflowEngine::new();
    let overdue = repository.list_due_before(now).await?;

    let mut outcome = SweepOutcome { examined: overdue.len(), ..SweepOutcome::default() };
    for mut request in overdue {
        let expiry_cutoff = request.due_date + policy.expire_after;

        let (changed, event_type) = if now > expiry_cutoff {
            (engine.expire(&mut request, now), "sla.request_expired")
        } else {
            (engine.escalate(&mut request, now), "sla.request_escalated")
        };
        if !changed {
            continue;
        }

        let context = AuditContext::new(Some(request.id.clone()), "sweep", "system");
        repository.save(request.clone()).await?;
        audit.emit(
            AuditEvent::new(
                context.request_id,
                context.correlation_id,
                event_type,
                AuditCategory::Sla,
                context.actor,
                AuditOutcome::Success,
            )
            .with_metadata("due_date", request.due_date.to_rfc3339()),
        );

        match event_type {
            "sla.request_expired" => outcome.expired += 1,
            _ => outcome.escalated += 1,
        }
    }

    Ok(outcome)
}

/// Spawn the periodic sweep. The task runs until the server shuts down.
pub fn spawn(
    repository: Arc<dyn RequestRepository>,
    audit: Arc<dyn AuditSink>,
    policy: SweepPolicy,
    interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match run_sweep_once(repository.as_ref(), audit.as_ref(), policy, Utc::now()).await {
                Ok(outcome) if outcome.escalated > 0 || outcome.expired > 0 => {
                    tracing::info!(
                        event_name = "sweep.completed",
                        examined = outcome.examined,
                        escalated = outcome.escalated,
                        expired = outcome.expired,
                        "deadline sweep applied changes"
                    );
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::error!(
                        event_name = "sweep.failed",
                        error = %error,
                        "deadline sweep pass failed"
                    );
                }
            }
        }
    })
}
