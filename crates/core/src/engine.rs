use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::chain::StepStatus;
use crate::domain::request::{ApprovalRequest, RequestStatus};

/// A reviewer's verdict on the active step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

/// What a decision did to the request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub level: u32,
    pub step_status: StepStatus,
    pub request_status: RequestStatus,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("request {request_id} has no pending step to act on")]
    InvalidStepTransition { request_id: String },
    #[error("request {request_id}: `{actor}` is not the active approver (expected `{expected}`)")]
    ApproverMismatch { request_id: String, actor: String, expected: String },
}

/// Applies decisions to a request's chain and keeps the derived fields
/// (timestamps, turnaround, status) consistent.
///
/// Stateless by design: every method takes the request and the clock
/// explicitly, so callers control time in tests and replay scenarios.
#[derive(Clone, Copy, Debug, Default)]
pub struct WorkflowEngine;

impl WorkflowEngine {
    pub fn new() -> Self {
        Self
    }

    /// Record `actor`'s decision on the active step of `request`.
    ///
    /// Fails when no step is pending (the chain is terminal) or when the
    /// actor is not the approver the active step names. Actor comparison is
    /// case-insensitive; the stored approver spelling is authoritative.
    pub fn decide(
        &self,
        request: &mut ApprovalRequest,
        actor: &str,
        decision: Decision,
        comments: String,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, EngineError> {
        let (level, expected) = match request.chain.active_step() {
            Some(step) => (step.level, step.approver.clone()),
            None => {
                return Err(EngineError::InvalidStepTransition {
                    request_id: request.id.0.clone(),
                })
            }
        };

        if !actor.trim().eq_ignore_ascii_case(expected.trim()) {
            return Err(EngineError::ApproverMismatch {
                request_id: request.id.0.clone(),
                actor: actor.to_string(),
                expected,
            });
        }

        let turnaround = self.turnaround_secs(request, now);
        let step_status = match decision {
            Decision::Approve => {
                request.chain.approve_active(now, comments, turnaround);
                StepStatus::Approved
            }
            Decision::Reject => {
                request.chain.reject_active(now, comments, turnaround);
                StepStatus::Rejected
            }
        };
        request.updated_at = now;

        Ok(DecisionOutcome { level, step_status, request_status: request.status() })
    }

    /// Same as [`decide`](Self::decide), emitting an audit event for both the
    /// applied and the refused case.
    pub fn decide_with_audit(
        &self,
        request: &mut ApprovalRequest,
        decision: Decision,
        comments: String,
        now: DateTime<Utc>,
        sink: &dyn AuditSink,
        context: &AuditContext,
    ) -> Result<DecisionOutcome, EngineError> {
        match self.decide(request, &context.actor, decision, comments, now) {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        context.request_id.clone(),
                        context.correlation_id.clone(),
                        format!("workflow.step_{}", outcome.step_status.as_str()),
                        AuditCategory::Workflow,
                        context.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("level", outcome.level.to_string())
                    .with_metadata("request_status", outcome.request_status.as_str()),
                );
                Ok(outcome)
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        context.request_id.clone(),
                        context.correlation_id.clone(),
                        "workflow.decision_refused",
                        AuditCategory::Workflow,
                        context.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("decision", decision.as_str())
                    .with_metadata("error", error.to_string()),
                );
                Err(error)
            }
        }
    }

    /// Mark an overdue open request as escalated. Returns whether the marker
    /// was set; terminal and already-escalated requests are left untouched.
    pub fn escalate(&self, request: &mut ApprovalRequest, now: DateTime<Utc>) -> bool {
        if request.chain.is_terminal() || request.escalated_at.is_some() {
            return false;
        }
        request.escalated_at = Some(now);
        request.updated_at = now;
        true
    }

    /// Expire an open request whose due date has passed. Returns whether the
    /// marker was set.
    pub fn expire(&self, request: &mut ApprovalRequest, now: DateTime<Utc>) -> bool {
        if request.chain.is_terminal() || request.expired_at.is_some() {
            return false;
        }
        if now <= request.due_date {
            return false;
        }
        request.expired_at = Some(now);
        request.updated_at = now;
        true
    }

    /// Seconds the active step has been waiting: since the previous decision,
    /// or since submission for the first step. Clamped at zero against clock
    /// skew in stored timestamps.
    fn turnaround_secs(&self, request: &ApprovalRequest, now: DateTime<Utc>) -> i64 {
        let since = request.chain.last_action_date().unwrap_or(request.request_date);
        (now - since).num_seconds().max(0)
    }
}
