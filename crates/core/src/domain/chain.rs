use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of a single sign-off slot.
///
/// `Queued` steps are waiting for their turn; exactly one step is `Pending`
/// while the chain is open, which is what keeps sequential review enforceable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Queued,
    Pending,
    Approved,
    Rejected,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Skipped => "skipped",
        }
    }
}

impl std::str::FromStr for StepStatus {
    type Err = ChainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "queued" => Ok(Self::Queued),
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "skipped" => Ok(Self::Skipped),
            other => Err(ChainError::UnknownStepStatus(other.to_string())),
        }
    }
}

/// One reviewer slot used when opening a new chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reviewer {
    pub approver: String,
    pub role: String,
}

impl Reviewer {
    pub fn new(approver: impl Into<String>, role: impl Into<String>) -> Self {
        Self { approver: approver.into(), role: role.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub level: u32,
    pub approver: String,
    pub role: String,
    pub status: StepStatus,
    pub action_date: Option<DateTime<Utc>>,
    pub comments: Option<String>,
    pub turnaround_secs: Option<i64>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("approval chain must contain at least one step")]
    Empty,
    #[error("step levels must be positive")]
    ZeroLevel,
    #[error("step level {0} appears more than once in the chain")]
    DuplicateLevel(u32),
    #[error("chain holds {0} pending steps; sequential review allows at most one")]
    MultiplePending(usize),
    #[error("step statuses violate sequential review order")]
    OutOfOrder,
    #[error("unknown step status `{0}`")]
    UnknownStepStatus(String),
}

/// Ordered sequence of sign-offs for one request.
///
/// Steps are kept sorted ascending by `level`. The invariants (at most one
/// `Pending` step, resolved prefix before it, `Queued` suffix after it,
/// everything after a rejection `Skipped`) hold for every value of this type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalChain {
    steps: Vec<ApprovalStep>,
}

impl ApprovalChain {
    /// Open a fresh chain: the first reviewer is `Pending`, the rest `Queued`.
    pub fn open(reviewers: Vec<Reviewer>) -> Result<Self, ChainError> {
        if reviewers.is_empty() {
            return Err(ChainError::Empty);
        }

        let steps = reviewers
            .into_iter()
            .enumerate()
            .map(|(index, reviewer)| ApprovalStep {
                level: index as u32 + 1,
                approver: reviewer.approver,
                role: reviewer.role,
                status: if index == 0 { StepStatus::Pending } else { StepStatus::Queued },
                action_date: None,
                comments: None,
                turnaround_secs: None,
            })
            .collect();

        Ok(Self { steps })
    }

    /// Rehydrate a chain from stored steps, re-checking every invariant.
    pub fn from_steps(mut steps: Vec<ApprovalStep>) -> Result<Self, ChainError> {
        steps.sort_by_key(|step| step.level);
        validate(&steps)?;
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[ApprovalStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The single step currently awaiting a decision, if the chain is open.
    pub fn active_step(&self) -> Option<&ApprovalStep> {
        self.steps.iter().find(|step| step.status == StepStatus::Pending)
    }

    pub fn is_rejected(&self) -> bool {
        self.steps.iter().any(|step| step.status == StepStatus::Rejected)
    }

    pub fn is_complete(&self) -> bool {
        !self.is_rejected()
            && self
                .steps
                .iter()
                .all(|step| matches!(step.status, StepStatus::Approved | StepStatus::Skipped))
    }

    pub fn is_terminal(&self) -> bool {
        self.is_rejected() || self.is_complete()
    }

    /// Latest decision timestamp across resolved steps.
    pub fn last_action_date(&self) -> Option<DateTime<Utc>> {
        self.steps.iter().filter_map(|step| step.action_date).max()
    }

    fn active_index(&self) -> Option<usize> {
        self.steps.iter().position(|step| step.status == StepStatus::Pending)
    }

    pub(crate) fn approve_active(
        &mut self,
        now: DateTime<Utc>,
        comments: String,
        turnaround_secs: i64,
    ) {
        if let Some(index) = self.active_index() {
            let step = &mut self.steps[index];
            step.status = StepStatus::Approved;
            step.action_date = Some(now);
            step.comments = Some(comments);
            step.turnaround_secs = Some(turnaround_secs);

            if let Some(next) = self.steps.get_mut(index + 1) {
                if next.status == StepStatus::Queued {
                    next.status = StepStatus::Pending;
                }
            }
        }
    }

    pub(crate) fn reject_active(
        &mut self,
        now: DateTime<Utc>,
        comments: String,
        turnaround_secs: i64,
    ) {
        if let Some(index) = self.active_index() {
            let step = &mut self.steps[index];
            step.status = StepStatus::Rejected;
            step.action_date = Some(now);
            step.comments = Some(comments);
            step.turnaround_secs = Some(turnaround_secs);

            for remaining in &mut self.steps[index + 1..] {
                if matches!(remaining.status, StepStatus::Queued | StepStatus::Pending) {
                    remaining.status = StepStatus::Skipped;
                }
            }
        }
    }
}

fn validate(steps: &[ApprovalStep]) -> Result<(), ChainError> {
    if steps.is_empty() {
        return Err(ChainError::Empty);
    }

    let mut seen_levels = HashSet::new();
    for step in steps {
        if step.level == 0 {
            return Err(ChainError::ZeroLevel);
        }
        if !seen_levels.insert(step.level) {
            return Err(ChainError::DuplicateLevel(step.level));
        }
    }

    let pending = steps.iter().filter(|step| step.status == StepStatus::Pending).count();
    if pending > 1 {
        return Err(ChainError::MultiplePending(pending));
    }

    // Walk the chain in level order: resolved prefix, then at most one
    // pending step, then only queued steps; after a rejection only skipped.
    enum Phase {
        Resolved,
        Waiting,
        Halted,
    }

    let mut phase = Phase::Resolved;
    for step in steps {
        match (&phase, step.status) {
            (Phase::Resolved, StepStatus::Approved | StepStatus::Skipped) => {}
            (Phase::Resolved, StepStatus::Pending) => phase = Phase::Waiting,
            (Phase::Resolved, StepStatus::Rejected) => phase = Phase::Halted,
            (Phase::Waiting, StepStatus::Queued) => {}
            (Phase::Halted, StepStatus::Skipped) => {}
            _ => return Err(ChainError::OutOfOrder),
        }
    }

    Ok(())
}
