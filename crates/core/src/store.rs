use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::actions::{ApproveCommand, CommentCommand, RejectCommand, ValidationError};
use crate::domain::request::{ApprovalRequest, Comment, Priority, RequestStatus, RequestType};
use crate::engine::{Decision, DecisionOutcome, EngineError, WorkflowEngine};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("request `{0}` not found")]
    NotFound(String),
    #[error("request `{0}` already exists")]
    Duplicate(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Structured filter over the stored requests. All criteria are optional and
/// combine with AND.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestQuery {
    pub status: Option<RequestStatus>,
    pub request_type: Option<RequestType>,
    pub priority: Option<Priority>,
}

impl RequestQuery {
    pub fn matches(&self, request: &ApprovalRequest) -> bool {
        self.status.map_or(true, |status| request.status() == status)
            && self.request_type.map_or(true, |kind| request.request_type == kind)
            && self.priority.map_or(true, |priority| request.priority == priority)
    }
}

/// In-memory collection of approval requests with insertion order preserved.
///
/// Mutations go through clone-then-commit: the engine works on a copy and the
/// stored request is replaced only after the whole operation succeeds, so a
/// failed decision never leaves a half-updated record behind.
#[derive(Clone, Debug, Default)]
pub struct RequestStore {
    engine: WorkflowEngine,
    requests: Vec<ApprovalRequest>,
    by_id: HashMap<String, usize>,
}

impl RequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_requests(requests: Vec<ApprovalRequest>) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for request in requests {
            store.insert(request)?;
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn insert(&mut self, request: ApprovalRequest) -> Result<(), StoreError> {
        if self.by_id.contains_key(&request.id.0) {
            return Err(StoreError::Duplicate(request.id.0.clone()));
        }
        self.by_id.insert(request.id.0.clone(), self.requests.len());
        self.requests.push(request);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ApprovalRequest> {
        self.by_id.get(id).map(|&index| &self.requests[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ApprovalRequest> {
        self.requests.iter()
    }

    /// Lazy filtered view in insertion order.
    pub fn filter<'a>(
        &'a self,
        query: &RequestQuery,
    ) -> impl Iterator<Item = &'a ApprovalRequest> {
        let query = *query;
        self.requests.iter().filter(move |request| query.matches(request))
    }

    pub fn query(&self, query: &RequestQuery) -> Vec<&ApprovalRequest> {
        self.filter(query).collect()
    }

    /// Free-text search combined with a structured query. The needle is
    /// lowercased once here, not per record.
    pub fn search(&self, query: &RequestQuery, needle: &str) -> Vec<&ApprovalRequest> {
        let needle = needle.trim().to_lowercase();
        self.filter(query).filter(|request| request.matches_search(&needle)).collect()
    }

    pub fn approve(
        &mut self,
        id: &str,
        actor: &str,
        command: &ApproveCommand,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, StoreError> {
        let comments = command.validate()?;
        self.commit_decision(id, actor, Decision::Approve, comments, now)
    }

    pub fn reject(
        &mut self,
        id: &str,
        actor: &str,
        command: &RejectCommand,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, StoreError> {
        let (_reason, comments) = command.validate()?;
        self.commit_decision(id, actor, Decision::Reject, comments, now)
    }

    pub fn add_comment(
        &mut self,
        id: &str,
        author: &str,
        command: &CommentCommand,
        now: DateTime<Utc>,
    ) -> Result<Comment, StoreError> {
        let body = command.validate()?;
        let index = self.index_of(id)?;

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            author: author.to_string(),
            body,
            visibility: command.visibility,
            posted_at: now,
        };

        let request = &mut self.requests[index];
        request.comments.push(comment.clone());
        request.updated_at = now;
        Ok(comment)
    }

    /// Replace an existing request wholesale, keeping its slot.
    pub fn replace(&mut self, request: ApprovalRequest) -> Result<(), StoreError> {
        let index = self.index_of(&request.id.0)?;
        self.requests[index] = request;
        Ok(())
    }

    fn commit_decision(
        &mut self,
        id: &str,
        actor: &str,
        decision: Decision,
        comments: String,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, StoreError> {
        let index = self.index_of(id)?;

        let mut updated = self.requests[index].clone();
        let outcome = self.engine.decide(&mut updated, actor, decision, comments, now)?;
        self.requests[index] = updated;
        Ok(outcome)
    }

    fn index_of(&self, id: &str) -> Result<usize, StoreError> {
        self.by_id.get(id).copied().ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
