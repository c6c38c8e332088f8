pub mod actions;
pub mod audit;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod sla;
pub mod store;

pub use actions::{ApproveCommand, CommentCommand, ReasonCode, RejectCommand, ValidationError};
pub use audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink,
    TracingAuditSink,
};
pub use domain::chain::{ApprovalChain, ApprovalStep, ChainError, Reviewer, StepStatus};
pub use domain::request::{
    ApprovalRequest, Comment, CommentVisibility, ParseLabelError, Priority, RequestId,
    RequestStatus, RequestType,
};
pub use engine::{Decision, DecisionOutcome, EngineError, WorkflowEngine};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use sla::{SlaAssessment, SlaStatus};
pub use store::{RequestQuery, RequestStore, StoreError};
