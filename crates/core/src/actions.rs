use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::request::{CommentVisibility, ParseLabelError};

/// Structured reason attached to every rejection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    MarginTooLow,
    CreditRisk,
    PolicyViolation,
    IncompleteJustification,
    DuplicateRequest,
    Other,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MarginTooLow => "margin_too_low",
            Self::CreditRisk => "credit_risk",
            Self::PolicyViolation => "policy_violation",
            Self::IncompleteJustification => "incomplete_justification",
            Self::DuplicateRequest => "duplicate_request",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for ReasonCode {
    type Err = ParseLabelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "margin_too_low" => Ok(Self::MarginTooLow),
            "credit_risk" => Ok(Self::CreditRisk),
            "policy_violation" => Ok(Self::PolicyViolation),
            "incomplete_justification" => Ok(Self::IncompleteJustification),
            "duplicate_request" => Ok(Self::DuplicateRequest),
            "other" => Ok(Self::Other),
            other => Err(ParseLabelError { field: "reason_code", value: other.to_string() }),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("approval comments must not be empty")]
    MissingComments,
    #[error("rejection requires a reason code")]
    MissingReasonCode,
    #[error("comment body must not be empty")]
    EmptyCommentBody,
}

/// Payload for approving the active step of a request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApproveCommand {
    pub comments: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
}

impl ApproveCommand {
    /// Returns the trimmed, non-empty comment text.
    pub fn validate(&self) -> Result<String, ValidationError> {
        let comments = self.comments.trim();
        if comments.is_empty() {
            return Err(ValidationError::MissingComments);
        }

        match self.conditions.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(conditions) => Ok(format!("{comments} (conditions: {conditions})")),
            None => Ok(comments.to_string()),
        }
    }
}

/// Payload for rejecting the active step of a request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RejectCommand {
    pub reason_code: Option<ReasonCode>,
    pub comments: String,
}

impl RejectCommand {
    /// Returns the reason code plus the comment text stamped onto the step.
    pub fn validate(&self) -> Result<(ReasonCode, String), ValidationError> {
        let reason = self.reason_code.ok_or(ValidationError::MissingReasonCode)?;
        let comments = self.comments.trim();
        if comments.is_empty() {
            return Err(ValidationError::MissingComments);
        }
        Ok((reason, format!("[{}] {comments}", reason.as_str())))
    }
}

/// Payload for posting a discussion comment on a request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommentCommand {
    pub body: String,
    pub visibility: CommentVisibility,
}

impl CommentCommand {
    pub fn validate(&self) -> Result<String, ValidationError> {
        let body = self.body.trim();
        if body.is_empty() {
            return Err(ValidationError::EmptyCommentBody);
        }
        Ok(body.to_string())
    }
}
