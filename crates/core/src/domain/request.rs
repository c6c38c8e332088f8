use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::chain::ApprovalChain;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown {field} label `{value}`")]
pub struct ParseLabelError {
    pub field: &'static str,
    pub value: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Quote,
    Discount,
    Contract,
    Pricing,
    Proposal,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Discount => "discount",
            Self::Contract => "contract",
            Self::Pricing => "pricing",
            Self::Proposal => "proposal",
        }
    }
}

impl std::str::FromStr for RequestType {
    type Err = ParseLabelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "quote" => Ok(Self::Quote),
            "discount" => Ok(Self::Discount),
            "contract" => Ok(Self::Contract),
            "pricing" => Ok(Self::Pricing),
            "proposal" => Ok(Self::Proposal),
            other => Err(ParseLabelError { field: "request_type", value: other.to_string() }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = ParseLabelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(ParseLabelError { field: "priority", value: other.to_string() }),
        }
    }
}

/// Workflow status of a request. Always derived, never stored authoritatively:
/// the chain outcome wins, then expiry, then escalation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Escalated,
    Expired,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Escalated => "escalated",
            Self::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Expired)
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = ParseLabelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "escalated" => Ok(Self::Escalated),
            "expired" => Ok(Self::Expired),
            other => Err(ParseLabelError { field: "status", value: other.to_string() }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentVisibility {
    Internal,
    Shared,
}

impl CommentVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Shared => "shared",
        }
    }
}

impl std::str::FromStr for CommentVisibility {
    type Err = ParseLabelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "internal" => Ok(Self::Internal),
            "shared" => Ok(Self::Shared),
            other => Err(ParseLabelError { field: "visibility", value: other.to_string() }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub body: String,
    pub visibility: CommentVisibility,
    pub posted_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: RequestId,
    pub document_number: String,
    pub request_type: RequestType,
    pub priority: Priority,
    pub value: Decimal,
    pub customer_name: String,
    pub requested_by: String,
    pub request_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub escalated_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub chain: ApprovalChain,
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalRequest {
    /// Derived workflow status. A terminal chain outcome takes precedence over
    /// the expiry and escalation markers.
    pub fn status(&self) -> RequestStatus {
        if self.chain.is_rejected() {
            RequestStatus::Rejected
        } else if self.chain.is_complete() {
            RequestStatus::Approved
        } else if self.expired_at.is_some() {
            RequestStatus::Expired
        } else if self.escalated_at.is_some() {
            RequestStatus::Escalated
        } else {
            RequestStatus::Pending
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Case-insensitive substring match across document number, customer name,
    /// and approver names. `needle` must already be lowercased.
    pub fn matches_search(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }

        self.document_number.to_lowercase().contains(needle)
            || self.customer_name.to_lowercase().contains(needle)
            || self
                .chain
                .steps()
                .iter()
                .any(|step| step.approver.to_lowercase().contains(needle))
    }
}
