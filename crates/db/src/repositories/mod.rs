use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use signoff_core::domain::request::{ApprovalRequest, RequestId, RequestStatus};

pub mod memory;
pub mod request;

pub use memory::InMemoryRequestRepository;
pub use request::SqlRequestRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Persistence seam for approval requests. A request is always loaded and
/// saved whole, chain and comments included.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<ApprovalRequest>, RepositoryError>;

    async fn save(&self, request: ApprovalRequest) -> Result<(), RepositoryError>;

    /// Newest-first listing, optionally narrowed to one status.
    async fn list(
        &self,
        status: Option<RequestStatus>,
        limit: u32,
    ) -> Result<Vec<ApprovalRequest>, RepositoryError>;

    /// Open requests whose due date falls before `cutoff`. Feeds the
    /// escalation and expiry sweep.
    async fn list_due_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ApprovalRequest>, RepositoryError>;
}
