use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use signoff_core::domain::request::{ApprovalRequest, RequestId, RequestStatus};

use super::{RepositoryError, RequestRepository};

/// Test double with the same contract as the SQL repository.
#[derive(Default)]
pub struct InMemoryRequestRepository {
    requests: RwLock<HashMap<String, ApprovalRequest>>,
}

#[async_trait::async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<ApprovalRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id.0).cloned())
    }

    async fn save(&self, request: ApprovalRequest) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        requests.insert(request.id.0.clone(), request);
        Ok(())
    }

    async fn list(
        &self,
        status: Option<RequestStatus>,
        limit: u32,
    ) -> Result<Vec<ApprovalRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut matching: Vec<ApprovalRequest> = requests
            .values()
            .filter(|request| status.map_or(true, |status| request.status() == status))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.request_date.cmp(&a.request_date).then_with(|| a.id.0.cmp(&b.id.0))
        });
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn list_due_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ApprovalRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut due: Vec<ApprovalRequest> = requests
            .values()
            .filter(|request| !request.is_terminal() && request.due_date < cutoff)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(due)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use signoff_core::domain::chain::{ApprovalChain, Reviewer};
    use signoff_core::domain::request::{
        ApprovalRequest, Priority, RequestId, RequestStatus, RequestType,
    };

    use crate::repositories::{InMemoryRequestRepository, RequestRepository};

    fn request(id: &str, days_until_due: i64) -> ApprovalRequest {
        let now = Utc::now();
        ApprovalRequest {
            id: RequestId(id.to_string()),
            document_number: format!("QT-2026-{id}"),
            request_type: RequestType::Quote,
            priority: Priority::Medium,
            value: Decimal::new(480_000, 0),
            customer_name: "Apex Retail".to_string(),
            requested_by: "Kavita Nair".to_string(),
            request_date: now,
            due_date: now + Duration::days(days_until_due),
            escalated_at: None,
            expired_at: None,
            chain: ApprovalChain::open(vec![Reviewer::new("Priya Sharma", "Sales Manager")])
                .expect("chain opens"),
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn in_memory_repo_round_trip() {
        let repo = InMemoryRequestRepository::default();
        let sample = request("WF-201", 3);

        repo.save(sample.clone()).await.expect("save request");
        let found = repo.find_by_id(&sample.id).await.expect("find request");

        assert_eq!(found, Some(sample));
    }

    #[tokio::test]
    async fn list_and_due_filters_match_repository_contract() {
        let repo = InMemoryRequestRepository::default();
        repo.save(request("WF-202", 3)).await.expect("save");
        repo.save(request("WF-203", -1)).await.expect("save overdue");

        let pending = repo
            .list(Some(RequestStatus::Pending), 10)
            .await
            .expect("list pending requests");
        assert_eq!(pending.len(), 2);

        let due = repo.list_due_before(Utc::now()).await.expect("list due requests");
        let ids: Vec<&str> = due.iter().map(|request| request.id.0.as_str()).collect();
        assert_eq!(ids, vec!["WF-203"]);
    }
}
