pub mod chain;
pub mod request;

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use crate::domain::chain::{ApprovalChain, Reviewer};
    use crate::domain::request::{ApprovalRequest, Priority, RequestId, RequestType};

    /// Discount request with the canonical three-level review chain
    /// (Sales Manager, Finance Head, VP Sales).
    pub(crate) fn discount_request(id: &str) -> ApprovalRequest {
        let now = Utc::now();
        ApprovalRequest {
            id: RequestId(id.to_string()),
            document_number: format!("DISC-2026-{id}"),
            request_type: RequestType::Discount,
            priority: Priority::High,
            value: Decimal::new(2_850_000, 0),
            customer_name: "Coastal Builders".to_string(),
            requested_by: "Suresh Rao".to_string(),
            request_date: now,
            due_date: now + Duration::days(2),
            escalated_at: None,
            expired_at: None,
            chain: ApprovalChain::open(vec![
                Reviewer::new("Priya Sharma", "Sales Manager"),
                Reviewer::new("Amit Patel", "Finance Head"),
                Reviewer::new("Sunita Reddy", "VP Sales"),
            ])
            .expect("fixture chain"),
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
