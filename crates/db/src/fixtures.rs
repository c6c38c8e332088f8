use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Deterministic seeds and their verification contract for the three
/// canonical approval flows.
const SEED_REQUESTS: &[SeedRequestContract] = &[
    SeedRequestContract {
        request_id: "WF-001",
        request_type: "quote",
        status: "pending",
        step_count: 2,
        active_level: Some(1),
        comment_count: 0,
        customer_name: "Apex Retail",
        description: "Quote awaiting first sign-off",
    },
    SeedRequestContract {
        request_id: "WF-002",
        request_type: "discount",
        status: "pending",
        step_count: 3,
        active_level: Some(2),
        comment_count: 1,
        customer_name: "Coastal Builders",
        description: "High-value discount mid-chain at finance review",
    },
    SeedRequestContract {
        request_id: "WF-003",
        request_type: "contract",
        status: "rejected",
        step_count: 3,
        active_level: None,
        comment_count: 1,
        customer_name: "Meridian Logistics",
        description: "Contract rejected on credit grounds",
    },
];

const SEED_REQUEST_IDS: &[&str] = &["WF-001", "WF-002", "WF-003"];

/// Seed dataset for local demos and end-to-end tests. Loading is idempotent.
pub struct SeedDataset;

impl SeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/seed_requests.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let requests_seeded = SEED_REQUESTS
            .iter()
            .map(|contract| SeedRequestInfo {
                request_id: contract.request_id,
                status: contract.status,
                description: contract.description,
            })
            .collect::<Vec<_>>();

        Ok(SeedResult { requests_seeded })
    }

    /// Verify that seed data exists and matches the contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for contract in SEED_REQUESTS {
            let request_ok: i64 = sqlx::query_scalar(
                "SELECT EXISTS(
                    SELECT 1 FROM approval_request
                    WHERE id = ?1 AND request_type = ?2 AND status = ?3 AND customer_name = ?4
                 )",
            )
            .bind(contract.request_id)
            .bind(contract.request_type)
            .bind(contract.status)
            .bind(contract.customer_name)
            .fetch_one(pool)
            .await?;
            checks.push((contract.request_label(), request_ok == 1));

            let step_count: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM approval_step WHERE request_id = ?1")
                    .bind(contract.request_id)
                    .fetch_one(pool)
                    .await?;
            checks.push((contract.step_count_label(), step_count == contract.step_count));

            let pending_levels: Vec<i64> = sqlx::query_scalar(
                "SELECT level FROM approval_step WHERE request_id = ?1 AND status = 'pending'",
            )
            .bind(contract.request_id)
            .fetch_all(pool)
            .await?;
            let active_matches = match contract.active_level {
                Some(level) => pending_levels == vec![level],
                None => pending_levels.is_empty(),
            };
            checks.push((contract.active_step_label(), active_matches));

            let comment_count: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM request_comment WHERE request_id = ?1")
                    .bind(contract.request_id)
                    .fetch_one(pool)
                    .await?;
            checks.push((contract.comment_count_label(), comment_count == contract.comment_count));
        }

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }

    /// Remove seeded fixtures from a test database.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let quoted = SEED_REQUEST_IDS
            .iter()
            .map(|id| format!("'{id}'"))
            .collect::<Vec<_>>()
            .join(",");

        sqlx::query(&format!("DELETE FROM request_comment WHERE request_id IN ({quoted})"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM approval_step WHERE request_id IN ({quoted})"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM approval_request WHERE id IN ({quoted})"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedRequestContract {
    request_id: &'static str,
    request_type: &'static str,
    status: &'static str,
    step_count: i64,
    active_level: Option<i64>,
    comment_count: i64,
    customer_name: &'static str,
    description: &'static str,
}

impl SeedRequestContract {
    fn request_label(&self) -> &'static str {
        match self.request_id {
            "WF-001" => "wf-001-request",
            "WF-002" => "wf-002-request",
            _ => "wf-003-request",
        }
    }

    fn step_count_label(&self) -> &'static str {
        match self.request_id {
            "WF-001" => "wf-001-step-count",
            "WF-002" => "wf-002-step-count",
            _ => "wf-003-step-count",
        }
    }

    fn active_step_label(&self) -> &'static str {
        match self.request_id {
            "WF-001" => "wf-001-active-step",
            "WF-002" => "wf-002-active-step",
            _ => "wf-003-active-step",
        }
    }

    fn comment_count_label(&self) -> &'static str {
        match self.request_id {
            "WF-001" => "wf-001-comment-count",
            "WF-002" => "wf-002-comment-count",
            _ => "wf-003-comment-count",
        }
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub requests_seeded: Vec<SeedRequestInfo>,
}

#[derive(Debug)]
pub struct SeedRequestInfo {
    pub request_id: &'static str,
    pub status: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use signoff_core::domain::chain::StepStatus;
    use signoff_core::domain::request::{RequestId, RequestStatus};

    use super::SeedDataset;
    use crate::repositories::{RequestRepository, SqlRequestRepository};
    use crate::{connect_with_settings, migrations};

    #[test]
    fn sql_fixture_is_valid() {
        assert!(!SeedDataset::SQL.is_empty());
    }

    #[tokio::test]
    async fn verify_seed_contract_and_idempotency() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");

        migrations::run_pending(&pool).await.expect("run migrations");

        let first = SeedDataset::load(&pool).await.expect("load seed fixtures");
        let first_verification = SeedDataset::verify(&pool).await.expect("verify seed fixtures");
        assert!(first_verification.all_present, "checks: {:?}", first_verification.checks);
        assert_eq!(first.requests_seeded.len(), 3);

        let second = SeedDataset::load(&pool).await.expect("reload seed fixtures");
        let second_verification =
            SeedDataset::verify(&pool).await.expect("re-verify seed fixtures");
        assert!(second_verification.all_present);
        assert_eq!(second.requests_seeded.len(), 3);
        assert_eq!(first_verification.checks, second_verification.checks);
    }

    #[tokio::test]
    async fn seeded_requests_rehydrate_through_the_repository() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");

        migrations::run_pending(&pool).await.expect("run migrations");
        SeedDataset::load(&pool).await.expect("load seed fixtures");

        let repo = SqlRequestRepository::new(pool.clone());

        let discount = repo
            .find_by_id(&RequestId("WF-002".to_string()))
            .await
            .expect("load WF-002")
            .expect("WF-002 seeded");
        assert_eq!(discount.status(), RequestStatus::Pending);
        assert_eq!(discount.chain.active_step().map(|step| step.level), Some(2));
        assert_eq!(discount.comments.len(), 1);

        let rejected = repo
            .find_by_id(&RequestId("WF-003".to_string()))
            .await
            .expect("load WF-003")
            .expect("WF-003 seeded");
        assert_eq!(rejected.status(), RequestStatus::Rejected);
        assert_eq!(rejected.chain.steps()[2].status, StepStatus::Skipped);

        SeedDataset::clean(&pool).await.expect("clean seed fixtures");
        let gone = repo
            .find_by_id(&RequestId("WF-002".to_string()))
            .await
            .expect("query after clean");
        assert!(gone.is_none());
    }
}
