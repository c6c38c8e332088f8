use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use signoff_core::domain::chain::{ApprovalChain, ApprovalStep, StepStatus};
use signoff_core::domain::request::{
    ApprovalRequest, Comment, CommentVisibility, Priority, RequestId, RequestStatus, RequestType,
};

use super::{RepositoryError, RequestRepository};
use crate::DbPool;

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, row: SqliteRow) -> Result<ApprovalRequest, RepositoryError> {
        let request_id: String = row.try_get("id")?;

        let step_rows = sqlx::query(
            "SELECT level, approver, role, status, action_date, comments, turnaround_secs
             FROM approval_step
             WHERE request_id = ?
             ORDER BY level ASC",
        )
        .bind(&request_id)
        .fetch_all(&self.pool)
        .await?;

        let steps = step_rows
            .into_iter()
            .map(step_from_row)
            .collect::<Result<Vec<ApprovalStep>, RepositoryError>>()?;
        let chain = ApprovalChain::from_steps(steps)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        let comment_rows = sqlx::query(
            "SELECT id, author, body, visibility, posted_at
             FROM request_comment
             WHERE request_id = ?
             ORDER BY posted_at ASC",
        )
        .bind(&request_id)
        .fetch_all(&self.pool)
        .await?;

        let comments = comment_rows
            .into_iter()
            .map(comment_from_row)
            .collect::<Result<Vec<Comment>, RepositoryError>>()?;

        request_from_row(row, chain, comments)
    }
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<ApprovalRequest>, RepositoryError> {
        let row = sqlx::query(&select_requests("WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn save(&self, request: ApprovalRequest) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO approval_request (
                id,
                document_number,
                request_type,
                priority,
                status,
                value,
                customer_name,
                requested_by,
                request_date,
                due_date,
                escalated_at,
                expired_at,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                document_number = excluded.document_number,
                request_type = excluded.request_type,
                priority = excluded.priority,
                status = excluded.status,
                value = excluded.value,
                customer_name = excluded.customer_name,
                requested_by = excluded.requested_by,
                request_date = excluded.request_date,
                due_date = excluded.due_date,
                escalated_at = excluded.escalated_at,
                expired_at = excluded.expired_at,
                updated_at = excluded.updated_at",
        )
        .bind(&request.id.0)
        .bind(&request.document_number)
        .bind(request.request_type.as_str())
        .bind(request.priority.as_str())
        .bind(request.status().as_str())
        .bind(request.value.to_string())
        .bind(&request.customer_name)
        .bind(&request.requested_by)
        .bind(request.request_date.to_rfc3339())
        .bind(request.due_date.to_rfc3339())
        .bind(request.escalated_at.map(|value| value.to_rfc3339()))
        .bind(request.expired_at.map(|value| value.to_rfc3339()))
        .bind(request.created_at.to_rfc3339())
        .bind(request.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        // Steps and comments are replaced wholesale inside the transaction.
        sqlx::query("DELETE FROM approval_step WHERE request_id = ?")
            .bind(&request.id.0)
            .execute(&mut *tx)
            .await?;

        for step in request.chain.steps() {
            sqlx::query(
                "INSERT INTO approval_step (
                    request_id, level, approver, role, status, action_date, comments, turnaround_secs
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&request.id.0)
            .bind(i64::from(step.level))
            .bind(&step.approver)
            .bind(&step.role)
            .bind(step.status.as_str())
            .bind(step.action_date.map(|value| value.to_rfc3339()))
            .bind(step.comments.as_deref())
            .bind(step.turnaround_secs)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM request_comment WHERE request_id = ?")
            .bind(&request.id.0)
            .execute(&mut *tx)
            .await?;

        for comment in &request.comments {
            sqlx::query(
                "INSERT INTO request_comment (id, request_id, author, body, visibility, posted_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&comment.id)
            .bind(&request.id.0)
            .bind(&comment.author)
            .bind(&comment.body)
            .bind(comment.visibility.as_str())
            .bind(comment.posted_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list(
        &self,
        status: Option<RequestStatus>,
        limit: u32,
    ) -> Result<Vec<ApprovalRequest>, RepositoryError> {
        let rows = if let Some(status) = status {
            sqlx::query(&select_requests(
                "WHERE status = ? ORDER BY request_date DESC, id ASC LIMIT ?",
            ))
            .bind(status.as_str())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&select_requests("ORDER BY request_date DESC, id ASC LIMIT ?"))
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?
        };

        let mut requests = Vec::with_capacity(rows.len());
        for row in rows {
            requests.push(self.hydrate(row).await?);
        }
        Ok(requests)
    }

    async fn list_due_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ApprovalRequest>, RepositoryError> {
        let rows = sqlx::query(&select_requests(
            "WHERE status IN ('pending', 'escalated') AND due_date < ?
             ORDER BY due_date ASC, id ASC",
        ))
        .bind(cutoff.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        let mut requests = Vec::with_capacity(rows.len());
        for row in rows {
            requests.push(self.hydrate(row).await?);
        }
        Ok(requests)
    }
}

fn select_requests(suffix: &str) -> String {
    format!(
        "SELECT
            id,
            document_number,
            request_type,
            priority,
            value,
            customer_name,
            requested_by,
            request_date,
            due_date,
            escalated_at,
            expired_at,
            created_at,
            updated_at
         FROM approval_request
         {suffix}"
    )
}

fn request_from_row(
    row: SqliteRow,
    chain: ApprovalChain,
    comments: Vec<Comment>,
) -> Result<ApprovalRequest, RepositoryError> {
    let request_type_raw = row.try_get::<String, _>("request_type")?;
    let request_type = request_type_raw
        .parse::<RequestType>()
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    let priority_raw = row.try_get::<String, _>("priority")?;
    let priority = priority_raw
        .parse::<Priority>()
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    let value_raw = row.try_get::<String, _>("value")?;
    let value = value_raw.parse::<Decimal>().map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `value`: `{value_raw}` ({error})"))
    })?;

    Ok(ApprovalRequest {
        id: RequestId(row.try_get("id")?),
        document_number: row.try_get("document_number")?,
        request_type,
        priority,
        value,
        customer_name: row.try_get("customer_name")?,
        requested_by: row.try_get("requested_by")?,
        request_date: parse_timestamp("request_date", row.try_get("request_date")?)?,
        due_date: parse_timestamp("due_date", row.try_get("due_date")?)?,
        escalated_at: parse_optional_timestamp("escalated_at", row.try_get("escalated_at")?)?,
        expired_at: parse_optional_timestamp("expired_at", row.try_get("expired_at")?)?,
        chain,
        comments,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn step_from_row(row: SqliteRow) -> Result<ApprovalStep, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = status_raw
        .parse::<StepStatus>()
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    let level_raw = row.try_get::<i64, _>("level")?;
    let level = u32::try_from(level_raw).map_err(|_| {
        RepositoryError::Decode(format!("invalid value for `level` (expected u32): {level_raw}"))
    })?;

    Ok(ApprovalStep {
        level,
        approver: row.try_get("approver")?,
        role: row.try_get("role")?,
        status,
        action_date: parse_optional_timestamp("action_date", row.try_get("action_date")?)?,
        comments: row.try_get("comments")?,
        turnaround_secs: row.try_get("turnaround_secs")?,
    })
}

fn comment_from_row(row: SqliteRow) -> Result<Comment, RepositoryError> {
    let visibility_raw = row.try_get::<String, _>("visibility")?;
    let visibility = visibility_raw
        .parse::<CommentVisibility>()
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    Ok(Comment {
        id: row.try_get("id")?,
        author: row.try_get("author")?,
        body: row.try_get("body")?,
        visibility,
        posted_at: parse_timestamp("posted_at", row.try_get("posted_at")?)?,
    })
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}
