use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use inboxly_core::domain::tenant::TenantId;
use inboxly_core::domain::thread::{
    Message, MessageDirection, MessageId, Thread, ThreadId, ThreadStatus,
};

use super::{RepositoryError, ThreadRepository};
use crate::DbPool;

pub struct SqlThreadRepository {
    pool: DbPool,
}

impl SqlThreadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ThreadRepository for SqlThreadRepository {
    async fn list_open(
        &self,
        tenant_id: Option<&TenantId>,
    ) -> Result<Vec<Thread>, RepositoryError> {
        let thread_rows = if let Some(tenant_id) = tenant_id {
            sqlx::query(
                "SELECT id, tenant_id, status, created_at
                 FROM thread
                 WHERE status = 'open' AND tenant_id = ?
                 ORDER BY created_at ASC",
            )
            .bind(&tenant_id.0)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT id, tenant_id, status, created_at
                 FROM thread
                 WHERE status = 'open'
                 ORDER BY tenant_id ASC, created_at ASC",
            )
            .fetch_all(&self.pool)
            .await?
        };

        let mut threads: Vec<Thread> =
            thread_rows.into_iter().map(thread_from_row).collect::<Result<_, _>>()?;

        if threads.is_empty() {
            return Ok(threads);
        }

        let message_rows = if let Some(tenant_id) = tenant_id {
            sqlx::query(
                "SELECT m.id, m.thread_id, m.direction, m.sent_at
                 FROM message m
                 JOIN thread t ON t.id = m.thread_id
                 WHERE t.status = 'open' AND t.tenant_id = ?
                 ORDER BY m.sent_at ASC",
            )
            .bind(&tenant_id.0)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT m.id, m.thread_id, m.direction, m.sent_at
                 FROM message m
                 JOIN thread t ON t.id = m.thread_id
                 WHERE t.status = 'open'
                 ORDER BY m.sent_at ASC",
            )
            .fetch_all(&self.pool)
            .await?
        };

        let mut messages_by_thread: HashMap<String, Vec<Message>> = HashMap::new();
        for row in message_rows {
            let thread_id: String = row.get("thread_id");
            messages_by_thread.entry(thread_id).or_default().push(message_from_row(row)?);
        }

        for thread in &mut threads {
            if let Some(messages) = messages_by_thread.remove(&thread.id.0) {
                thread.messages = messages;
            }
        }

        Ok(threads)
    }

    async fn find_by_id(&self, id: &ThreadId) -> Result<Option<Thread>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, tenant_id, status, created_at
             FROM thread
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut thread = thread_from_row(row)?;

        let message_rows = sqlx::query(
            "SELECT id, thread_id, direction, sent_at
             FROM message
             WHERE thread_id = ?
             ORDER BY sent_at ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        thread.messages =
            message_rows.into_iter().map(message_from_row).collect::<Result<_, _>>()?;

        Ok(Some(thread))
    }
}

fn thread_from_row(row: SqliteRow) -> Result<Thread, RepositoryError> {
    let status_raw: String = row.get("status");
    let status = ThreadStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown thread status `{status_raw}`")))?;

    Ok(Thread {
        id: ThreadId(row.get("id")),
        tenant_id: TenantId(row.get("tenant_id")),
        status,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        messages: Vec::new(),
    })
}

fn message_from_row(row: SqliteRow) -> Result<Message, RepositoryError> {
    let direction_raw: String = row.get("direction");
    let direction = MessageDirection::parse(&direction_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown message direction `{direction_raw}`"))
    })?;

    Ok(Message {
        id: MessageId(row.get("id")),
        direction,
        sent_at: parse_timestamp(&row.get::<String, _>("sent_at"))?,
    })
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("bad timestamp `{value}`: {error}")))
}
