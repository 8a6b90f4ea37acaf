//! Session Store
//!
//! Persistence for sessions, their append-only message logs, and archived
//! session records, over SQLite via sqlx. Message arrival order is the
//! AUTOINCREMENT insertion order; clients never declare ordering. Session
//! status is monotonic: the status update is guarded so a terminal session
//! can never return to active.

use chrono::{DateTime, Utc};
use lingua_core::roleplay::RolePlayPhase;
use lingua_core::scoring::SessionAnalytics;
use lingua_core::types::{MessageType, SessionType, TurnRole};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use uuid::Uuid;

use crate::models::{
    RecordState, SessionContext, SessionRecord, SessionStatus, SessionSummary, StoredMessage,
    TutorSession,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session not found")]
    NotFound,
    #[error("session is not active")]
    SessionNotActive,
    #[error("teacher review already recorded")]
    ReviewAlreadySet,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Data access wrapper around the SQLite pool.
#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

fn parse_timestamp(raw: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("{field}: {e}")))
}

fn parse_uuid(raw: &str, field: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Corrupt(format!("{field}: {e}")))
}

fn session_from_row(row: &SqliteRow) -> Result<TutorSession> {
    let id: String = row.try_get("session_id")?;
    let session_type: String = row.try_get("session_type")?;
    let status: String = row.try_get("status")?;
    let analytics: String = row.try_get("analytics")?;
    let context: String = row.try_get("context")?;
    let phase: Option<String> = row.try_get("phase")?;
    let start_time: String = row.try_get("start_time")?;
    let end_time: Option<String> = row.try_get("end_time")?;

    Ok(TutorSession {
        id: parse_uuid(&id, "session_id")?,
        owner_id: row.try_get("owner_id")?,
        module_id: row.try_get("module_id")?,
        session_type: SessionType::parse(&session_type)
            .ok_or_else(|| StoreError::Corrupt(format!("session_type: {session_type}")))?,
        status: SessionStatus::parse(&status)
            .ok_or_else(|| StoreError::Corrupt(format!("status: {status}")))?,
        is_test_session: row.try_get::<i64, _>("is_test")? != 0,
        analytics: serde_json::from_str::<SessionAnalytics>(&analytics)?,
        context: serde_json::from_str::<SessionContext>(&context)?,
        phase: phase
            .as_deref()
            .map(|p| {
                RolePlayPhase::parse(p)
                    .ok_or_else(|| StoreError::Corrupt(format!("phase: {p}")))
            })
            .transpose()?,
        start_time: parse_timestamp(&start_time, "start_time")?,
        end_time: end_time
            .as_deref()
            .map(|t| parse_timestamp(t, "end_time"))
            .transpose()?,
    })
}

fn message_from_row(row: &SqliteRow) -> Result<StoredMessage> {
    let session_id: String = row.try_get("session_id")?;
    let role: String = row.try_get("role")?;
    let message_type: String = row.try_get("message_type")?;
    let metadata: String = row.try_get("metadata")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(StoredMessage {
        id: row.try_get("id")?,
        session_id: parse_uuid(&session_id, "session_id")?,
        role: TurnRole::parse(&role)
            .ok_or_else(|| StoreError::Corrupt(format!("role: {role}")))?,
        content: row.try_get("content")?,
        message_type: MessageType::parse(&message_type)
            .ok_or_else(|| StoreError::Corrupt(format!("message_type: {message_type}")))?,
        metadata: serde_json::from_str(&metadata)?,
        created_at: parse_timestamp(&created_at, "created_at")?,
    })
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the schema if it does not exist yet.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                module_id TEXT NOT NULL,
                session_type TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                is_test INTEGER NOT NULL DEFAULT 0,
                analytics TEXT NOT NULL,
                context TEXT NOT NULL,
                phase TEXT,
                start_time TEXT NOT NULL,
                end_time TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                message_type TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_records (
                session_id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                module_id TEXT NOT NULL,
                module_name TEXT NOT NULL,
                messages TEXT NOT NULL,
                summary TEXT NOT NULL,
                session_state TEXT NOT NULL,
                is_module_completed INTEGER NOT NULL DEFAULT 0,
                teacher_reviewed INTEGER NOT NULL DEFAULT 0,
                teacher_notes TEXT,
                reviewed_by TEXT,
                reviewed_at TEXT,
                archived_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // --- Sessions ---

    pub async fn create_session(&self, session: &TutorSession) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (
                session_id, owner_id, module_id, session_type, status,
                is_test, analytics, context, phase, start_time, end_time
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.id.to_string())
        .bind(&session.owner_id)
        .bind(&session.module_id)
        .bind(session.session_type.as_str())
        .bind(session.status.as_str())
        .bind(session.is_test_session as i64)
        .bind(serde_json::to_string(&session.analytics)?)
        .bind(serde_json::to_string(&session.context)?)
        .bind(session.phase.map(|p| p.as_str()))
        .bind(session.start_time.to_rfc3339())
        .bind(session.end_time.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetches a session regardless of status, scoped to its owner.
    pub async fn fetch_session(&self, session_id: Uuid, owner_id: &str) -> Result<TutorSession> {
        let row = sqlx::query("SELECT * FROM sessions WHERE session_id = ? AND owner_id = ?")
            .bind(session_id.to_string())
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        session_from_row(&row)
    }

    /// Fetches a session that must still be active. `SessionNotActive` if the
    /// session exists but has terminated.
    pub async fn find_active(&self, session_id: Uuid, owner_id: &str) -> Result<TutorSession> {
        let session = self.fetch_session(session_id, owner_id).await?;
        if session.status != SessionStatus::Active {
            return Err(StoreError::SessionNotActive);
        }
        Ok(session)
    }

    pub async fn count_sessions(&self, owner_id: &str, module_id: &str) -> Result<u32> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE owner_id = ? AND module_id = ?")
                .bind(owner_id)
                .bind(module_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u32)
    }

    /// Most recent sessions first, paginated. Messages are never included.
    pub async fn list_sessions(
        &self,
        owner_id: &str,
        module_id: Option<&str>,
        page: u32,
        limit: u32,
    ) -> Result<Vec<TutorSession>> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
        let rows = match module_id {
            Some(module_id) => {
                sqlx::query(
                    r#"
                    SELECT * FROM sessions
                    WHERE owner_id = ? AND module_id = ?
                    ORDER BY start_time DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(owner_id)
                .bind(module_id)
                .bind(i64::from(limit))
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT * FROM sessions
                    WHERE owner_id = ?
                    ORDER BY start_time DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(owner_id)
                .bind(i64::from(limit))
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(session_from_row).collect()
    }

    pub async fn update_analytics(
        &self,
        session_id: Uuid,
        analytics: &SessionAnalytics,
    ) -> Result<()> {
        sqlx::query("UPDATE sessions SET analytics = ? WHERE session_id = ?")
            .bind(serde_json::to_string(analytics)?)
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_phase(&self, session_id: Uuid, phase: RolePlayPhase) -> Result<()> {
        sqlx::query("UPDATE sessions SET phase = ? WHERE session_id = ?")
            .bind(phase.as_str())
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Moves an active session to a terminal (or paused) status and stamps the
    /// end time once. The WHERE guard makes the transition monotonic and the
    /// call idempotent: a session that already left `active` is untouched.
    ///
    /// Returns whether this call performed the transition.
    pub async fn set_status(
        &self,
        session_id: Uuid,
        status: SessionStatus,
        end_time: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET status = ?, end_time = COALESCE(end_time, ?)
            WHERE session_id = ? AND status = 'active'
            "#,
        )
        .bind(status.as_str())
        .bind(end_time.to_rfc3339())
        .bind(session_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- Messages ---

    /// Appends one message; ordering is the insertion order at the store.
    pub async fn append_message(
        &self,
        session_id: Uuid,
        role: TurnRole,
        message_type: MessageType,
        content: &str,
        metadata: serde_json::Value,
    ) -> Result<StoredMessage> {
        let created_at = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO messages (session_id, role, content, message_type, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session_id.to_string())
        .bind(role.as_str())
        .bind(content)
        .bind(message_type.as_str())
        .bind(serde_json::to_string(&metadata)?)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(StoredMessage {
            id: result.last_insert_rowid(),
            session_id,
            role,
            content: content.to_string(),
            message_type,
            metadata,
            created_at,
        })
    }

    /// Full message log, in arrival order.
    pub async fn messages_for(&self, session_id: Uuid) -> Result<Vec<StoredMessage>> {
        let rows = sqlx::query("SELECT * FROM messages WHERE session_id = ? ORDER BY id ASC")
            .bind(session_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(message_from_row).collect()
    }

    // --- Archived records ---

    /// Creates or overwrites the archived record for a session. Message and
    /// summary content are replaced wholesale; the teacher review columns are
    /// left untouched on conflict.
    pub async fn upsert_record(&self, record: &SessionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO session_records (
                session_id, owner_id, module_id, module_name, messages, summary,
                session_state, is_module_completed, teacher_reviewed,
                teacher_notes, reviewed_by, reviewed_at, archived_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, NULL, NULL, NULL, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                messages = excluded.messages,
                summary = excluded.summary,
                session_state = excluded.session_state,
                is_module_completed = excluded.is_module_completed,
                archived_at = excluded.archived_at
            "#,
        )
        .bind(record.session_id.to_string())
        .bind(&record.owner_id)
        .bind(&record.module_id)
        .bind(&record.module_name)
        .bind(serde_json::to_string(&record.messages)?)
        .bind(serde_json::to_string(&record.summary)?)
        .bind(record.session_state.as_str())
        .bind(record.is_module_completed as i64)
        .bind(record.archived_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_record(&self, session_id: Uuid) -> Result<Option<SessionRecord>> {
        let row = sqlx::query("SELECT * FROM session_records WHERE session_id = ?")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else { return Ok(None) };

        let messages: String = row.try_get("messages")?;
        let summary: String = row.try_get("summary")?;
        let session_state: String = row.try_get("session_state")?;
        let session_id_raw: String = row.try_get("session_id")?;
        let reviewed_at: Option<String> = row.try_get("reviewed_at")?;
        let archived_at: String = row.try_get("archived_at")?;

        Ok(Some(SessionRecord {
            session_id: parse_uuid(&session_id_raw, "session_id")?,
            owner_id: row.try_get("owner_id")?,
            module_id: row.try_get("module_id")?,
            module_name: row.try_get("module_name")?,
            messages: serde_json::from_str::<Vec<StoredMessage>>(&messages)?,
            summary: serde_json::from_str::<SessionSummary>(&summary)?,
            session_state: RecordState::parse(&session_state)
                .ok_or_else(|| StoreError::Corrupt(format!("session_state: {session_state}")))?,
            is_module_completed: row.try_get::<i64, _>("is_module_completed")? != 0,
            teacher_reviewed: row.try_get::<i64, _>("teacher_reviewed")? != 0,
            teacher_notes: row.try_get("teacher_notes")?,
            reviewed_by: row.try_get("reviewed_by")?,
            reviewed_at: reviewed_at
                .as_deref()
                .map(|t| parse_timestamp(t, "reviewed_at"))
                .transpose()?,
            archived_at: parse_timestamp(&archived_at, "archived_at")?,
        }))
    }

    /// Sets the teacher review exactly once; a second attempt fails with
    /// `ReviewAlreadySet`.
    pub async fn set_review(
        &self,
        session_id: Uuid,
        reviewed_by: &str,
        notes: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE session_records
            SET teacher_reviewed = 1, teacher_notes = ?, reviewed_by = ?, reviewed_at = ?
            WHERE session_id = ? AND teacher_reviewed = 0
            "#,
        )
        .bind(notes)
        .bind(reviewed_by)
        .bind(Utc::now().to_rfc3339())
        .bind(session_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_record(session_id).await? {
                Some(_) => Err(StoreError::ReviewAlreadySet),
                None => Err(StoreError::NotFound),
            };
        }
        Ok(())
    }
}
