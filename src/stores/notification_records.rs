use chrono::{DateTime, Utc};
use sqlx::{types::Uuid, PgPool};

use crate::{
    error::Result,
    models::{NotificationRecord, NotificationStatus},
};

pub const INTERRUPTED_SEND_ERROR: &str = "interrupted before provider confirmation";

pub struct NewNotificationRecord<'a> {
    pub client_id: Uuid,
    pub appointment_id: Uuid,
    pub phone_number: &'a str,
    pub message_content: &'a str,
}

/// Outcome of a dispatch attempt, written back onto a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: NotificationStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub provider_message_id: Option<String>,
    pub error_message: Option<String>,
}

impl StatusUpdate {
    pub fn sent(provider_message_id: String, sent_at: DateTime<Utc>) -> Self {
        StatusUpdate {
            status: NotificationStatus::Sent,
            sent_at: Some(sent_at),
            provider_message_id: Some(provider_message_id),
            error_message: None,
        }
    }

    pub fn failed(error_message: String) -> Self {
        StatusUpdate {
            status: NotificationStatus::Failed,
            sent_at: None,
            provider_message_id: None,
            error_message: Some(error_message),
        }
    }
}

#[derive(Clone)]
pub struct NotificationRecordStore {
    db: PgPool,
}

impl NotificationRecordStore {
    pub fn new(db: PgPool) -> Self {
        NotificationRecordStore { db }
    }

    /// Persists a new record in the `pending` state.
    pub async fn create(&self, record: NewNotificationRecord<'_>) -> Result<NotificationRecord> {
        let now = Utc::now();

        let created = sqlx::query_as::<_, NotificationRecord>(
            r#"
            INSERT INTO notification_records
                (id, client_id, appointment_id, phone_number, message_content, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.client_id)
        .bind(record.appointment_id)
        .bind(record.phone_number)
        .bind(record.message_content)
        .bind(NotificationStatus::Pending.as_str())
        .bind(now)
        .fetch_one(&self.db)
        .await?;

        Ok(created)
    }

    pub async fn update_status(&self, id: Uuid, update: &StatusUpdate) -> Result<NotificationRecord> {
        let updated = sqlx::query_as::<_, NotificationRecord>(
            r#"
            UPDATE notification_records
            SET status = $2,
                sent_at = COALESCE($3, sent_at),
                provider_message_id = COALESCE($4, provider_message_id),
                error_message = $5,
                updated_at = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.status.as_str())
        .bind(update.sent_at)
        .bind(update.provider_message_id.as_deref())
        .bind(update.error_message.as_deref())
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        Ok(updated)
    }

    pub async fn find_by_appointment_id(
        &self,
        appointment_id: Uuid,
        status: NotificationStatus,
    ) -> Result<Option<NotificationRecord>> {
        let record = sqlx::query_as::<_, NotificationRecord>(
            r#"
            SELECT *
            FROM notification_records
            WHERE appointment_id = $1 AND status = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(appointment_id)
        .bind(status.as_str())
        .fetch_optional(&self.db)
        .await?;

        Ok(record)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<NotificationRecord>> {
        let record =
            sqlx::query_as::<_, NotificationRecord>("SELECT * FROM notification_records WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db)
                .await?;

        Ok(record)
    }

    /// Moves `pending` records for the appointment created before `cutoff` to
    /// `failed`, returning how many were moved.
    pub async fn fail_stale_pending(&self, appointment_id: Uuid, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE notification_records
            SET status = 'failed',
                error_message = $3,
                updated_at = now()
            WHERE appointment_id = $1
              AND status = 'pending'
              AND created_at < $2
            "#,
        )
        .bind(appointment_id)
        .bind(cutoff)
        .bind(INTERRUPTED_SEND_ERROR)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }
}
