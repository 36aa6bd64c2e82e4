use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::types::uuid::Uuid;
use std::fmt;

/// Credentials for the messaging provider. One row is marked active.
#[derive(Clone, sqlx::FromRow)]
pub struct MessagingConfig {
    pub id: Uuid,
    pub api_url: String,
    pub api_token: String,
    pub phone_number_id: String,
    pub business_account_id: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for MessagingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagingConfig")
            .field("id", &self.id)
            .field("api_url", &self.api_url)
            .field("api_token", &"<redacted>")
            .field("phone_number_id", &self.phone_number_id)
            .field("business_account_id", &self.business_account_id)
            .field("is_active", &self.is_active)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct MessageTemplate {
    pub name: String,
    pub content: String,
    pub is_default: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
    Delivered,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
            NotificationStatus::Delivered => "delivered",
        }
    }
}

impl TryFrom<String> for NotificationStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(NotificationStatus::Pending),
            "sent" => Ok(NotificationStatus::Sent),
            "failed" => Ok(NotificationStatus::Failed),
            "delivered" => Ok(NotificationStatus::Delivered),
            other => Err(format!("unknown notification status: {}", other)),
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, sqlx::FromRow, Serialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub client_id: Uuid,
    pub appointment_id: Uuid,
    pub phone_number: String,
    pub message_content: String,
    #[sqlx(try_from = "String")]
    pub status: NotificationStatus,
    pub provider_message_id: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An appointment joined with its client, as read from the salon's tables.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct AppointmentForNotification {
    pub appointment_id: Uuid,
    pub client_id: Uuid,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub treatment: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

impl AppointmentForNotification {
    pub fn client_name(&self) -> String {
        match self.last_name.as_deref().map(str::trim) {
            Some(last_name) if !last_name.is_empty() => {
                format!("{} {}", self.first_name.trim(), last_name)
            }
            _ => self.first_name.trim().to_string(),
        }
    }

    /// The client's phone, if it holds anything but whitespace.
    pub fn usable_phone(&self) -> Option<&str> {
        self.phone
            .as_deref()
            .map(str::trim)
            .filter(|phone| !phone.is_empty())
    }
}
