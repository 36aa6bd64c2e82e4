use chrono::{DateTime, Utc};
use sqlx::{types::Uuid, PgPool};
use std::time::Duration;

use crate::{
    dispatcher::{DispatchOutcome, Dispatcher},
    error::{NotificationError, Result},
    models::{
        AppointmentForNotification, MessageTemplate, MessagingConfig, NotificationRecord,
        NotificationStatus,
    },
    stores::{
        AppointmentStore, MessageTemplateStore, MessagingConfigStore, NewNotificationRecord,
        NotificationRecordStore, StatusUpdate,
    },
    templates::{render, resolve_template, DEFAULT_TEMPLATE_NAME},
};

/// Result of the dedup check for one appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dedup {
    Clear,
    AlreadySent,
    InFlight,
}

/// The per-appointment building blocks shared by the batch runner and the
/// manual send paths.
#[derive(Clone)]
pub struct Notifier {
    pub(crate) appointments: AppointmentStore,
    pub(crate) records: NotificationRecordStore,
    templates: MessageTemplateStore,
    configs: MessagingConfigStore,
    dispatcher: Dispatcher,
    location: String,
    pending_stale_after: Duration,
}

impl Notifier {
    pub fn new(
        db: PgPool,
        dispatcher: Dispatcher,
        location: String,
        pending_stale_after: Duration,
    ) -> Self {
        Notifier {
            appointments: AppointmentStore::new(db.clone()),
            records: NotificationRecordStore::new(db.clone()),
            templates: MessageTemplateStore::new(db.clone()),
            configs: MessagingConfigStore::new(db),
            dispatcher,
            location,
            pending_stale_after,
        }
    }

    pub async fn load_config(&self) -> Result<MessagingConfig> {
        self.configs.load_active().await
    }

    pub async fn resolve_template(&self) -> MessageTemplate {
        resolve_template(&self.templates, DEFAULT_TEMPLATE_NAME).await
    }

    /// Sent or delivered records block a new send, as does a pending record
    /// young enough to still be in flight. Older pending records are failed
    /// first so they stop blocking.
    pub async fn dedup(&self, appointment_id: Uuid) -> Result<Dedup> {
        let cutoff = chrono::Duration::from_std(self.pending_stale_after)
            .ok()
            .and_then(|stale_after| Utc::now().checked_sub_signed(stale_after))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let expired = self.records.fail_stale_pending(appointment_id, cutoff).await?;
        if expired > 0 {
            log::warn!(
                "Marked {} stale pending reminder(s) for appointment {} as failed",
                expired,
                appointment_id
            );
        }

        for status in [NotificationStatus::Sent, NotificationStatus::Delivered] {
            if self
                .records
                .find_by_appointment_id(appointment_id, status)
                .await?
                .is_some()
            {
                return Ok(Dedup::AlreadySent);
            }
        }

        if self
            .records
            .find_by_appointment_id(appointment_id, NotificationStatus::Pending)
            .await?
            .is_some()
        {
            return Ok(Dedup::InFlight);
        }

        Ok(Dedup::Clear)
    }

    /// Renders, persists as pending, dispatches and records the outcome.
    pub async fn deliver(
        &self,
        config: &MessagingConfig,
        template: &MessageTemplate,
        appointment: &AppointmentForNotification,
    ) -> Result<NotificationRecord> {
        let phone_number = appointment.usable_phone().ok_or_else(|| {
            NotificationError::Validation(format!(
                "client {} has no phone number",
                appointment.client_name()
            ))
        })?;

        let content = render(template, appointment, &self.location);

        let record = self
            .records
            .create(NewNotificationRecord {
                client_id: appointment.client_id,
                appointment_id: appointment.appointment_id,
                phone_number,
                message_content: &content,
            })
            .await?;

        self.dispatch_record(config, &record).await
    }

    /// Dispatches the stored content of `record` as-is and writes back the
    /// outcome. Transport failures end up as a failed record, not an error.
    pub async fn dispatch_record(
        &self,
        config: &MessagingConfig,
        record: &NotificationRecord,
    ) -> Result<NotificationRecord> {
        let outcome = match self
            .dispatcher
            .send(config, &record.phone_number, &record.message_content)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => DispatchOutcome::Rejected {
                error: e.to_string(),
            },
        };

        let update = match outcome {
            DispatchOutcome::Accepted {
                provider_message_id,
            } => {
                log::info!(
                    "Reminder {} for appointment {} accepted as {}",
                    record.id,
                    record.appointment_id,
                    provider_message_id
                );
                StatusUpdate::sent(provider_message_id, Utc::now())
            }
            DispatchOutcome::Rejected { error } => {
                log::error!(
                    "Reminder {} for appointment {} failed: {}",
                    record.id,
                    record.appointment_id,
                    error
                );
                StatusUpdate::failed(error)
            }
        };

        self.records.update_status(record.id, &update).await
    }
}
