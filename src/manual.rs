use sqlx::types::Uuid;

use crate::{
    error::{NotificationError, Result},
    models::{NotificationRecord, NotificationStatus},
    notifier::{Dedup, Notifier},
};

/// Operator-triggered sends: one appointment at a time, outside the batch.
#[derive(Clone)]
pub struct ManualSender {
    notifier: Notifier,
}

impl ManualSender {
    pub fn new(notifier: Notifier) -> Self {
        ManualSender { notifier }
    }

    /// Same steps as one batch item. Dispatch failures come back as a
    /// `failed` record; only problems before dispatch are errors.
    pub async fn send_single_confirmation(&self, appointment_id: Uuid) -> Result<NotificationRecord> {
        let appointment = self
            .notifier
            .appointments
            .find_for_notification(appointment_id)
            .await?
            .ok_or(NotificationError::NotFound {
                entity: "appointment",
                id: appointment_id,
            })?;

        if appointment.usable_phone().is_none() {
            return Err(NotificationError::Validation(format!(
                "client {} has no phone number",
                appointment.client_name()
            )));
        }

        if self.notifier.dedup(appointment_id).await? != Dedup::Clear {
            return Err(NotificationError::AlreadySent { appointment_id });
        }

        let config = self.notifier.load_config().await?;
        let template = self.notifier.resolve_template().await;

        log::info!(
            "Sending manual reminder for appointment {} to {}",
            appointment_id,
            appointment.client_name()
        );
        self.notifier.deliver(&config, &template, &appointment).await
    }

    /// Re-dispatches the stored content of a failed record, without
    /// rendering it again.
    pub async fn resend_message(&self, message_id: Uuid) -> Result<NotificationRecord> {
        let not_found = || NotificationError::NotFound {
            entity: "message",
            id: message_id,
        };

        let record = self
            .notifier
            .records
            .find_by_id(message_id)
            .await?
            .ok_or_else(not_found)?;

        let dedup = self.notifier.dedup(record.appointment_id).await?;

        // dedup may have just failed this very record if it was a stale pending one
        let record = self
            .notifier
            .records
            .find_by_id(message_id)
            .await?
            .ok_or_else(not_found)?;

        match record.status {
            NotificationStatus::Failed if dedup == Dedup::Clear => {}
            NotificationStatus::Pending => {
                return Err(NotificationError::Validation(format!(
                    "message {} is still being sent",
                    message_id
                )))
            }
            _ => {
                return Err(NotificationError::AlreadySent {
                    appointment_id: record.appointment_id,
                })
            }
        }

        let config = self.notifier.load_config().await?;

        log::info!(
            "Resending message {} for appointment {}",
            message_id,
            record.appointment_id
        );
        self.notifier.dispatch_record(&config, &record).await
    }

    pub async fn find_message(&self, message_id: Uuid) -> Result<NotificationRecord> {
        self.notifier
            .records
            .find_by_id(message_id)
            .await?
            .ok_or(NotificationError::NotFound {
                entity: "message",
                id: message_id,
            })
    }
}
