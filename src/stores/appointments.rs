use chrono::NaiveDate;
use sqlx::{types::Uuid, PgPool};

use crate::{error::Result, models::AppointmentForNotification};

const APPOINTMENT_WITH_CLIENT: &str = r#"
    SELECT
        appointments.id AS appointment_id,
        appointments.client_id,
        appointments.date,
        appointments.time,
        appointments.treatment,
        clients.first_name,
        clients.last_name,
        clients.phone
    FROM appointments
    JOIN clients ON clients.id = appointments.client_id
"#;

/// Read-only view over the salon's appointment and client tables.
#[derive(Clone)]
pub struct AppointmentStore {
    db: PgPool,
}

impl AppointmentStore {
    pub fn new(db: PgPool) -> Self {
        AppointmentStore { db }
    }

    /// Pending appointments on `day` whose client has a phone number, in
    /// chronological order.
    pub async fn pending_for_day(&self, day: NaiveDate) -> Result<Vec<AppointmentForNotification>> {
        let query = format!(
            r#"{}
            WHERE appointments.date = $1
              AND appointments.status = 'pending'
              AND clients.phone IS NOT NULL
              AND btrim(clients.phone) <> ''
            ORDER BY appointments.time NULLS LAST, appointments.created_at, appointments.id
            "#,
            APPOINTMENT_WITH_CLIENT
        );

        let appointments = sqlx::query_as::<_, AppointmentForNotification>(&query)
            .bind(day)
            .fetch_all(&self.db)
            .await?;

        Ok(appointments)
    }

    pub async fn find_for_notification(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<AppointmentForNotification>> {
        let query = format!("{} WHERE appointments.id = $1", APPOINTMENT_WITH_CLIENT);

        let appointment = sqlx::query_as::<_, AppointmentForNotification>(&query)
            .bind(appointment_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(appointment)
    }
}
