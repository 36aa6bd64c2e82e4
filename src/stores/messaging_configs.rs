use sqlx::PgPool;

use crate::{
    error::{NotificationError, Result},
    models::MessagingConfig,
};

#[derive(Clone)]
pub struct MessagingConfigStore {
    db: PgPool,
}

impl MessagingConfigStore {
    pub fn new(db: PgPool) -> Self {
        MessagingConfigStore { db }
    }

    /// The active provider configuration. The most recently updated row wins
    /// if more than one is flagged active.
    pub async fn load_active(&self) -> Result<MessagingConfig> {
        let config = sqlx::query_as::<_, MessagingConfig>(
            r#"
            SELECT *
            FROM messaging_configs
            WHERE is_active = TRUE
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.db)
        .await?;

        config.ok_or(NotificationError::Configuration)
    }
}
