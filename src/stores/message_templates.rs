use sqlx::PgPool;

use crate::{error::Result, models::MessageTemplate};

#[derive(Clone)]
pub struct MessageTemplateStore {
    db: PgPool,
}

impl MessageTemplateStore {
    pub fn new(db: PgPool) -> Self {
        MessageTemplateStore { db }
    }

    /// The template called `name`, or failing that the one flagged default.
    pub async fn find_default(&self, name: &str) -> Result<Option<MessageTemplate>> {
        let template = sqlx::query_as::<_, MessageTemplate>(
            r#"
            SELECT name, content, is_default
            FROM message_templates
            WHERE name = $1 OR is_default = TRUE
            ORDER BY (name = $1) DESC, is_default DESC, updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.db)
        .await?;

        Ok(template)
    }
}
