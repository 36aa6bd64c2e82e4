use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::{
    models::{AppointmentForNotification, MessageTemplate},
    stores::MessageTemplateStore,
};

pub const DEFAULT_TEMPLATE_NAME: &str = "default";

pub const FALLBACK_TEMPLATE_CONTENT: &str = "Ciao {nome}, ti ricordiamo il tuo appuntamento domani alle {ora} per il trattamento {servizio} presso {location}.";

const MISSING_TIME: &str = "orario da confermare";
const MISSING_TREATMENT: &str = "trattamento";

pub fn fallback_template() -> MessageTemplate {
    MessageTemplate {
        name: DEFAULT_TEMPLATE_NAME.to_string(),
        content: FALLBACK_TEMPLATE_CONTENT.to_string(),
        is_default: true,
    }
}

/// The stored template for `name`, degrading to the built-in one when the
/// store has none or cannot be read.
pub async fn resolve_template(store: &MessageTemplateStore, name: &str) -> MessageTemplate {
    match store.find_default(name).await {
        Ok(Some(template)) => template,
        Ok(None) => {
            log::warn!("No stored template '{}', using the built-in reminder", name);
            fallback_template()
        }
        Err(e) => {
            log::warn!(
                "Unable to load template '{}', using the built-in reminder: {}",
                name,
                e
            );
            fallback_template()
        }
    }
}

/// Substitutes the placeholders in one pass, so values that happen to look
/// like placeholders are never expanded again.
pub fn render(
    template: &MessageTemplate,
    appointment: &AppointmentForNotification,
    location: &str,
) -> String {
    placeholder_regex()
        .replace_all(&template.content, |captures: &Captures| {
            match placeholder_value(&captures[1], appointment, location) {
                Some(value) => value,
                None => captures[0].to_string(),
            }
        })
        .into_owned()
}

fn placeholder_value(
    token: &str,
    appointment: &AppointmentForNotification,
    location: &str,
) -> Option<String> {
    let value = match token {
        "nome" => appointment.first_name.trim().to_string(),
        "cognome" => appointment
            .last_name
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_string(),
        "ora" => appointment
            .time
            .map(|time| time.format("%H:%M").to_string())
            .unwrap_or_else(|| MISSING_TIME.to_string()),
        "servizio" => appointment
            .treatment
            .as_deref()
            .map(str::trim)
            .filter(|treatment| !treatment.is_empty())
            .unwrap_or(MISSING_TREATMENT)
            .to_string(),
        "location" => location.to_string(),
        "data" => appointment.date.format("%d/%m/%Y").to_string(),
        _ => return None,
    };

    Some(value)
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder pattern is valid"))
}
