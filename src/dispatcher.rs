use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{
    error::{NotificationError, Result},
    models::MessagingConfig,
};

/// What the provider made of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Accepted { provider_message_id: String },
    Rejected { error: String },
}

/// Sends rendered reminders to the provider. Holds no state besides the
/// HTTP client.
#[derive(Clone)]
pub struct Dispatcher {
    client: Client,
}

impl Dispatcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        Ok(Dispatcher { client })
    }

    /// One provider call. Provider rejections come back as
    /// `DispatchOutcome::Rejected`; only transport failures are `Err`.
    pub async fn send(
        &self,
        config: &MessagingConfig,
        phone_number: &str,
        content: &str,
    ) -> Result<DispatchOutcome> {
        let to = normalize_phone(phone_number);
        if to.is_empty() {
            return Ok(DispatchOutcome::Rejected {
                error: format!("invalid phone number: {}", phone_number),
            });
        }

        let url = format!("{}/messages", config.api_url.trim_end_matches('/'));
        log::trace!("provider URL: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&config.api_token)
            .json(&OutgoingMessage::text(&to, content))
            .send()
            .await
            .map_err(|e| NotificationError::Transport(format!("provider unreachable: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NotificationError::Transport(format!("provider response unreadable: {}", e)))?;

        Ok(interpret_response(status, &body))
    }
}

/// Keeps only the digits of a phone number, as the provider expects.
pub fn normalize_phone(phone_number: &str) -> String {
    phone_number.chars().filter(char::is_ascii_digit).collect()
}

fn interpret_response(status: StatusCode, body: &str) -> DispatchOutcome {
    if !status.is_success() {
        let error = serde_json::from_str::<ErrorResponse>(body)
            .ok()
            .and_then(|response| response.error)
            .and_then(|error| error.message)
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| format!("Errore API: {}", status.as_u16()));

        return DispatchOutcome::Rejected { error };
    }

    match serde_json::from_str::<SendResponse>(body) {
        Ok(response) => match response.messages.into_iter().next() {
            Some(message) if !message.id.is_empty() => DispatchOutcome::Accepted {
                provider_message_id: message.id,
            },
            // Recorded as failed so it stays resendable; the provider may still
            // have delivered it, hence the body in the log for reconciliation.
            _ => {
                log::warn!("Provider accepted a message without an id: {}", body);
                DispatchOutcome::Rejected {
                    error: "provider response carried no message id".to_string(),
                }
            }
        },
        Err(e) => {
            log::error!("Error parsing provider response: {}", e);
            log::error!("Response: {}", body);
            DispatchOutcome::Rejected {
                error: format!("unexpected provider response: {}", e),
            }
        }
    }
}

#[derive(Serialize)]
struct OutgoingMessage<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextBody<'a>,
}

impl<'a> OutgoingMessage<'a> {
    fn text(to: &'a str, body: &'a str) -> Self {
        OutgoingMessage {
            messaging_product: "whatsapp",
            to,
            kind: "text",
            text: TextBody { body },
        }
    }
}

#[derive(Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}
