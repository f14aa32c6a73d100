//! HTTP delivery client for the hosted email provider.
//!
//! Speaks the provider's JSON send API over `reqwest`. One request per
//! message, a flat timeout, no retries - the dispatcher decides what a
//! failure means.

use crate::{
    config::settings::{EmailSettings, email_api_key},
    email::message::{EmailDelivery, EmailMessage, SendOutcome},
    errors::{Error, Result},
};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const API_URL: &str = "https://api.resend.com/emails";
const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Provider client carrying the API key and sender identity.
pub struct ResendClient {
    http: reqwest::Client,
    api_key: String,
    from: String,
    reply_to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: Option<String>,
}

impl ResendClient {
    /// Builds a client with an explicit API key.
    pub fn new(api_key: String, email: &EmailSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| Error::Config {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            api_key,
            from: email.from.clone(),
            reply_to: email.reply_to.clone(),
        })
    }

    /// Builds a client reading the API key from the environment.
    pub fn from_environment(email: &EmailSettings) -> Result<Self> {
        Self::new(email_api_key()?, email)
    }
}

#[async_trait]
impl EmailDelivery for ResendClient {
    async fn send(&self, message: &EmailMessage) -> Result<SendOutcome> {
        let mut body = serde_json::json!({
            "from": self.from,
            "to": [message.to],
            "subject": message.subject,
            "html": message.html,
            "tags": [
                { "name": "recipient_type", "value": message.recipient_type.as_str() },
                { "name": "recipient_id", "value": message.recipient_id.to_string() },
            ],
        });
        if let Some(reply_to) = &self.reply_to {
            body["reply_to"] = serde_json::json!(reply_to);
        }

        let response = self
            .http
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::EmailDelivery {
                message: format!("Request to email provider failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::EmailDelivery {
                message: format!("Email provider returned {status}: {detail}"),
            });
        }

        let parsed: SendResponse = response.json().await.map_err(|e| Error::EmailDelivery {
            message: format!("Unexpected provider response: {e}"),
        })?;

        Ok(SendOutcome { id: parsed.id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::message::RecipientType;

    #[test]
    fn test_client_builds_from_settings() {
        let email = EmailSettings {
            from: "PDCA Billing <billing@example.org>".to_string(),
            reply_to: Some("office@example.org".to_string()),
        };

        let client = ResendClient::new("re_test_key".to_string(), &email).unwrap();
        assert_eq!(client.from, "PDCA Billing <billing@example.org>");
        assert_eq!(client.reply_to.as_deref(), Some("office@example.org"));
    }

    #[test]
    fn test_recipient_type_tag_values() {
        assert_eq!(RecipientType::Member.as_str(), "member");
        assert_eq!(RecipientType::Admin.as_str(), "admin");
    }
}
