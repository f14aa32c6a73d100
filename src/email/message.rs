//! Email delivery collaborator contract.
//!
//! The billing engine never talks to an email provider directly; it hands a
//! rendered [`EmailMessage`] to an [`EmailDelivery`] implementation. The
//! production implementation is the HTTP client in [`crate::email::resend`];
//! tests substitute a mock. No implementation retries - failed sends are
//! retried by re-invoking the dispatcher.

use crate::errors::Result;
use async_trait::async_trait;

/// What kind of account the recipient is, carried as provider metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientType {
    /// A community member
    Member,
    /// A staff account
    Admin,
}

impl RecipientType {
    /// Tag value sent to the provider.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Admin => "admin",
        }
    }
}

/// A fully rendered email ready for delivery.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Rendered HTML body
    pub html: String,
    /// Recipient kind, for provider-side tagging
    pub recipient_type: RecipientType,
    /// Recipient row id, for provider-side tagging
    pub recipient_id: i64,
}

/// Outcome of a successful hand-off to the provider.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    /// Provider-assigned message id, when the provider returns one
    pub id: Option<String>,
}

/// The delivery collaborator seam.
#[async_trait]
pub trait EmailDelivery: Send + Sync {
    /// Delivers one message, returning the provider's message id on success.
    async fn send(&self, message: &EmailMessage) -> Result<SendOutcome>;
}
