//! Invoice email entity - Delivery log for sent invoice emails.
//!
//! One row is appended per successful send. Failed sends leave no trace
//! here; the invoice stays pending and the send is retryable.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Invoice email database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoice_emails")]
pub struct Model {
    /// Unique identifier for the log row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Invoice the email was for
    pub invoice_id: i64,
    /// Address the email was delivered to
    pub recipient: String,
    /// Subject line as sent
    pub subject: String,
    /// Message id returned by the delivery provider
    pub provider_message_id: Option<String>,
    /// When the send succeeded
    pub created_at: DateTimeUtc,
}

/// Defines relationships between InvoiceEmail and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each log row belongs to one invoice
    #[sea_orm(
        belongs_to = "super::invoice::Entity",
        from = "Column::InvoiceId",
        to = "super::invoice::Column::Id"
    )]
    Invoice,
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
