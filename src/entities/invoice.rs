//! Invoice entity - A per-member, per-cycle bill snapshot.
//!
//! Invoices are created atomically at cycle close, one per member with
//! nonzero activity. Two independent status axes exist: `status` tracks the
//! email lifecycle, `payment_status` tracks the money lifecycle. The amount
//! paid is never stored here; it is always derived from payment rows.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Email-lifecycle axis of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum InvoiceStatus {
    /// Created, nothing sent yet
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Email handed to the delivery provider
    #[sea_orm(string_value = "sent")]
    Sent,
    /// Provider confirmed delivery
    #[sea_orm(string_value = "delivered")]
    Delivered,
    /// Recipient opened the email
    #[sea_orm(string_value = "opened")]
    Opened,
    /// Settled via card processing
    #[sea_orm(string_value = "paid")]
    Paid,
    /// Settled in cash or Zelle
    #[sea_orm(string_value = "paid_cash")]
    PaidCash,
    /// Partially covered by cash payments
    #[sea_orm(string_value = "partial_cash")]
    PartialCash,
}

/// Money-lifecycle axis of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum PaymentStatus {
    /// No settlement recorded
    #[sea_orm(string_value = "unpaid")]
    Unpaid,
    /// Settled in cash
    #[sea_orm(string_value = "paid_cash")]
    PaidCash,
    /// Settled via Zelle
    #[sea_orm(string_value = "paid_zelle")]
    PaidZelle,
    /// Card charge recorded as processed (administrative status only)
    #[sea_orm(string_value = "card_processed")]
    CardProcessed,
    /// Card charge attempt declined
    #[sea_orm(string_value = "card_declined")]
    CardDeclined,
}

/// Invoice database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    /// Unique identifier for the invoice
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Cycle this invoice settles
    pub billing_cycle_id: i64,
    /// Member being billed
    pub member_id: i64,
    /// Billed total in dollars (post owner-offset)
    pub total_amount: f64,
    /// Number of transactions aggregated into the total
    pub transaction_count: i32,
    /// Email-lifecycle axis
    pub status: InvoiceStatus,
    /// Money-lifecycle axis
    pub payment_status: PaymentStatus,
    /// Optional note included in the invoice email
    pub email_message: Option<String>,
    /// When the invoice email was sent, None until then
    pub sent_at: Option<DateTimeUtc>,
    /// Address the invoice email went to
    pub email_sent_to: Option<String>,
    /// When the invoice row was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Invoice and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each invoice belongs to one billing cycle
    #[sea_orm(
        belongs_to = "super::billing_cycle::Entity",
        from = "Column::BillingCycleId",
        to = "super::billing_cycle::Column::Id"
    )]
    BillingCycle,
    /// Each invoice bills one member
    #[sea_orm(
        belongs_to = "super::member::Entity",
        from = "Column::MemberId",
        to = "super::member::Column::Id"
    )]
    Member,
    /// Payments recorded against this invoice
    #[sea_orm(has_many = "super::cash_payment::Entity")]
    CashPayments,
    /// Delivery log rows for this invoice
    #[sea_orm(has_many = "super::invoice_email::Entity")]
    InvoiceEmails,
}

impl Related<super::billing_cycle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BillingCycle.def()
    }
}

impl Related<super::member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Member.def()
    }
}

impl Related<super::cash_payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CashPayments.def()
    }
}

impl Related<super::invoice_email::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InvoiceEmails.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
