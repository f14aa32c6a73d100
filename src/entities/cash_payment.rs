//! Cash payment entity - An append-only payment event against an invoice.
//!
//! An invoice's "amount paid" is always the sum of these rows at read time,
//! never a stored field. Rows are deleted only by the unpaid-reset and
//! unmark flows, which discard payment history by design.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Settlement channel for a payment event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum PaymentType {
    /// Physical cash handed to a collector
    #[sea_orm(string_value = "cash")]
    Cash,
    /// Zelle transfer
    #[sea_orm(string_value = "zelle")]
    Zelle,
}

/// Cash payment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cash_payments")]
pub struct Model {
    /// Unique identifier for the payment event
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Invoice the payment applies to
    pub invoice_id: Option<i64>,
    /// Member the payment came from
    pub member_id: i64,
    /// Billing cycle the payment settles
    pub billing_cycle_id: i64,
    /// Amount paid in dollars
    pub amount: f64,
    /// Settlement channel
    pub payment_type: PaymentType,
    /// Free-text notes from the collector
    pub notes: Option<String>,
    /// Collecting member, if a member took the payment
    pub collected_by_member_id: Option<i64>,
    /// Collecting admin, if an admin took the payment
    pub collected_by_admin_id: Option<i64>,
    /// When the payment was recorded
    pub created_at: DateTimeUtc,
}

/// Defines relationships between CashPayment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each payment may reference the invoice it settles
    #[sea_orm(
        belongs_to = "super::invoice::Entity",
        from = "Column::InvoiceId",
        to = "super::invoice::Column::Id"
    )]
    Invoice,
    /// Each payment belongs to one member
    #[sea_orm(
        belongs_to = "super::member::Entity",
        from = "Column::MemberId",
        to = "super::member::Column::Id"
    )]
    Member,
    /// Each payment belongs to one billing cycle
    #[sea_orm(
        belongs_to = "super::billing_cycle::Entity",
        from = "Column::BillingCycleId",
        to = "super::billing_cycle::Column::Id"
    )]
    BillingCycle,
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoice.def()
    }
}

impl Related<super::member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Member.def()
    }
}

impl Related<super::billing_cycle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BillingCycle.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
