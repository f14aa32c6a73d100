//! Billing cycle entity - A billing period owning transactions and invoices.
//!
//! The status field is a state machine: `active → closed → invoiced`.
//! At most one cycle is active at a time, enforced by the cycle lifecycle
//! manager at creation time rather than by a storage constraint.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a billing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum CycleStatus {
    /// Accepting transactions; the one cycle new charges attach to
    #[sea_orm(string_value = "active")]
    Active,
    /// Frozen and settled; invoices exist for its members
    #[sea_orm(string_value = "closed")]
    Closed,
    /// Invoices have been dispatched (tracking state, not a financial one)
    #[sea_orm(string_value = "invoiced")]
    Invoiced,
}

impl CycleStatus {
    /// Whether the state machine permits moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Closed) | (Self::Closed, Self::Invoiced)
        )
    }
}

/// Billing cycle database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "billing_cycles")]
pub struct Model {
    /// Unique identifier for the cycle
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Free-text cycle name chosen by the admin (no uniqueness constraint)
    pub name: String,
    /// First day of the period
    pub start_date: Date,
    /// Last day of the period; a placeholder until close time corrects it
    pub end_date: Date,
    /// Lifecycle state
    pub status: CycleStatus,
    /// When the cycle was closed, None while active
    pub closed_at: Option<DateTimeUtc>,
    /// When the cycle record was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between BillingCycle and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One cycle owns many transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
    /// One cycle owns many invoices
    #[sea_orm(has_many = "super::invoice::Entity")]
    Invoices,
    /// One cycle has many recorded payments
    #[sea_orm(has_many = "super::cash_payment::Entity")]
    CashPayments,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoices.def()
    }
}

impl Related<super::cash_payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CashPayments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
