//! Transaction entity - A single charge or credit on a member's ledger.
//!
//! Rows are written by kiosk purchases, manual admin entries, bulk uploads,
//! and the synthetic owner-offset entries generated at cycle close. Voided
//! rows are kept for audit and excluded from every aggregation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Where a transaction row came from.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum TransactionSource {
    /// Recorded from the kiosk purchase flow
    #[sea_orm(string_value = "kiosk")]
    Kiosk,
    /// Entered manually from the admin panel (also used for owner offsets)
    #[sea_orm(string_value = "admin_panel")]
    AdminPanel,
    /// Imported through the bulk upload path
    #[sea_orm(string_value = "bulk_upload")]
    BulkUpload,
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Member the transaction belongs to
    pub member_id: i64,
    /// Business where the purchase happened, None for synthetic entries
    pub business_id: Option<i64>,
    /// Signed amount in dollars (positive for charges, negative for credits)
    pub amount: f64,
    /// Human-readable description
    pub description: String,
    /// Billing cycle the transaction was recorded under, None if no cycle was active
    pub billing_cycle_id: Option<i64>,
    /// Member balance immediately before this transaction was applied
    pub balance_before: f64,
    /// Member balance immediately after this transaction was applied
    pub balance_after: f64,
    /// Which write path produced the row
    pub source: TransactionSource,
    /// Reversal flag - voided rows stay for audit but never count
    pub voided: bool,
    /// When the transaction was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one member
    #[sea_orm(
        belongs_to = "super::member::Entity",
        from = "Column::MemberId",
        to = "super::member::Column::Id"
    )]
    Member,
    /// Each transaction may reference the business it happened at
    #[sea_orm(
        belongs_to = "super::business::Entity",
        from = "Column::BusinessId",
        to = "super::business::Column::Id"
    )]
    Business,
    /// Each transaction may belong to one billing cycle
    #[sea_orm(
        belongs_to = "super::billing_cycle::Entity",
        from = "Column::BillingCycleId",
        to = "super::billing_cycle::Column::Id"
    )]
    BillingCycle,
    /// A transaction can be disputed
    #[sea_orm(has_many = "super::transaction_dispute::Entity")]
    Disputes,
}

impl Related<super::member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Member.def()
    }
}

impl Related<super::business::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Business.def()
    }
}

impl Related<super::billing_cycle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BillingCycle.def()
    }
}

impl Related<super::transaction_dispute::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Disputes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
