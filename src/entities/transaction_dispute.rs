//! Transaction dispute entity - A review request against a ledger row.
//!
//! Disputes are a pure review workflow: opening or resolving one never
//! alters transactions or balances.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Review state of a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum DisputeStatus {
    /// Awaiting admin review
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Upheld by an admin
    #[sea_orm(string_value = "resolved")]
    Resolved,
    /// Rejected by an admin
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Transaction dispute database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_disputes")]
pub struct Model {
    /// Unique identifier for the dispute
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Transaction under review
    pub transaction_id: i64,
    /// Why the submitter believes the row is wrong
    pub reason: String,
    /// Review state
    pub status: DisputeStatus,
    /// Notes recorded by the resolving admin
    pub admin_notes: Option<String>,
    /// Member who submitted the dispute
    pub submitted_by_member_id: i64,
    /// When the dispute was resolved, None while pending
    pub resolved_at: Option<DateTimeUtc>,
    /// When the dispute was submitted
    pub created_at: DateTimeUtc,
}

/// Defines relationships between TransactionDispute and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each dispute targets one transaction
    #[sea_orm(
        belongs_to = "super::transaction::Entity",
        from = "Column::TransactionId",
        to = "super::transaction::Column::Id"
    )]
    Transaction,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
