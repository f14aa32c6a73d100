//! Member entity - A person participating in the community payment system.
//!
//! Each member carries a denormalized `balance`: the running total of their
//! unsettled transaction amounts for the currently active billing cycle.
//! The balance is reset to zero when a cycle closes and recomputed from the
//! remaining transactions after structural edits (deletes, voids).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Card standing for a member, driven by the payment reconciler.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum CardStatus {
    /// Card on file is usable (default, also restored after a paid status)
    #[sea_orm(string_value = "active")]
    Active,
    /// The last card charge attempt was declined
    #[sea_orm(string_value = "declined")]
    Declined,
}

/// Member database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "members")]
pub struct Model {
    /// Unique identifier for the member
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Email address for invoice delivery, None if not on file
    pub email: Option<String>,
    /// Contact phone number
    pub phone: Option<String>,
    /// Running balance for the open billing cycle (dollars, signed)
    pub balance: f64,
    /// Card standing, flipped by bulk payment-status updates
    pub card_status: CardStatus,
    /// When the member record was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Member and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One member has many transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
    /// One member has many invoices
    #[sea_orm(has_many = "super::invoice::Entity")]
    Invoices,
    /// One member may own businesses
    #[sea_orm(has_many = "super::business::Entity")]
    Businesses,
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

impl Related<super::business::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Businesses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
