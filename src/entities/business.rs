//! Business entity - A member-run business where purchases are made.
//!
//! A member owning at least one business is a "business owner" and is
//! eligible for the owner-balance offset at cycle close.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Business database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "businesses")]
pub struct Model {
    /// Unique identifier for the business
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name of the business
    pub name: String,
    /// Owning member, None for businesses without a member owner
    pub owner_member_id: Option<i64>,
    /// When the business record was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Business and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each business may belong to one owning member
    #[sea_orm(
        belongs_to = "super::member::Entity",
        from = "Column::OwnerMemberId",
        to = "super::member::Column::Id"
    )]
    Owner,
    /// One business has many transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
