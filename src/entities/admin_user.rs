//! Admin user entity - Staff accounts referenced as payment collectors
//! and dispute resolvers. Authentication itself lives outside this crate.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Admin user database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "admin_users")]
pub struct Model {
    /// Unique identifier for the admin
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Login email
    pub email: String,
    /// When the account was created
    pub created_at: DateTimeUtc,
}

/// Admin users have no owned relations; they are referenced by id only.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
