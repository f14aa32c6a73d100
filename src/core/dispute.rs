//! Transaction dispute workflow - submit and resolve review requests.
//!
//! Disputes are purely a review queue: nothing here touches transactions or
//! balances. A correction that comes out of a resolved dispute goes through
//! the regular ledger write paths.

use crate::{
    entities::{
        DisputeStatus, Transaction, TransactionDispute, transaction_dispute,
    },
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};

/// Opens a dispute against a transaction.
pub async fn submit_dispute(
    db: &DatabaseConnection,
    transaction_id: i64,
    reason: String,
    submitted_by_member_id: i64,
) -> Result<transaction_dispute::Model> {
    if reason.trim().is_empty() {
        return Err(Error::InvalidStatus {
            message: "Dispute reason cannot be empty".to_string(),
        });
    }

    Transaction::find_by_id(transaction_id)
        .one(db)
        .await?
        .ok_or(Error::TransactionNotFound { id: transaction_id })?;

    let dispute = transaction_dispute::ActiveModel {
        transaction_id: Set(transaction_id),
        reason: Set(reason.trim().to_string()),
        status: Set(DisputeStatus::Pending),
        admin_notes: Set(None),
        submitted_by_member_id: Set(submitted_by_member_id),
        resolved_at: Set(None),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    dispute.insert(db).await.map_err(Into::into)
}

/// Closes a dispute with a resolution and optional admin notes.
///
/// Only pending disputes can be resolved; the resolution must be
/// `resolved` or `rejected`.
pub async fn resolve_dispute(
    db: &DatabaseConnection,
    dispute_id: i64,
    resolution: DisputeStatus,
    admin_notes: Option<String>,
) -> Result<transaction_dispute::Model> {
    if resolution == DisputeStatus::Pending {
        return Err(Error::InvalidStatus {
            message: "A dispute cannot be resolved back to pending".to_string(),
        });
    }

    let dispute = TransactionDispute::find_by_id(dispute_id)
        .one(db)
        .await?
        .ok_or(Error::DisputeNotFound { id: dispute_id })?;

    if dispute.status != DisputeStatus::Pending {
        return Err(Error::InvalidStatus {
            message: format!("Dispute {dispute_id} is already resolved"),
        });
    }

    let mut active_model: transaction_dispute::ActiveModel = dispute.into();
    active_model.status = Set(resolution);
    active_model.admin_notes = Set(admin_notes);
    active_model.resolved_at = Set(Some(chrono::Utc::now()));
    active_model.update(db).await.map_err(Into::into)
}

/// Returns the pending dispute queue, oldest first.
pub async fn open_disputes(db: &DatabaseConnection) -> Result<Vec<transaction_dispute::Model>> {
    TransactionDispute::find()
        .filter(transaction_dispute::Column::Status.eq(DisputeStatus::Pending))
        .order_by_asc(transaction_dispute::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}
