//! Ledger write paths - transaction creation, edits, voids, and bulk upload.
//!
//! Every write path here maintains the member's denormalized running balance:
//! creation applies an incremental delta, while edits, deletes, and voids
//! trigger a full recomputation from the remaining rows. New transactions
//! attach to the currently active billing cycle when one exists.

use crate::{
    core::{balance, cycle},
    entities::{Member, Transaction, TransactionSource, member, transaction},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::HashMap;

/// Input for a single ledger write.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// Member being charged or credited
    pub member_id: i64,
    /// Business where the purchase happened, None for manual entries
    pub business_id: Option<i64>,
    /// Signed amount (positive for charges, negative for credits)
    pub amount: f64,
    /// Human-readable description
    pub description: String,
    /// Which write path produced the entry
    pub source: TransactionSource,
}

/// Summary of a bulk upload.
#[derive(Debug, Clone)]
pub struct BulkUploadResult {
    /// Number of transaction rows inserted
    pub inserted: usize,
    /// Number of distinct members whose balance was recomputed
    pub members_recalculated: usize,
}

fn validate_amount(amount: f64) -> Result<()> {
    if amount == 0.0 || !amount.is_finite() {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(())
}

/// Creates a new transaction and incrementally updates the member balance.
///
/// Snapshots the member's balance before and after the write into the row,
/// attaches the active cycle's id when one exists, and applies the amount to
/// `members.balance` atomically. Runs inside a database transaction.
///
/// # Errors
/// Rejects zero and non-finite amounts; fails if the member does not exist.
pub async fn create_transaction(
    db: &DatabaseConnection,
    new: NewTransaction,
) -> Result<transaction::Model> {
    validate_amount(new.amount)?;

    let txn = db.begin().await?;

    let member = Member::find_by_id(new.member_id)
        .one(&txn)
        .await?
        .ok_or(Error::MemberNotFound { id: new.member_id })?;

    let active_cycle = cycle::get_active_cycle(&txn).await?;

    let balance_before = member.balance;
    let row = transaction::ActiveModel {
        member_id: Set(new.member_id),
        business_id: Set(new.business_id),
        amount: Set(new.amount),
        description: Set(new.description),
        billing_cycle_id: Set(active_cycle.map(|c| c.id)),
        balance_before: Set(balance_before),
        balance_after: Set(balance_before + new.amount),
        source: Set(new.source),
        voided: Set(false),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let result = row.insert(&txn).await?;

    balance::apply_balance_delta(&txn, new.member_id, new.amount).await?;

    txn.commit().await?;

    Ok(result)
}

/// Edits a transaction's amount and recomputes the owning member's balance.
pub async fn update_transaction_amount(
    db: &DatabaseConnection,
    transaction_id: i64,
    amount: f64,
) -> Result<transaction::Model> {
    validate_amount(amount)?;

    let txn = db.begin().await?;

    let row = Transaction::find_by_id(transaction_id)
        .one(&txn)
        .await?
        .ok_or(Error::TransactionNotFound { id: transaction_id })?;

    let member_id = row.member_id;
    let balance_before = row.balance_before;

    let mut active_model: transaction::ActiveModel = row.into();
    active_model.amount = Set(amount);
    active_model.balance_after = Set(balance_before + amount);
    let updated = active_model.update(&txn).await?;

    balance::recalculate_member_balance(&txn, member_id).await?;

    txn.commit().await?;

    Ok(updated)
}

/// Deletes a transaction and recomputes the owning member's balance from the
/// remaining rows.
pub async fn delete_transaction(db: &DatabaseConnection, transaction_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    let row = Transaction::find_by_id(transaction_id)
        .one(&txn)
        .await?
        .ok_or(Error::TransactionNotFound { id: transaction_id })?;

    let member_id = row.member_id;
    row.delete(&txn).await?;

    balance::recalculate_member_balance(&txn, member_id).await?;

    txn.commit().await?;
    Ok(())
}

/// Voids a transaction - a reversing correction distinct from deletion.
///
/// The row is kept for audit with `voided = true` and stops counting toward
/// every aggregation; the member's balance is recomputed without it.
pub async fn void_transaction(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<transaction::Model> {
    let txn = db.begin().await?;

    let row = Transaction::find_by_id(transaction_id)
        .one(&txn)
        .await?
        .ok_or(Error::TransactionNotFound { id: transaction_id })?;

    if row.voided {
        return Err(Error::InvalidStatus {
            message: format!("Transaction {transaction_id} is already voided"),
        });
    }

    let member_id = row.member_id;
    let mut active_model: transaction::ActiveModel = row.into();
    active_model.voided = Set(true);
    let voided = active_model.update(&txn).await?;

    balance::recalculate_member_balance(&txn, member_id).await?;

    txn.commit().await?;

    Ok(voided)
}

/// Inserts a batch of transactions, then recomputes each affected member's
/// balance exactly once after all inserts.
///
/// Per-row balance snapshots are chained in memory so several rows for the
/// same member record a consistent before/after sequence.
pub async fn bulk_create_transactions(
    db: &DatabaseConnection,
    entries: Vec<NewTransaction>,
) -> Result<BulkUploadResult> {
    for entry in &entries {
        validate_amount(entry.amount)?;
    }

    let txn = db.begin().await?;

    let active_cycle_id = cycle::get_active_cycle(&txn).await?.map(|c| c.id);

    // Running balance per member, seeded from the stored balance on first use
    let mut running: HashMap<i64, f64> = HashMap::new();
    let mut inserted = 0usize;

    for entry in &entries {
        let balance_before = match running.get(&entry.member_id) {
            Some(b) => *b,
            None => {
                let member = Member::find_by_id(entry.member_id)
                    .one(&txn)
                    .await?
                    .ok_or(Error::MemberNotFound {
                        id: entry.member_id,
                    })?;
                member.balance
            }
        };

        let balance_after = balance_before + entry.amount;
        running.insert(entry.member_id, balance_after);

        let row = transaction::ActiveModel {
            member_id: Set(entry.member_id),
            business_id: Set(entry.business_id),
            amount: Set(entry.amount),
            description: Set(entry.description.clone()),
            billing_cycle_id: Set(active_cycle_id),
            balance_before: Set(balance_before),
            balance_after: Set(balance_after),
            source: Set(entry.source.clone()),
            voided: Set(false),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        };
        row.insert(&txn).await?;
        inserted += 1;
    }

    let member_ids: Vec<i64> = running.keys().copied().collect();
    let members_recalculated = balance::recalculate_member_balances(&txn, &member_ids).await?;

    txn.commit().await?;

    Ok(BulkUploadResult {
        inserted,
        members_recalculated,
    })
}

/// Retrieves a specific transaction by its unique ID.
pub async fn get_transaction_by_id(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<Option<transaction::Model>> {
    Transaction::find_by_id(transaction_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves all of a member's transactions, newest first.
pub async fn get_transactions_for_member(
    db: &DatabaseConnection,
    member_id: i64,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::MemberId.eq(member_id))
        .order_by_desc(transaction::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a member's non-voided transactions for one billing cycle,
/// oldest first (the order they appear on the invoice).
pub async fn get_member_cycle_transactions<C>(
    db: &C,
    member_id: i64,
    billing_cycle_id: i64,
) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::MemberId.eq(member_id))
        .filter(transaction::Column::BillingCycleId.eq(billing_cycle_id))
        .filter(transaction::Column::Voided.eq(false))
        .order_by_asc(transaction::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}
