//! Balance recalculation - keeps `members.balance` consistent with the ledger.
//!
//! The running balance is a denormalized sum maintained incrementally by the
//! transaction write paths. After structural edits (deletes, voids, cycle
//! deletion) the incremental figure can no longer be trusted, so it is
//! recomputed here from the member's remaining non-voided transactions.

use crate::{
    entities::{Member, Transaction, member, transaction},
    errors::{Error, Result},
};
use sea_orm::{Set, prelude::*};
use std::collections::BTreeSet;

/// Atomically adds `amount_delta` to a member's balance.
///
/// Uses a single SQL UPDATE (`balance = balance + delta`) instead of a
/// read-modify-write, so interleaved writers cannot lose updates.
///
/// # Arguments
/// * `db` - Database connection or transaction
/// * `member_id` - Member whose balance to adjust
/// * `amount_delta` - Amount to add (negative to subtract)
///
/// # Returns
/// The updated member model
pub async fn apply_balance_delta<C>(db: &C, member_id: i64, amount_delta: f64) -> Result<member::Model>
where
    C: ConnectionTrait,
{
    use sea_orm::sea_query::Expr;

    let _member = Member::find_by_id(member_id)
        .one(db)
        .await?
        .ok_or(Error::MemberNotFound { id: member_id })?;

    Member::update_many()
        .col_expr(
            member::Column::Balance,
            Expr::col(member::Column::Balance).add(amount_delta),
        )
        .filter(member::Column::Id.eq(member_id))
        .exec(db)
        .await?;

    Member::find_by_id(member_id)
        .one(db)
        .await?
        .ok_or(Error::MemberNotFound { id: member_id })
}

/// Recomputes a member's balance from scratch as the sum of all their
/// non-voided transactions currently in storage, and writes it back.
///
/// This is the "all outstanding" recompute used after transaction deletes,
/// voids, and cycle deletion; it intentionally applies no cycle filter.
///
/// # Returns
/// The recomputed balance
pub async fn recalculate_member_balance<C>(db: &C, member_id: i64) -> Result<f64>
where
    C: ConnectionTrait,
{
    let member = Member::find_by_id(member_id)
        .one(db)
        .await?
        .ok_or(Error::MemberNotFound { id: member_id })?;

    let rows = Transaction::find()
        .filter(transaction::Column::MemberId.eq(member_id))
        .filter(transaction::Column::Voided.eq(false))
        .all(db)
        .await?;

    let balance: f64 = rows.iter().map(|t| t.amount).sum();

    let mut active_model: member::ActiveModel = member.into();
    active_model.balance = Set(balance);
    active_model.update(db).await?;

    Ok(balance)
}

/// Recomputes balances for a batch of members, once per distinct member.
///
/// Batched mutations (bulk deletes, cycle deletion) must not recompute once
/// per deleted row; ids are deduplicated so each affected member is
/// recomputed exactly once after all the deletes have happened.
pub async fn recalculate_member_balances<C>(db: &C, member_ids: &[i64]) -> Result<usize>
where
    C: ConnectionTrait,
{
    let distinct: BTreeSet<i64> = member_ids.iter().copied().collect();

    for member_id in &distinct {
        recalculate_member_balance(db, *member_id).await?;
    }

    Ok(distinct.len())
}

/// Resets a member's balance to zero (admin manual reset).
pub async fn reset_member_balance<C>(db: &C, member_id: i64) -> Result<member::Model>
where
    C: ConnectionTrait,
{
    let member = Member::find_by_id(member_id)
        .one(db)
        .await?
        .ok_or(Error::MemberNotFound { id: member_id })?;

    let mut active_model: member::ActiveModel = member.into();
    active_model.balance = Set(0.0);
    active_model.update(db).await.map_err(Into::into)
}
