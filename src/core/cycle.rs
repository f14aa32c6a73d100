//! Cycle lifecycle management - create, close, and delete billing cycles.
//!
//! Closing a cycle is the settlement step: the cycle's transaction set is
//! frozen, per-member totals become invoices (with owner-balance offsets
//! applied), and every involved member's running balance is reset to zero.
//! Each lifecycle operation runs inside a single database transaction, so a
//! failed step leaves no partial settlement behind.

use crate::{
    core::{balance, invoice},
    entities::{
        BillingCycle, Business, CashPayment, CycleStatus, Invoice, InvoiceStatus, Member,
        PaymentStatus, Transaction, TransactionDispute, TransactionSource, billing_cycle, business,
        cash_payment, invoice as invoice_entity, member, transaction, transaction_dispute,
    },
    errors::{Error, Result},
};
use sea_orm::{Set, TransactionTrait, prelude::*};
use std::collections::{BTreeMap, HashSet};
use tracing::info;

/// Summary of a cycle close.
#[derive(Debug, Clone)]
pub struct CycleCloseResult {
    /// The cycle that was closed
    pub cycle_id: i64,
    /// Number of invoices generated (one per member with activity)
    pub invoice_count: usize,
    /// Number of owner offsets applied
    pub offsets_applied: usize,
    /// Total dollar amount deducted by owner offsets
    pub offset_total: f64,
}

/// Result of creating a new cycle.
#[derive(Debug, Clone)]
pub struct CycleCreateResult {
    /// The newly created active cycle
    pub cycle: billing_cycle::Model,
    /// Close summary for the previously active cycle, if one was auto-closed
    pub previous_cycle_closed: Option<CycleCloseResult>,
}

/// Row counts removed by a cascading cycle delete.
#[derive(Debug, Clone)]
pub struct CycleDeleteResult {
    /// Invoices removed
    pub invoices_deleted: u64,
    /// Payment events removed
    pub payments_deleted: u64,
    /// Disputes removed (those targeting the cycle's transactions)
    pub disputes_deleted: u64,
    /// Transactions removed
    pub transactions_deleted: u64,
    /// Distinct members whose balance was recomputed afterwards
    pub members_recalculated: usize,
}

/// Returns the currently active billing cycle, if any.
///
/// At most one cycle is active at a time; the creation path enforces this
/// inside its transaction, so `one()` is sufficient here.
pub async fn get_active_cycle<C>(db: &C) -> Result<Option<billing_cycle::Model>>
where
    C: ConnectionTrait,
{
    BillingCycle::find()
        .filter(billing_cycle::Column::Status.eq(CycleStatus::Active))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a cycle by its unique ID.
pub async fn get_cycle_by_id(
    db: &DatabaseConnection,
    cycle_id: i64,
) -> Result<Option<billing_cycle::Model>> {
    BillingCycle::find_by_id(cycle_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a new active billing cycle.
///
/// If a cycle is currently active it is closed first - with full invoice
/// generation - so creating a cycle implicitly settles the previous one.
/// The new cycle starts today; its end date is a placeholder corrected at
/// close time.
pub async fn create_cycle(db: &DatabaseConnection, name: String) -> Result<CycleCreateResult> {
    if name.trim().is_empty() {
        return Err(Error::InvalidStatus {
            message: "Cycle name cannot be empty".to_string(),
        });
    }

    let previous_cycle_closed = match get_active_cycle(db).await? {
        Some(active) => Some(close_cycle(db, active.id).await?),
        None => None,
    };

    let txn = db.begin().await?;

    // Guard the single-active-cycle invariant inside the same transaction
    // as the insert.
    if get_active_cycle(&txn).await?.is_some() {
        return Err(Error::InvalidStatus {
            message: "Another billing cycle is already active".to_string(),
        });
    }

    let today = chrono::Utc::now().date_naive();
    let cycle = billing_cycle::ActiveModel {
        name: Set(name.trim().to_string()),
        start_date: Set(today),
        end_date: Set(today),
        status: Set(CycleStatus::Active),
        closed_at: Set(None),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    let cycle = cycle.insert(&txn).await?;

    txn.commit().await?;

    info!(cycle_id = cycle.id, name = %cycle.name, "billing cycle created");

    Ok(CycleCreateResult {
        cycle,
        previous_cycle_closed,
    })
}

/// Closes a billing cycle and generates its invoices.
///
/// The settlement sequence, all in one database transaction:
/// 1. fetch the cycle's non-voided transactions; an empty cycle just
///    transitions to closed with zero invoices
/// 2. group transactions per member into totals and counts
/// 3. for members owning a business with a positive balance, deduct an
///    owner offset from the invoice total and queue a synthetic negative
///    transaction recording the deduction
/// 4. insert one pending invoice per member with activity
/// 5. insert the queued offset transactions
/// 6. reset every involved member's balance to zero
/// 7. stamp the cycle closed with today's end date
pub async fn close_cycle(db: &DatabaseConnection, cycle_id: i64) -> Result<CycleCloseResult> {
    use sea_orm::sea_query::Expr;

    let txn = db.begin().await?;

    let cycle = BillingCycle::find_by_id(cycle_id)
        .one(&txn)
        .await?
        .ok_or(Error::CycleNotFound { id: cycle_id })?;

    if !cycle.status.can_transition_to(CycleStatus::Closed) {
        return Err(Error::InvalidStatus {
            message: format!("Cycle {cycle_id} is not active and cannot be closed"),
        });
    }

    let today = chrono::Utc::now().date_naive();
    let now = chrono::Utc::now();

    let rows = Transaction::find()
        .filter(transaction::Column::BillingCycleId.eq(cycle_id))
        .filter(transaction::Column::Voided.eq(false))
        .all(&txn)
        .await?;

    if rows.is_empty() {
        let mut active_model: billing_cycle::ActiveModel = cycle.into();
        active_model.status = Set(CycleStatus::Closed);
        active_model.end_date = Set(today);
        active_model.closed_at = Set(Some(now));
        active_model.update(&txn).await?;
        txn.commit().await?;

        info!(cycle_id, "empty billing cycle closed, no invoices generated");

        return Ok(CycleCloseResult {
            cycle_id,
            invoice_count: 0,
            offsets_applied: 0,
            offset_total: 0.0,
        });
    }

    // Per-member totals; BTreeMap keeps invoice generation deterministic
    let mut member_totals: BTreeMap<i64, (f64, i32)> = BTreeMap::new();
    for row in &rows {
        let entry = member_totals.entry(row.member_id).or_insert((0.0, 0));
        entry.0 += row.amount;
        entry.1 += 1;
    }

    let owner_ids: HashSet<i64> = Business::find()
        .filter(business::Column::OwnerMemberId.is_not_null())
        .all(&txn)
        .await?
        .into_iter()
        .filter_map(|b| b.owner_member_id)
        .collect();

    let member_ids: Vec<i64> = member_totals.keys().copied().collect();
    let members: BTreeMap<i64, member::Model> = Member::find()
        .filter(member::Column::Id.is_in(member_ids.clone()))
        .all(&txn)
        .await?
        .into_iter()
        .map(|m| (m.id, m))
        .collect();

    let mut invoices = Vec::new();
    let mut offset_rows = Vec::new();
    let mut offsets_applied = 0usize;
    let mut offset_total = 0.0f64;

    for (member_id, (total, count)) in &member_totals {
        let mut invoice_amount = *total;

        if owner_ids.contains(member_id) {
            // Offset against the pre-reset balance so an owner who is owed
            // money is not billed for it at the same time.
            let current_balance = members.get(member_id).map_or(0.0, |m| m.balance);
            let offset = invoice::compute_owner_offset(current_balance, invoice_amount);
            if offset > 0.0 {
                invoice_amount -= offset;
                offsets_applied += 1;
                offset_total += offset;
                offset_rows.push(transaction::ActiveModel {
                    member_id: Set(*member_id),
                    business_id: Set(None),
                    amount: Set(-offset),
                    description: Set(format!("Owner balance offset - {}", cycle.name)),
                    billing_cycle_id: Set(Some(cycle_id)),
                    balance_before: Set(current_balance),
                    balance_after: Set(current_balance - offset),
                    source: Set(TransactionSource::AdminPanel),
                    voided: Set(false),
                    created_at: Set(now),
                    ..Default::default()
                });
            }
        }

        invoices.push(invoice_entity::ActiveModel {
            billing_cycle_id: Set(cycle_id),
            member_id: Set(*member_id),
            total_amount: Set(invoice_amount),
            transaction_count: Set(*count),
            status: Set(InvoiceStatus::Pending),
            payment_status: Set(PaymentStatus::Unpaid),
            email_message: Set(None),
            sent_at: Set(None),
            email_sent_to: Set(None),
            created_at: Set(now),
            ..Default::default()
        });
    }

    let invoice_count = invoices.len();
    Invoice::insert_many(invoices).exec(&txn).await?;

    if !offset_rows.is_empty() {
        Transaction::insert_many(offset_rows).exec(&txn).await?;
    }

    // Zero every involved member's balance, offset or not - the offset only
    // reduces the invoice total, never feeds a second balance write.
    Member::update_many()
        .col_expr(member::Column::Balance, Expr::value(0.0))
        .filter(member::Column::Id.is_in(member_ids))
        .exec(&txn)
        .await?;

    let mut active_model: billing_cycle::ActiveModel = cycle.into();
    active_model.status = Set(CycleStatus::Closed);
    active_model.end_date = Set(today);
    active_model.closed_at = Set(Some(now));
    active_model.update(&txn).await?;

    txn.commit().await?;

    info!(
        cycle_id,
        invoice_count, offsets_applied, "billing cycle closed"
    );

    Ok(CycleCloseResult {
        cycle_id,
        invoice_count,
        offsets_applied,
        offset_total,
    })
}

/// Deletes a billing cycle and everything hanging off it.
///
/// Deletion order is FK-safe: invoices, the cycle's payment events, disputes
/// targeting the cycle's transactions, then the transactions themselves.
/// Afterwards every member who lost a transaction gets their balance
/// recomputed from the remaining rows, and finally the cycle row goes.
pub async fn delete_cycle(db: &DatabaseConnection, cycle_id: i64) -> Result<CycleDeleteResult> {
    let txn = db.begin().await?;

    let cycle = BillingCycle::find_by_id(cycle_id)
        .one(&txn)
        .await?
        .ok_or(Error::CycleNotFound { id: cycle_id })?;

    let invoices_deleted = Invoice::delete_many()
        .filter(invoice_entity::Column::BillingCycleId.eq(cycle_id))
        .exec(&txn)
        .await?
        .rows_affected;

    let payments_deleted = CashPayment::delete_many()
        .filter(cash_payment::Column::BillingCycleId.eq(cycle_id))
        .exec(&txn)
        .await?
        .rows_affected;

    let rows = Transaction::find()
        .filter(transaction::Column::BillingCycleId.eq(cycle_id))
        .all(&txn)
        .await?;
    let transaction_ids: Vec<i64> = rows.iter().map(|t| t.id).collect();
    let member_ids: Vec<i64> = rows.iter().map(|t| t.member_id).collect();

    let disputes_deleted = if transaction_ids.is_empty() {
        0
    } else {
        TransactionDispute::delete_many()
            .filter(transaction_dispute::Column::TransactionId.is_in(transaction_ids))
            .exec(&txn)
            .await?
            .rows_affected
    };

    let transactions_deleted = Transaction::delete_many()
        .filter(transaction::Column::BillingCycleId.eq(cycle_id))
        .exec(&txn)
        .await?
        .rows_affected;

    let members_recalculated = balance::recalculate_member_balances(&txn, &member_ids).await?;

    cycle.delete(&txn).await?;

    txn.commit().await?;

    info!(
        cycle_id,
        transactions_deleted, invoices_deleted, "billing cycle deleted"
    );

    Ok(CycleDeleteResult {
        invoices_deleted,
        payments_deleted,
        disputes_deleted,
        transactions_deleted,
        members_recalculated,
    })
}
