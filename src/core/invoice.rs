//! Invoice generation and reconciliation read model.
//!
//! Invoices are snapshots written at cycle close; this module owns the
//! offset arithmetic shared with the close path, post-close reconciliation
//! (`recalculate_invoice`), and the canonical "what does this member still
//! owe" view. Amount paid is always derived from payment events at read
//! time - nothing here caches it.

use crate::{
    core::transaction::get_member_cycle_transactions,
    entities::{
        AdminUser, BillingCycle, Business, CashPayment, Invoice, Member, PaymentType,
        TransactionSource, admin_user, billing_cycle, business, cash_payment, invoice, member,
        transaction,
    },
    errors::{Error, Result},
};
use sea_orm::{Set, TransactionTrait, prelude::*};
use std::collections::HashMap;

/// One payment event as shown on the reconciliation view.
#[derive(Debug, Clone)]
pub struct PaymentDetail {
    /// Amount paid in dollars
    pub amount: f64,
    /// Settlement channel
    pub payment_type: PaymentType,
    /// Display name of whoever collected the payment, if recorded
    pub collected_by: Option<String>,
    /// When the payment was recorded
    pub date: DateTimeUtc,
    /// Collector notes
    pub notes: Option<String>,
}

/// An invoice joined with its member contact fields and derived payment
/// figures.
#[derive(Debug, Clone)]
pub struct InvoiceView {
    /// The underlying invoice row
    pub invoice: invoice::Model,
    /// Billed member's display name
    pub member_name: String,
    /// Billed member's email, None if not on file
    pub member_email: Option<String>,
    /// Sum of the member's recorded payments for the cycle
    pub amount_paid: f64,
    /// Remaining amount owed, floored at zero
    pub amount_owed: f64,
    /// The payment events behind `amount_paid`
    pub payment_details: Vec<PaymentDetail>,
}

/// A billing cycle with its reconciled invoices.
#[derive(Debug, Clone)]
pub struct BillingCycleView {
    /// The cycle itself
    pub cycle: billing_cycle::Model,
    /// One reconciled view per invoice
    pub invoices: Vec<InvoiceView>,
}

/// Result of an explicit owner-offset reapplication.
#[derive(Debug, Clone)]
pub struct OffsetReapplyResult {
    /// Offset deducted this call (zero when nothing applied)
    pub offset: f64,
    /// The invoice after the deduction
    pub invoice: invoice::Model,
}

/// Computes the owner-balance offset for an invoice.
///
/// A business owner with a positive balance (money the community owes them
/// back) gets that credit deducted from their invoice rather than being
/// billed while simultaneously being owed. The offset is capped at the
/// smaller of the two figures and is zero unless both are positive, so it
/// can never produce a negative invoice.
#[must_use]
pub fn compute_owner_offset(balance: f64, invoice_amount: f64) -> f64 {
    if balance <= 0.0 || invoice_amount <= 0.0 {
        return 0.0;
    }
    balance.min(invoice_amount)
}

/// Re-sums an invoice from the member's current transactions in its cycle.
///
/// Matches rows by member and cycle (invoices hold no transaction foreign
/// keys) and overwrites `total_amount` and `transaction_count`. Used after
/// manual transaction edits post-close to reconcile drift between the
/// invoice snapshot and the live transaction set. Existing offset rows are
/// part of the sum, but no new offset is generated here - offsets are a
/// close-time decision, reapplied only through [`reapply_owner_offset`].
pub async fn recalculate_invoice(
    db: &DatabaseConnection,
    invoice_id: i64,
) -> Result<invoice::Model> {
    let inv = Invoice::find_by_id(invoice_id)
        .one(db)
        .await?
        .ok_or(Error::InvoiceNotFound { id: invoice_id })?;

    let rows = get_member_cycle_transactions(db, inv.member_id, inv.billing_cycle_id).await?;

    let total: f64 = rows.iter().map(|t| t.amount).sum();
    let count = i32::try_from(rows.len()).unwrap_or(i32::MAX);

    let mut active_model: invoice::ActiveModel = inv.into();
    active_model.total_amount = Set(total);
    active_model.transaction_count = Set(count);
    active_model.update(db).await.map_err(Into::into)
}

/// Explicitly reapplies the owner offset to one invoice.
///
/// Runs the same arithmetic as cycle close against the member's current
/// balance: deducts the offset from the invoice total, records a synthetic
/// negative transaction in the invoice's cycle, and consumes the credit
/// from the member's balance. A no-op (offset 0) for non-owners and for
/// members without positive balance.
pub async fn reapply_owner_offset(
    db: &DatabaseConnection,
    invoice_id: i64,
) -> Result<OffsetReapplyResult> {
    let txn = db.begin().await?;

    let inv = Invoice::find_by_id(invoice_id)
        .one(&txn)
        .await?
        .ok_or(Error::InvoiceNotFound { id: invoice_id })?;

    let member = Member::find_by_id(inv.member_id)
        .one(&txn)
        .await?
        .ok_or(Error::MemberNotFound { id: inv.member_id })?;

    let owns_business = Business::find()
        .filter(business::Column::OwnerMemberId.eq(member.id))
        .one(&txn)
        .await?
        .is_some();

    let offset = if owns_business {
        compute_owner_offset(member.balance, inv.total_amount)
    } else {
        0.0
    };

    if offset <= 0.0 {
        txn.commit().await?;
        return Ok(OffsetReapplyResult {
            offset: 0.0,
            invoice: inv,
        });
    }

    let cycle = BillingCycle::find_by_id(inv.billing_cycle_id)
        .one(&txn)
        .await?
        .ok_or(Error::CycleNotFound {
            id: inv.billing_cycle_id,
        })?;

    let offset_row = transaction::ActiveModel {
        member_id: Set(member.id),
        business_id: Set(None),
        amount: Set(-offset),
        description: Set(format!("Owner balance offset - {}", cycle.name)),
        billing_cycle_id: Set(Some(cycle.id)),
        balance_before: Set(member.balance),
        balance_after: Set(member.balance - offset),
        source: Set(TransactionSource::AdminPanel),
        voided: Set(false),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    offset_row.insert(&txn).await?;

    crate::core::balance::apply_balance_delta(&txn, member.id, -offset).await?;

    let new_total = inv.total_amount - offset;
    let mut active_model: invoice::ActiveModel = inv.into();
    active_model.total_amount = Set(new_total);
    let updated = active_model.update(&txn).await?;

    txn.commit().await?;

    Ok(OffsetReapplyResult {
        offset,
        invoice: updated,
    })
}

/// Returns the transactions behind an invoice: the member's non-voided rows
/// in the invoice's cycle, oldest first.
pub async fn get_invoice_transactions(
    db: &DatabaseConnection,
    invoice_id: i64,
) -> Result<Vec<transaction::Model>> {
    let inv = Invoice::find_by_id(invoice_id)
        .one(db)
        .await?
        .ok_or(Error::InvoiceNotFound { id: invoice_id })?;

    get_member_cycle_transactions(db, inv.member_id, inv.billing_cycle_id).await
}

/// Builds the canonical reconciliation view for one cycle.
///
/// Fetches the cycle's invoices and payment events, groups payments per
/// member, resolves collector display names, and derives `amount_paid` and
/// `amount_owed` (floored at zero) per invoice. Recomputed in full on every
/// call - payments are mutable, so nothing here may be cached.
pub async fn get_billing_cycle_with_invoices(
    db: &DatabaseConnection,
    cycle_id: i64,
) -> Result<BillingCycleView> {
    let cycle = BillingCycle::find_by_id(cycle_id)
        .one(db)
        .await?
        .ok_or(Error::CycleNotFound { id: cycle_id })?;

    let invoices = Invoice::find()
        .filter(invoice::Column::BillingCycleId.eq(cycle_id))
        .all(db)
        .await?;

    let payments = CashPayment::find()
        .filter(cash_payment::Column::BillingCycleId.eq(cycle_id))
        .all(db)
        .await?;

    // Everyone referenced: billed members plus member collectors
    let mut member_ids: Vec<i64> = invoices.iter().map(|i| i.member_id).collect();
    member_ids.extend(payments.iter().filter_map(|p| p.collected_by_member_id));
    let members: HashMap<i64, member::Model> = Member::find()
        .filter(member::Column::Id.is_in(member_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|m| (m.id, m))
        .collect();

    let admin_ids: Vec<i64> = payments
        .iter()
        .filter_map(|p| p.collected_by_admin_id)
        .collect();
    let admins: HashMap<i64, admin_user::Model> = if admin_ids.is_empty() {
        HashMap::new()
    } else {
        AdminUser::find()
            .filter(admin_user::Column::Id.is_in(admin_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect()
    };

    // Group payment events per paying member
    let mut paid_by_member: HashMap<i64, (f64, Vec<PaymentDetail>)> = HashMap::new();
    for payment in &payments {
        let collected_by = match (payment.collected_by_member_id, payment.collected_by_admin_id) {
            (Some(id), _) => members.get(&id).map(|m| m.name.clone()),
            (None, Some(id)) => admins.get(&id).map(|a| a.name.clone()),
            (None, None) => None,
        };

        let entry = paid_by_member
            .entry(payment.member_id)
            .or_insert((0.0, Vec::new()));
        entry.0 += payment.amount;
        entry.1.push(PaymentDetail {
            amount: payment.amount,
            payment_type: payment.payment_type,
            collected_by,
            date: payment.created_at,
            notes: payment.notes.clone(),
        });
    }

    let invoice_views = invoices
        .into_iter()
        .map(|inv| {
            let (amount_paid, payment_details) = paid_by_member
                .get(&inv.member_id)
                .cloned()
                .unwrap_or((0.0, Vec::new()));
            let amount_owed = (inv.total_amount - amount_paid).max(0.0);
            let (member_name, member_email) = members
                .get(&inv.member_id)
                .map_or((String::new(), None), |m| {
                    (m.name.clone(), m.email.clone())
                });

            InvoiceView {
                invoice: inv,
                member_name,
                member_email,
                amount_paid,
                amount_owed,
                payment_details,
            }
        })
        .collect();

    Ok(BillingCycleView {
        cycle,
        invoices: invoice_views,
    })
}
