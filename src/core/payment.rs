//! Payment reconciliation - recording and resetting settlements on invoices.
//!
//! Two write paths exist and both stay reconcilable with the derived
//! read model: the kiosk collection flow inserts explicit payment events
//! with amounts and collectors, while the admin quick-mark flow only flips
//! the invoice status axes. Bulk updates drive the member card standing and
//! best-effort decline notifications as side effects.

use crate::{
    email::{dispatcher, message::EmailDelivery},
    entities::{
        CardStatus, CashPayment, Invoice, InvoiceStatus, Member, PaymentStatus, PaymentType,
        cash_payment, invoice, member,
    },
    errors::{Error, Result},
};
use sea_orm::{Set, TransactionTrait, prelude::*};
use std::collections::BTreeSet;
use tracing::warn;

/// Who took a payment at the kiosk.
#[derive(Debug, Clone, Copy)]
pub enum Collector {
    /// A member collected the payment
    Member(i64),
    /// An admin collected the payment
    Admin(i64),
}

/// Input for recording one payment event.
#[derive(Debug, Clone)]
pub struct NewCashPayment {
    /// Invoice the payment settles
    pub invoice_id: i64,
    /// Amount paid in dollars (must be positive)
    pub amount: f64,
    /// Settlement channel
    pub payment_type: PaymentType,
    /// Collector notes
    pub notes: Option<String>,
    /// Who collected the payment
    pub collector: Collector,
}

/// Summary of a bulk payment-status update.
#[derive(Debug, Clone, Default)]
pub struct BulkPaymentUpdateResult {
    /// Invoices whose status axes were rewritten
    pub invoices_updated: usize,
    /// Distinct members whose card standing changed
    pub members_updated: usize,
    /// Payment rows removed (unpaid target only)
    pub payments_deleted: u64,
    /// Synthetic zelle payments inserted (paid_zelle target only)
    pub zelle_payments_inserted: usize,
    /// Decline notices successfully handed to the provider
    pub decline_notices_sent: usize,
    /// Decline notices that failed (logged, never fatal)
    pub decline_notices_failed: usize,
}

/// Maps a payment-status target onto the email-lifecycle axis.
///
/// The single authority for how the money axis drives the status axis;
/// callers must not restate this mapping.
#[must_use]
pub fn invoice_status_for(target: PaymentStatus) -> InvoiceStatus {
    match target {
        PaymentStatus::CardDeclined | PaymentStatus::Unpaid => InvoiceStatus::Pending,
        PaymentStatus::CardProcessed => InvoiceStatus::Paid,
        PaymentStatus::PaidCash | PaymentStatus::PaidZelle => InvoiceStatus::PaidCash,
    }
}

/// Records a payment event against an invoice (kiosk collection flow).
///
/// Inserts the payment row, then rolls the invoice forward based on the
/// event sum: fully covered invoices become paid (cash or zelle per the
/// channel), partially covered ones become `partial_cash`.
pub async fn record_cash_payment(
    db: &DatabaseConnection,
    new: NewCashPayment,
) -> Result<cash_payment::Model> {
    if new.amount <= 0.0 || !new.amount.is_finite() {
        return Err(Error::InvalidAmount { amount: new.amount });
    }

    let txn = db.begin().await?;

    let inv = Invoice::find_by_id(new.invoice_id)
        .one(&txn)
        .await?
        .ok_or(Error::InvoiceNotFound { id: new.invoice_id })?;

    let (collected_by_member_id, collected_by_admin_id) = match new.collector {
        Collector::Member(id) => (Some(id), None),
        Collector::Admin(id) => (None, Some(id)),
    };

    let row = cash_payment::ActiveModel {
        invoice_id: Set(Some(inv.id)),
        member_id: Set(inv.member_id),
        billing_cycle_id: Set(inv.billing_cycle_id),
        amount: Set(new.amount),
        payment_type: Set(new.payment_type),
        notes: Set(new.notes),
        collected_by_member_id: Set(collected_by_member_id),
        collected_by_admin_id: Set(collected_by_admin_id),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    let row = row.insert(&txn).await?;

    let paid: f64 = CashPayment::find()
        .filter(cash_payment::Column::InvoiceId.eq(inv.id))
        .all(&txn)
        .await?
        .iter()
        .map(|p| p.amount)
        .sum();

    let total_amount = inv.total_amount;
    let mut active_model: invoice::ActiveModel = inv.into();
    if paid >= total_amount {
        active_model.status = Set(InvoiceStatus::PaidCash);
        active_model.payment_status = Set(match new.payment_type {
            PaymentType::Cash => PaymentStatus::PaidCash,
            PaymentType::Zelle => PaymentStatus::PaidZelle,
        });
    } else {
        active_model.status = Set(InvoiceStatus::PartialCash);
    }
    active_model.update(&txn).await?;

    txn.commit().await?;

    Ok(row)
}

/// Marks an invoice fully paid in cash without recording a payment event
/// (admin quick-mark flow). Only the status axes change; the derived
/// amount-owed view keeps reporting the unpaid sum since no event exists.
pub async fn mark_invoice_paid_cash(
    db: &DatabaseConnection,
    invoice_id: i64,
) -> Result<invoice::Model> {
    let inv = Invoice::find_by_id(invoice_id)
        .one(db)
        .await?
        .ok_or(Error::InvoiceNotFound { id: invoice_id })?;

    let mut active_model: invoice::ActiveModel = inv.into();
    active_model.status = Set(InvoiceStatus::PaidCash);
    active_model.payment_status = Set(PaymentStatus::PaidCash);
    active_model.update(db).await.map_err(Into::into)
}

/// Applies a payment status to a batch of invoices in one cycle.
///
/// Every selected invoice gets both status axes rewritten. Side effects by
/// target:
/// - `card_declined`: affected members are flagged declined and each gets a
///   best-effort decline notice after the database work commits
/// - `unpaid`: the selected invoices' payment rows are deleted (full reset,
///   history discarded)
/// - `paid_cash` / `paid_zelle` / `card_processed`: affected members' card
///   standing is restored to active
/// - `paid_zelle` additionally inserts one synthetic zelle payment per
///   invoice equal to the invoice's full `total_amount`, regardless of any
///   partial payments already recorded
pub async fn bulk_update_payment_status(
    db: &DatabaseConnection,
    cycle_id: i64,
    invoice_ids: &[i64],
    target: PaymentStatus,
    mailer: &dyn EmailDelivery,
) -> Result<BulkPaymentUpdateResult> {
    let mut result = BulkPaymentUpdateResult::default();

    let txn = db.begin().await?;

    let invoices = Invoice::find()
        .filter(invoice::Column::BillingCycleId.eq(cycle_id))
        .filter(invoice::Column::Id.is_in(invoice_ids.to_vec()))
        .all(&txn)
        .await?;

    let member_ids: BTreeSet<i64> = invoices.iter().map(|i| i.member_id).collect();
    let mapped_status = invoice_status_for(target);

    for inv in &invoices {
        if target == PaymentStatus::PaidZelle {
            let synthetic = cash_payment::ActiveModel {
                invoice_id: Set(Some(inv.id)),
                member_id: Set(inv.member_id),
                billing_cycle_id: Set(inv.billing_cycle_id),
                amount: Set(inv.total_amount),
                payment_type: Set(PaymentType::Zelle),
                notes: Set(None),
                collected_by_member_id: Set(None),
                collected_by_admin_id: Set(None),
                created_at: Set(chrono::Utc::now()),
                ..Default::default()
            };
            synthetic.insert(&txn).await?;
            result.zelle_payments_inserted += 1;
        }

        let mut active_model: invoice::ActiveModel = inv.clone().into();
        active_model.status = Set(mapped_status);
        active_model.payment_status = Set(target);
        active_model.update(&txn).await?;
        result.invoices_updated += 1;
    }

    if target == PaymentStatus::Unpaid && !invoice_ids.is_empty() {
        result.payments_deleted = CashPayment::delete_many()
            .filter(cash_payment::Column::InvoiceId.is_in(invoice_ids.to_vec()))
            .exec(&txn)
            .await?
            .rows_affected;
    }

    let card_status = match target {
        PaymentStatus::CardDeclined => Some(CardStatus::Declined),
        PaymentStatus::CardProcessed | PaymentStatus::PaidCash | PaymentStatus::PaidZelle => {
            Some(CardStatus::Active)
        }
        PaymentStatus::Unpaid => None,
    };

    let mut affected_members = Vec::new();
    if let Some(card_status) = card_status {
        let members = Member::find()
            .filter(member::Column::Id.is_in(member_ids))
            .all(&txn)
            .await?;
        for m in members {
            let mut active_model: member::ActiveModel = m.clone().into();
            active_model.card_status = Set(card_status.clone());
            active_model.update(&txn).await?;
            result.members_updated += 1;
            affected_members.push(m);
        }
    }

    txn.commit().await?;

    // Decline notices go out after the state change is durable; individual
    // failures are logged and counted, never propagated.
    if target == PaymentStatus::CardDeclined {
        for m in &affected_members {
            match dispatcher::send_card_declined_notice(mailer, m).await {
                Ok(()) => result.decline_notices_sent += 1,
                Err(e) => {
                    warn!(member_id = m.id, error = %e, "decline notice failed");
                    result.decline_notices_failed += 1;
                }
            }
        }
    }

    Ok(result)
}

/// Removes all payment events from an invoice and resets both status axes.
///
/// Irreversible: the deleted rows are the only record of what was paid.
pub async fn unmark_invoice_payment(
    db: &DatabaseConnection,
    invoice_id: i64,
) -> Result<invoice::Model> {
    let txn = db.begin().await?;

    let inv = Invoice::find_by_id(invoice_id)
        .one(&txn)
        .await?
        .ok_or(Error::InvoiceNotFound { id: invoice_id })?;

    CashPayment::delete_many()
        .filter(cash_payment::Column::InvoiceId.eq(invoice_id))
        .exec(&txn)
        .await?;

    let mut active_model: invoice::ActiveModel = inv.into();
    active_model.status = Set(InvoiceStatus::Pending);
    active_model.payment_status = Set(PaymentStatus::Unpaid);
    let updated = active_model.update(&txn).await?;

    txn.commit().await?;

    Ok(updated)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::invoice::get_billing_cycle_with_invoices;
    use crate::core::{cycle, transaction as tx};
    use crate::test_utils::*;

    async fn setup_invoice(
        db: &sea_orm::DatabaseConnection,
        amount: f64,
    ) -> Result<(member::Model, crate::entities::BillingCycleModel, invoice::Model)> {
        let member = create_test_member(db, "Ana").await?;
        let cycle_row = create_active_cycle(db, "March").await?;
        tx::create_transaction(
            db,
            tx::NewTransaction {
                member_id: member.id,
                business_id: None,
                amount,
                description: "Groceries".to_string(),
                source: crate::entities::TransactionSource::Kiosk,
            },
        )
        .await?;
        cycle::close_cycle(db, cycle_row.id).await?;
        let inv = Invoice::find().one(db).await?.unwrap();
        Ok((member, cycle_row, inv))
    }

    #[tokio::test]
    async fn test_record_partial_payment_sets_partial_status() -> Result<()> {
        let db = setup_test_db().await?;
        let (member, _, inv) = setup_invoice(&db, 100.0).await?;

        let payment = record_cash_payment(
            &db,
            NewCashPayment {
                invoice_id: inv.id,
                amount: 40.0,
                payment_type: PaymentType::Cash,
                notes: None,
                collector: Collector::Member(member.id),
            },
        )
        .await?;
        assert_eq!(payment.member_id, member.id);
        assert_eq!(payment.billing_cycle_id, inv.billing_cycle_id);

        let inv = Invoice::find_by_id(inv.id).one(&db).await?.unwrap();
        assert_eq!(inv.status, InvoiceStatus::PartialCash);
        assert_eq!(inv.payment_status, PaymentStatus::Unpaid);

        Ok(())
    }

    #[tokio::test]
    async fn test_record_full_payment_marks_paid() -> Result<()> {
        let db = setup_test_db().await?;
        let (member, _, inv) = setup_invoice(&db, 100.0).await?;

        record_cash_payment(
            &db,
            NewCashPayment {
                invoice_id: inv.id,
                amount: 60.0,
                payment_type: PaymentType::Cash,
                notes: None,
                collector: Collector::Member(member.id),
            },
        )
        .await?;
        record_cash_payment(
            &db,
            NewCashPayment {
                invoice_id: inv.id,
                amount: 40.0,
                payment_type: PaymentType::Zelle,
                notes: None,
                collector: Collector::Member(member.id),
            },
        )
        .await?;

        let inv = Invoice::find_by_id(inv.id).one(&db).await?.unwrap();
        assert_eq!(inv.status, InvoiceStatus::PaidCash);
        // The channel of the covering payment wins the money axis
        assert_eq!(inv.payment_status, PaymentStatus::PaidZelle);

        Ok(())
    }

    #[tokio::test]
    async fn test_record_payment_rejects_bad_amounts() -> Result<()> {
        let db = setup_test_db().await?;
        let (member, _, inv) = setup_invoice(&db, 100.0).await?;

        for bad in [0.0, -5.0, f64::NAN] {
            let result = record_cash_payment(
                &db,
                NewCashPayment {
                    invoice_id: inv.id,
                    amount: bad,
                    payment_type: PaymentType::Cash,
                    notes: None,
                    collector: Collector::Member(member.id),
                },
            )
            .await;
            assert!(matches!(result, Err(Error::InvalidAmount { .. })));
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_quick_mark_flips_status_without_payment_row() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, cycle_row, inv) = setup_invoice(&db, 100.0).await?;

        let marked = mark_invoice_paid_cash(&db, inv.id).await?;
        assert_eq!(marked.status, InvoiceStatus::PaidCash);
        assert_eq!(marked.payment_status, PaymentStatus::PaidCash);

        // No event exists, so the derived view still reports the full debt
        let view = get_billing_cycle_with_invoices(&db, cycle_row.id).await?;
        assert_eq!(view.invoices[0].amount_paid, 0.0);
        assert_eq!(view.invoices[0].amount_owed, 100.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_unpaid_deletes_payment_history() -> Result<()> {
        // Scenario: a 40-dollar payment exists; resetting to unpaid must
        // delete it so the next read reports nothing paid.
        let db = setup_test_db().await?;
        let mailer = MockMailer::new();
        let (member, cycle_row, inv) = setup_invoice(&db, 100.0).await?;

        record_cash_payment(
            &db,
            NewCashPayment {
                invoice_id: inv.id,
                amount: 40.0,
                payment_type: PaymentType::Cash,
                notes: None,
                collector: Collector::Member(member.id),
            },
        )
        .await?;

        let result = bulk_update_payment_status(
            &db,
            cycle_row.id,
            &[inv.id],
            PaymentStatus::Unpaid,
            &mailer,
        )
        .await?;
        assert_eq!(result.invoices_updated, 1);
        assert_eq!(result.payments_deleted, 1);

        let inv = Invoice::find_by_id(inv.id).one(&db).await?.unwrap();
        assert_eq!(inv.status, InvoiceStatus::Pending);
        assert_eq!(inv.payment_status, PaymentStatus::Unpaid);

        let view = get_billing_cycle_with_invoices(&db, cycle_row.id).await?;
        assert_eq!(view.invoices[0].amount_paid, 0.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_card_declined_flags_members_and_notifies() -> Result<()> {
        let db = setup_test_db().await?;
        let mailer = MockMailer::new();
        let (member, cycle_row, inv) = setup_invoice(&db, 100.0).await?;

        let result = bulk_update_payment_status(
            &db,
            cycle_row.id,
            &[inv.id],
            PaymentStatus::CardDeclined,
            &mailer,
        )
        .await?;
        assert_eq!(result.invoices_updated, 1);
        assert_eq!(result.members_updated, 1);
        assert_eq!(result.decline_notices_sent, 1);
        assert_eq!(result.decline_notices_failed, 0);

        let inv = Invoice::find_by_id(inv.id).one(&db).await?.unwrap();
        assert_eq!(inv.status, InvoiceStatus::Pending);
        assert_eq!(inv.payment_status, PaymentStatus::CardDeclined);

        let m = Member::find_by_id(member.id).one(&db).await?.unwrap();
        assert_eq!(m.card_status, CardStatus::Declined);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, member.email.unwrap());

        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_card_declined_email_failure_is_not_fatal() -> Result<()> {
        let db = setup_test_db().await?;
        let mailer = MockMailer::failing("provider down");
        let (member, cycle_row, inv) = setup_invoice(&db, 100.0).await?;

        let result = bulk_update_payment_status(
            &db,
            cycle_row.id,
            &[inv.id],
            PaymentStatus::CardDeclined,
            &mailer,
        )
        .await?;
        assert_eq!(result.decline_notices_sent, 0);
        assert_eq!(result.decline_notices_failed, 1);

        // The status change still committed
        let m = Member::find_by_id(member.id).one(&db).await?.unwrap();
        assert_eq!(m.card_status, CardStatus::Declined);

        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_card_processed_restores_card_standing() -> Result<()> {
        let db = setup_test_db().await?;
        let mailer = MockMailer::new();
        let (member, cycle_row, inv) = setup_invoice(&db, 100.0).await?;

        bulk_update_payment_status(
            &db,
            cycle_row.id,
            &[inv.id],
            PaymentStatus::CardDeclined,
            &mailer,
        )
        .await?;
        bulk_update_payment_status(
            &db,
            cycle_row.id,
            &[inv.id],
            PaymentStatus::CardProcessed,
            &mailer,
        )
        .await?;

        let inv = Invoice::find_by_id(inv.id).one(&db).await?.unwrap();
        assert_eq!(inv.status, InvoiceStatus::Paid);
        assert_eq!(inv.payment_status, PaymentStatus::CardProcessed);

        let m = Member::find_by_id(member.id).one(&db).await?.unwrap();
        assert_eq!(m.card_status, CardStatus::Active);

        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_zelle_inserts_full_total_ignoring_partials() -> Result<()> {
        // Pins current behavior: the synthetic zelle payment equals the
        // invoice's full total even when a partial payment already exists,
        // overstating the amount paid. Pending a product decision.
        let db = setup_test_db().await?;
        let mailer = MockMailer::new();
        let (member, cycle_row, inv) = setup_invoice(&db, 100.0).await?;

        record_cash_payment(
            &db,
            NewCashPayment {
                invoice_id: inv.id,
                amount: 40.0,
                payment_type: PaymentType::Cash,
                notes: None,
                collector: Collector::Member(member.id),
            },
        )
        .await?;

        let result = bulk_update_payment_status(
            &db,
            cycle_row.id,
            &[inv.id],
            PaymentStatus::PaidZelle,
            &mailer,
        )
        .await?;
        assert_eq!(result.zelle_payments_inserted, 1);

        let payments = CashPayment::find().all(&db).await?;
        assert_eq!(payments.len(), 2);
        let synthetic = payments
            .iter()
            .find(|p| p.payment_type == PaymentType::Zelle)
            .unwrap();
        assert_eq!(synthetic.amount, 100.0);

        let view = get_billing_cycle_with_invoices(&db, cycle_row.id).await?;
        assert_eq!(view.invoices[0].amount_paid, 140.0);
        assert_eq!(view.invoices[0].amount_owed, 0.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_skips_invoices_outside_cycle() -> Result<()> {
        let db = setup_test_db().await?;
        let mailer = MockMailer::new();
        let (_, cycle_row, inv) = setup_invoice(&db, 100.0).await?;

        // Wrong cycle id: nothing selected, nothing changed
        let result = bulk_update_payment_status(
            &db,
            cycle_row.id + 1,
            &[inv.id],
            PaymentStatus::PaidCash,
            &mailer,
        )
        .await?;
        assert_eq!(result.invoices_updated, 0);

        let inv = Invoice::find_by_id(inv.id).one(&db).await?.unwrap();
        assert_eq!(inv.payment_status, PaymentStatus::Unpaid);

        Ok(())
    }

    #[tokio::test]
    async fn test_unmark_deletes_payments_and_resets_status() -> Result<()> {
        let db = setup_test_db().await?;
        let (member, _, inv) = setup_invoice(&db, 100.0).await?;

        record_cash_payment(
            &db,
            NewCashPayment {
                invoice_id: inv.id,
                amount: 100.0,
                payment_type: PaymentType::Cash,
                notes: None,
                collector: Collector::Member(member.id),
            },
        )
        .await?;

        let reset = unmark_invoice_payment(&db, inv.id).await?;
        assert_eq!(reset.status, InvoiceStatus::Pending);
        assert_eq!(reset.payment_status, PaymentStatus::Unpaid);
        assert!(CashPayment::find().all(&db).await?.is_empty());

        Ok(())
    }

    #[test]
    fn test_invoice_status_mapping() {
        assert_eq!(
            invoice_status_for(PaymentStatus::CardDeclined),
            InvoiceStatus::Pending
        );
        assert_eq!(
            invoice_status_for(PaymentStatus::CardProcessed),
            InvoiceStatus::Paid
        );
        assert_eq!(
            invoice_status_for(PaymentStatus::PaidCash),
            InvoiceStatus::PaidCash
        );
        assert_eq!(
            invoice_status_for(PaymentStatus::PaidZelle),
            InvoiceStatus::PaidCash
        );
        assert_eq!(
            invoice_status_for(PaymentStatus::Unpaid),
            InvoiceStatus::Pending
        );
    }
}
