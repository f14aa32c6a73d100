//! Invoice email dispatch - rendering, single sends, and the cycle batch.
//!
//! A successful send flips the invoice to `sent` and appends a delivery log
//! row; a failed send changes nothing, so re-invoking retries it cleanly.
//! The cycle batch sends sequentially with a fixed pause between messages
//! to stay under provider rate limits, and marks the cycle invoiced at the
//! end regardless of individual failures.

use crate::{
    core::transaction::get_member_cycle_transactions,
    email::message::{EmailDelivery, EmailMessage, RecipientType},
    entities::{
        Business, BillingCycle, Invoice, InvoiceStatus, Member, billing_cycle, business, invoice,
        invoice_email, member, transaction,
    },
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{info, warn};

/// Pause between sequential sends in [`send_all_invoices`].
const SEND_DELAY: Duration = Duration::from_millis(200);

/// Outcome counts for a cycle-wide send.
#[derive(Debug, Clone)]
pub struct SendAllResult {
    /// Invoices successfully handed to the provider
    pub sent: usize,
    /// Invoices whose send failed (left pending, retryable)
    pub failed: usize,
}

/// Renders the invoice email body: the member's cycle transactions grouped
/// per business, with a total line and the optional admin note.
#[must_use]
pub fn render_invoice_email(
    member: &member::Model,
    cycle: &billing_cycle::Model,
    inv: &invoice::Model,
    transactions: &[transaction::Model],
    business_names: &HashMap<i64, String>,
) -> String {
    let mut grouped: BTreeMap<String, Vec<&transaction::Model>> = BTreeMap::new();
    for row in transactions {
        let name = row
            .business_id
            .and_then(|id| business_names.get(&id).cloned())
            .unwrap_or_else(|| "General".to_string());
        grouped.entry(name).or_default().push(row);
    }

    let mut html = format!(
        "<h2>Invoice - {}</h2><p>Hi {},</p><p>Here is your statement for the \
         {} billing cycle ({} to {}).</p>",
        cycle.name, member.name, cycle.name, cycle.start_date, cycle.end_date
    );

    // write! to a String is infallible
    for (business_name, rows) in &grouped {
        write!(html, "<h3>{business_name}</h3><table>").unwrap();
        let mut subtotal = 0.0;
        for row in rows {
            subtotal += row.amount;
            write!(
                html,
                "<tr><td>{}</td><td>${:.2}</td></tr>",
                row.description, row.amount
            )
            .unwrap();
        }
        write!(
            html,
            "<tr><td><strong>Subtotal</strong></td><td><strong>${subtotal:.2}</strong></td></tr></table>"
        )
        .unwrap();
    }

    write!(
        html,
        "<p><strong>Total due: ${:.2}</strong></p>",
        inv.total_amount
    )
    .unwrap();

    if let Some(note) = &inv.email_message {
        write!(html, "<p>{note}</p>").unwrap();
    }

    html
}

/// Renders and sends one invoice email.
///
/// Requires the member to have an email address. On success the invoice is
/// stamped `sent` with the send time and recipient, and a delivery log row
/// is appended. On failure the error propagates with no state change, so
/// the invoice stays pending and the send can simply be retried.
pub async fn send_invoice_email(
    db: &DatabaseConnection,
    mailer: &dyn EmailDelivery,
    invoice_id: i64,
) -> Result<invoice::Model> {
    let inv = Invoice::find_by_id(invoice_id)
        .one(db)
        .await?
        .ok_or(Error::InvoiceNotFound { id: invoice_id })?;

    let member = Member::find_by_id(inv.member_id)
        .one(db)
        .await?
        .ok_or(Error::MemberNotFound { id: inv.member_id })?;

    let email = member
        .email
        .clone()
        .ok_or(Error::MissingEmail {
            member_id: member.id,
        })?;

    let cycle = BillingCycle::find_by_id(inv.billing_cycle_id)
        .one(db)
        .await?
        .ok_or(Error::CycleNotFound {
            id: inv.billing_cycle_id,
        })?;

    let transactions =
        get_member_cycle_transactions(db, inv.member_id, inv.billing_cycle_id).await?;

    let business_ids: Vec<i64> = transactions.iter().filter_map(|t| t.business_id).collect();
    let business_names: HashMap<i64, String> = if business_ids.is_empty() {
        HashMap::new()
    } else {
        Business::find()
            .filter(business::Column::Id.is_in(business_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|b| (b.id, b.name))
            .collect()
    };

    let subject = format!("Invoice for {}", cycle.name);
    let html = render_invoice_email(&member, &cycle, &inv, &transactions, &business_names);

    let outcome = mailer
        .send(&EmailMessage {
            to: email.clone(),
            subject: subject.clone(),
            html,
            recipient_type: RecipientType::Member,
            recipient_id: member.id,
        })
        .await?;

    let mut active_model: invoice::ActiveModel = inv.into();
    active_model.status = Set(InvoiceStatus::Sent);
    active_model.sent_at = Set(Some(chrono::Utc::now()));
    active_model.email_sent_to = Set(Some(email.clone()));
    let updated = active_model.update(db).await?;

    let log_row = invoice_email::ActiveModel {
        invoice_id: Set(updated.id),
        recipient: Set(email),
        subject: Set(subject),
        provider_message_id: Set(outcome.id),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    log_row.insert(db).await?;

    Ok(updated)
}

/// Sends every pending invoice in a cycle, sequentially.
///
/// Sends are spaced by a fixed pause to avoid provider rate limits.
/// Individual failures are logged and counted but never abort the batch,
/// and the cycle is marked `invoiced` at the end regardless of the counts -
/// the transition tracks that a send run happened, not that it fully
/// succeeded. Only an open (active) cycle is rejected.
pub async fn send_all_invoices(
    db: &DatabaseConnection,
    mailer: &dyn EmailDelivery,
    cycle_id: i64,
) -> Result<SendAllResult> {
    let cycle = BillingCycle::find_by_id(cycle_id)
        .one(db)
        .await?
        .ok_or(Error::CycleNotFound { id: cycle_id })?;

    if cycle.status == crate::entities::CycleStatus::Active {
        return Err(Error::InvalidStatus {
            message: format!("Cycle {cycle_id} is still active; close it before sending invoices"),
        });
    }

    let pending = Invoice::find()
        .filter(invoice::Column::BillingCycleId.eq(cycle_id))
        .filter(invoice::Column::Status.eq(InvoiceStatus::Pending))
        .order_by_asc(invoice::Column::Id)
        .all(db)
        .await?;

    let mut sent = 0usize;
    let mut failed = 0usize;

    for (index, inv) in pending.iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(SEND_DELAY).await;
        }

        match send_invoice_email(db, mailer, inv.id).await {
            Ok(_) => sent += 1,
            Err(e) => {
                warn!(invoice_id = inv.id, error = %e, "invoice email failed");
                failed += 1;
            }
        }
    }

    // The cycle transitions regardless of failures; failed invoices stay
    // pending and can be re-sent individually.
    let mut active_model: billing_cycle::ActiveModel = cycle.into();
    active_model.status = Set(crate::entities::CycleStatus::Invoiced);
    active_model.update(db).await?;

    info!(cycle_id, sent, failed, "invoice batch send finished");

    Ok(SendAllResult { sent, failed })
}

/// Sends the card-declined notification used by the bulk payment update.
pub async fn send_card_declined_notice(
    mailer: &dyn EmailDelivery,
    member: &member::Model,
) -> Result<()> {
    let email = member
        .email
        .clone()
        .ok_or(Error::MissingEmail {
            member_id: member.id,
        })?;

    let html = format!(
        "<p>Hi {},</p><p>The card we have on file was declined for your \
         latest invoice. Please update your card details or arrange another \
         way to pay.</p>",
        member.name
    );

    mailer
        .send(&EmailMessage {
            to: email,
            subject: "Card payment declined".to_string(),
            html,
            recipient_type: RecipientType::Member,
            recipient_id: member.id,
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::{cycle, transaction as tx};
    use crate::entities::{CycleStatus, InvoiceEmail, TransactionSource};
    use crate::test_utils::*;

    async fn close_cycle_with_invoice(
        db: &DatabaseConnection,
        member_id: i64,
        business_id: Option<i64>,
    ) -> Result<(crate::entities::BillingCycleModel, invoice::Model)> {
        let cycle_row = create_active_cycle(db, "March").await?;
        tx::create_transaction(
            db,
            tx::NewTransaction {
                member_id,
                business_id,
                amount: 30.0,
                description: "Bread".to_string(),
                source: TransactionSource::Kiosk,
            },
        )
        .await?;
        tx::create_transaction(
            db,
            tx::NewTransaction {
                member_id,
                business_id,
                amount: 12.5,
                description: "Coffee".to_string(),
                source: TransactionSource::Kiosk,
            },
        )
        .await?;
        cycle::close_cycle(db, cycle_row.id).await?;
        let inv = Invoice::find().one(db).await?.unwrap();
        Ok((cycle_row, inv))
    }

    #[tokio::test]
    async fn test_send_invoice_email_success_updates_state() -> Result<()> {
        let db = setup_test_db().await?;
        let mailer = MockMailer::new();
        let member = create_test_member(&db, "Ana").await?;
        let bakery = create_test_business(&db, "Bakery", None).await?;
        let (_, inv) = close_cycle_with_invoice(&db, member.id, Some(bakery.id)).await?;

        let updated = send_invoice_email(&db, &mailer, inv.id).await?;
        assert_eq!(updated.status, InvoiceStatus::Sent);
        assert!(updated.sent_at.is_some());
        assert_eq!(updated.email_sent_to, member.email);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, member.email.clone().unwrap());
        assert!(sent[0].subject.contains("March"));
        assert!(sent[0].html.contains("Bakery"));
        assert!(sent[0].html.contains("Bread"));
        assert!(sent[0].html.contains("$42.50"));

        // Delivery log row appended
        let log = InvoiceEmail::find().all(&db).await?;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].invoice_id, inv.id);
        assert_eq!(log[0].recipient, member.email.unwrap());

        Ok(())
    }

    #[tokio::test]
    async fn test_send_invoice_email_failure_changes_nothing() -> Result<()> {
        let db = setup_test_db().await?;
        let mailer = MockMailer::failing("provider down");
        let member = create_test_member(&db, "Ben").await?;
        let (_, inv) = close_cycle_with_invoice(&db, member.id, None).await?;

        let result = send_invoice_email(&db, &mailer, inv.id).await;
        assert!(matches!(result, Err(Error::EmailDelivery { .. })));

        // Invoice stays pending, no log row - the send is retryable
        let inv = Invoice::find_by_id(inv.id).one(&db).await?.unwrap();
        assert_eq!(inv.status, InvoiceStatus::Pending);
        assert!(inv.sent_at.is_none());
        assert!(InvoiceEmail::find().all(&db).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_send_invoice_email_requires_member_email() -> Result<()> {
        let db = setup_test_db().await?;
        let mailer = MockMailer::new();
        let member = create_member_without_email(&db, "Cara").await?;
        let (_, inv) = close_cycle_with_invoice(&db, member.id, None).await?;

        let result = send_invoice_email(&db, &mailer, inv.id).await;
        assert!(matches!(result, Err(Error::MissingEmail { .. })));
        assert!(mailer.sent().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_send_all_invoices_counts_and_marks_cycle() -> Result<()> {
        let db = setup_test_db().await?;
        let mailer = MockMailer::new();
        let m1 = create_test_member(&db, "Dot").await?;
        let m2 = create_test_member(&db, "Eva").await?;
        let cycle_row = create_active_cycle(&db, "April").await?;
        create_test_transaction(&db, m1.id, 10.0).await?;
        create_test_transaction(&db, m2.id, 20.0).await?;
        cycle::close_cycle(&db, cycle_row.id).await?;

        let result = send_all_invoices(&db, &mailer, cycle_row.id).await?;
        assert_eq!(result.sent, 2);
        assert_eq!(result.failed, 0);
        assert_eq!(mailer.sent().len(), 2);

        let cycle_row = cycle::get_cycle_by_id(&db, cycle_row.id).await?.unwrap();
        assert_eq!(cycle_row.status, CycleStatus::Invoiced);

        Ok(())
    }

    #[tokio::test]
    async fn test_send_all_invoices_partial_failure_still_marks_cycle() -> Result<()> {
        let db = setup_test_db().await?;
        let mailer = MockMailer::new();
        let with_email = create_test_member(&db, "Finn").await?;
        let without_email = create_member_without_email(&db, "Gus").await?;
        let cycle_row = create_active_cycle(&db, "May").await?;
        create_test_transaction(&db, with_email.id, 10.0).await?;
        create_test_transaction(&db, without_email.id, 20.0).await?;
        cycle::close_cycle(&db, cycle_row.id).await?;

        let result = send_all_invoices(&db, &mailer, cycle_row.id).await?;
        assert_eq!(result.sent, 1);
        assert_eq!(result.failed, 1);

        // The failed invoice stays pending and retryable; the cycle still
        // transitions to invoiced.
        let cycle_row = cycle::get_cycle_by_id(&db, cycle_row.id).await?.unwrap();
        assert_eq!(cycle_row.status, CycleStatus::Invoiced);
        let pending = Invoice::find()
            .filter(invoice::Column::Status.eq(InvoiceStatus::Pending))
            .all(&db)
            .await?;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].member_id, without_email.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_send_all_invoices_rejects_active_cycle() -> Result<()> {
        let db = setup_test_db().await?;
        let mailer = MockMailer::new();
        let cycle_row = create_active_cycle(&db, "June").await?;

        let result = send_all_invoices(&db, &mailer, cycle_row.id).await;
        assert!(matches!(result, Err(Error::InvalidStatus { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_card_declined_notice() -> Result<()> {
        let db = setup_test_db().await?;
        let mailer = MockMailer::new();
        let member = create_test_member(&db, "Hal").await?;

        send_card_declined_notice(&mailer, &member).await?;

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Card payment declined");
        assert!(sent[0].html.contains("Hal"));

        let no_email = create_member_without_email(&db, "Ivy").await?;
        let result = send_card_declined_notice(&mailer, &no_email).await;
        assert!(matches!(result, Err(Error::MissingEmail { .. })));

        Ok(())
    }

    #[test]
    fn test_render_groups_by_business_and_totals() {
        let member = member::Model {
            id: 1,
            name: "Ana".to_string(),
            email: Some("ana@example.org".to_string()),
            phone: None,
            balance: 0.0,
            card_status: crate::entities::CardStatus::Active,
            created_at: chrono::Utc::now(),
        };
        let cycle = billing_cycle::Model {
            id: 1,
            name: "March".to_string(),
            start_date: chrono::NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            end_date: chrono::NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
            status: CycleStatus::Closed,
            closed_at: None,
            created_at: chrono::Utc::now(),
        };
        let inv = invoice::Model {
            id: 1,
            billing_cycle_id: 1,
            member_id: 1,
            total_amount: 42.5,
            transaction_count: 2,
            status: InvoiceStatus::Pending,
            payment_status: crate::entities::PaymentStatus::Unpaid,
            email_message: Some("Thank you!".to_string()),
            sent_at: None,
            email_sent_to: None,
            created_at: chrono::Utc::now(),
        };
        let row = |business_id, amount: f64, description: &str| transaction::Model {
            id: 0,
            member_id: 1,
            business_id,
            amount,
            description: description.to_string(),
            billing_cycle_id: Some(1),
            balance_before: 0.0,
            balance_after: amount,
            source: TransactionSource::Kiosk,
            voided: false,
            created_at: chrono::Utc::now(),
        };
        let transactions = vec![
            row(Some(7), 30.0, "Bread"),
            row(Some(7), 12.5, "Coffee"),
            row(None, 5.0, "Manual entry"),
        ];
        let mut business_names = HashMap::new();
        business_names.insert(7, "Bakery".to_string());

        let html = render_invoice_email(&member, &cycle, &inv, &transactions, &business_names);

        assert!(html.contains("<h3>Bakery</h3>"));
        assert!(html.contains("<h3>General</h3>"));
        assert!(html.contains("$42.50"));
        assert!(html.contains("Total due: $42.50"));
        assert!(html.contains("Thank you!"));
    }
}
