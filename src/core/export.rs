//! Unpaid-invoice export rows for the admin CSV download.
//!
//! The CSV formatting itself lives in the UI layer; this module produces
//! the rows, including the card-processing fee business rule: a flat 10%
//! applied to the amount still owed after existing payments, not to the
//! original invoice total.

use crate::{core::invoice::get_billing_cycle_with_invoices, errors::Result};
use sea_orm::DatabaseConnection;

/// Card-processing fee applied to online payments of outstanding balances.
pub const CARD_FEE_RATE: f64 = 0.10;

/// One row of the unpaid-invoices export.
#[derive(Debug, Clone)]
pub struct UnpaidInvoiceRow {
    /// Invoice the row describes
    pub invoice_id: i64,
    /// Billed member's display name
    pub member_name: String,
    /// Billed member's email, None if not on file
    pub member_email: Option<String>,
    /// Remaining amount owed
    pub amount_owed: f64,
    /// 10% card-processing fee on the owed amount
    pub fee_amount: f64,
    /// Owed amount plus fee
    pub total_with_fee: f64,
}

/// Builds export rows for every invoice in the cycle that still has an
/// outstanding balance.
pub async fn unpaid_invoice_export_rows(
    db: &DatabaseConnection,
    cycle_id: i64,
) -> Result<Vec<UnpaidInvoiceRow>> {
    let view = get_billing_cycle_with_invoices(db, cycle_id).await?;

    Ok(view
        .invoices
        .into_iter()
        .filter(|iv| iv.amount_owed > 0.0)
        .map(|iv| {
            let fee_amount = iv.amount_owed * CARD_FEE_RATE;
            UnpaidInvoiceRow {
                invoice_id: iv.invoice.id,
                member_name: iv.member_name,
                member_email: iv.member_email,
                amount_owed: iv.amount_owed,
                fee_amount,
                total_with_fee: iv.amount_owed + fee_amount,
            }
        })
        .collect())
}
