//! Database configuration module.
//!
//! Handles `SQLite` database connection and table creation using `SeaORM`.
//! Table creation uses `Schema::create_table_from_entity` so the schema is
//! generated directly from the entity definitions, keeping the database in
//! lockstep with the Rust structs without hand-written SQL.

use crate::entities::{
    AdminUser, BillingCycle, Business, CashPayment, Invoice, InvoiceEmail, Member, Transaction,
    TransactionDispute,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

/// Gets the database URL from environment variable or returns the default
/// local `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://data/pdca.sqlite".to_string())
}

/// Establishes a connection to the database using the `DATABASE_URL`
/// environment variable, falling back to a default local `SQLite` file.
pub async fn create_connection() -> Result<DatabaseConnection> {
    Database::connect(get_database_url())
        .await
        .map_err(Into::into)
}

/// Creates all tables used by the billing engine from the entity definitions.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let member_table = schema.create_table_from_entity(Member);
    let business_table = schema.create_table_from_entity(Business);
    let transaction_table = schema.create_table_from_entity(Transaction);
    let billing_cycle_table = schema.create_table_from_entity(BillingCycle);
    let invoice_table = schema.create_table_from_entity(Invoice);
    let cash_payment_table = schema.create_table_from_entity(CashPayment);
    let dispute_table = schema.create_table_from_entity(TransactionDispute);
    let invoice_email_table = schema.create_table_from_entity(InvoiceEmail);
    let admin_user_table = schema.create_table_from_entity(AdminUser);

    db.execute(builder.build(&member_table)).await?;
    db.execute(builder.build(&business_table)).await?;
    db.execute(builder.build(&transaction_table)).await?;
    db.execute(builder.build(&billing_cycle_table)).await?;
    db.execute(builder.build(&invoice_table)).await?;
    db.execute(builder.build(&cash_payment_table)).await?;
    db.execute(builder.build(&dispute_table)).await?;
    db.execute(builder.build(&invoice_email_table)).await?;
    db.execute(builder.build(&admin_user_table)).await?;

    Ok(())
}
