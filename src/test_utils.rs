//! Shared test utilities for the billing engine.
//!
//! Provides an in-memory `SQLite` database with all tables created, factory
//! helpers for the common entities, and a mock email delivery collaborator
//! with switchable failure mode.

use crate::{
    core::{cycle, transaction},
    email::message::{EmailDelivery, EmailMessage, SendOutcome},
    entities::{
        CardStatus, Transaction, TransactionSource, admin_user, billing_cycle, business, member,
        transaction as transaction_entity,
    },
    errors::{Error, Result},
};
use async_trait::async_trait;
use sea_orm::{DatabaseConnection, QueryOrder, Set, prelude::*};
use std::sync::Mutex;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    // First caller wins; later try_init calls are no-ops. RUST_LOG surfaces
    // engine logs when debugging a test.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();

    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a test member with a zero balance and an email address derived
/// from the name.
pub async fn create_test_member(db: &DatabaseConnection, name: &str) -> Result<member::Model> {
    let email = format!("{}@example.org", name.to_lowercase());
    let row = member::ActiveModel {
        name: Set(name.to_string()),
        email: Set(Some(email)),
        phone: Set(None),
        balance: Set(0.0),
        card_status: Set(CardStatus::Active),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    row.insert(db).await.map_err(Into::into)
}

/// Creates a test member with no email address on file.
pub async fn create_member_without_email(
    db: &DatabaseConnection,
    name: &str,
) -> Result<member::Model> {
    let row = member::ActiveModel {
        name: Set(name.to_string()),
        email: Set(None),
        phone: Set(None),
        balance: Set(0.0),
        card_status: Set(CardStatus::Active),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    row.insert(db).await.map_err(Into::into)
}

/// Creates a test business, optionally owned by a member.
pub async fn create_test_business(
    db: &DatabaseConnection,
    name: &str,
    owner_member_id: Option<i64>,
) -> Result<business::Model> {
    let row = business::ActiveModel {
        name: Set(name.to_string()),
        owner_member_id: Set(owner_member_id),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    row.insert(db).await.map_err(Into::into)
}

/// Creates a test admin user.
pub async fn create_test_admin(db: &DatabaseConnection, name: &str) -> Result<admin_user::Model> {
    let row = admin_user::ActiveModel {
        name: Set(name.to_string()),
        email: Set(format!("{}@example.org", name.to_lowercase())),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    row.insert(db).await.map_err(Into::into)
}

/// Creates an active billing cycle through the lifecycle manager
/// (auto-closing any previous cycle, exactly like production).
pub async fn create_active_cycle(
    db: &DatabaseConnection,
    name: &str,
) -> Result<billing_cycle::Model> {
    let result = cycle::create_cycle(db, name.to_string()).await?;
    Ok(result.cycle)
}

/// Creates a test transaction with sensible defaults through the regular
/// ledger write path, so balances and cycle attachment behave as in
/// production.
///
/// # Defaults
/// * `business_id`: None
/// * `description`: `"Test charge"`
/// * `source`: kiosk
pub async fn create_test_transaction(
    db: &DatabaseConnection,
    member_id: i64,
    amount: f64,
) -> Result<transaction_entity::Model> {
    transaction::create_transaction(
        db,
        transaction::NewTransaction {
            member_id,
            business_id: None,
            amount,
            description: "Test charge".to_string(),
            source: TransactionSource::Kiosk,
        },
    )
    .await
}

/// Returns a member's transactions ordered by insertion (row id).
pub async fn get_member_transactions_ordered(
    db: &DatabaseConnection,
    member_id: i64,
) -> Result<Vec<transaction_entity::Model>> {
    Transaction::find()
        .filter(transaction_entity::Column::MemberId.eq(member_id))
        .order_by_asc(transaction_entity::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// In-memory email delivery double: records every message, optionally
/// failing each send with a fixed error.
pub struct MockMailer {
    sent: Mutex<Vec<EmailMessage>>,
    fail_with: Option<String>,
}

impl MockMailer {
    /// A mailer where every send succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_with: None,
        }
    }

    /// A mailer where every send fails with the given message.
    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }

    /// Everything successfully "sent" so far.
    #[must_use]
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for MockMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailDelivery for MockMailer {
    async fn send(&self, message: &EmailMessage) -> Result<SendOutcome> {
        if let Some(message) = &self.fail_with {
            return Err(Error::EmailDelivery {
                message: message.clone(),
            });
        }

        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());
        Ok(SendOutcome {
            id: Some(format!("mock-{}", sent.len())),
        })
    }
}
