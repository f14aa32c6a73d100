//! Unified error types and result handling for the billing engine.
//!
//! All fallible operations return [`Result`], and callers are expected to
//! match on the variants they can handle (missing records, rejected state
//! transitions) while letting storage and delivery failures propagate.

use thiserror::Error;

/// Errors produced by the billing engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A member referenced by id does not exist
    #[error("Member {id} not found")]
    MemberNotFound {
        /// The missing member id
        id: i64,
    },

    /// A billing cycle referenced by id does not exist
    #[error("Billing cycle {id} not found")]
    CycleNotFound {
        /// The missing cycle id
        id: i64,
    },

    /// An invoice referenced by id does not exist
    #[error("Invoice {id} not found")]
    InvoiceNotFound {
        /// The missing invoice id
        id: i64,
    },

    /// A transaction referenced by id does not exist
    #[error("Transaction {id} not found")]
    TransactionNotFound {
        /// The missing transaction id
        id: i64,
    },

    /// A dispute referenced by id does not exist
    #[error("Dispute {id} not found")]
    DisputeNotFound {
        /// The missing dispute id
        id: i64,
    },

    /// A monetary amount was zero, NaN, or infinite
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// A state transition or status value was rejected
    #[error("Invalid status: {message}")]
    InvalidStatus {
        /// What was rejected and why
        message: String,
    },

    /// The invoice's member has no email address on file
    #[error("Member {member_id} has no email address")]
    MissingEmail {
        /// The member missing an address
        member_id: i64,
    },

    /// The email delivery collaborator reported a failure
    #[error("Email delivery failed: {message}")]
    EmailDelivery {
        /// Provider-reported failure message
        message: String,
    },

    /// Configuration loading or validation failed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Any error surfaced by the persistence layer
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Convenience `Result` type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
