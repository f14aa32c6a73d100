//! Core business logic - framework-agnostic billing engine operations.
//!
//! Everything here takes a database connection and returns structured data;
//! the web and kiosk surfaces format it for display.

/// Balance recalculation and atomic balance writes
pub mod balance;
/// Cycle lifecycle - create, close (settlement), delete
pub mod cycle;
/// Transaction dispute review workflow
pub mod dispute;
/// Unpaid-invoice export rows with the card-fee rule
pub mod export;
/// Invoice generation, reconciliation, and the cycle read model
pub mod invoice;
/// Payment recording and bulk status reconciliation
pub mod payment;
/// Ledger write paths - create, edit, void, delete, bulk upload
pub mod transaction;
