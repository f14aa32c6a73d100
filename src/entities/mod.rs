//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod admin_user;
pub mod billing_cycle;
pub mod business;
pub mod cash_payment;
pub mod invoice;
pub mod invoice_email;
pub mod member;
pub mod transaction;
pub mod transaction_dispute;

// Re-export specific types to avoid conflicts
pub use admin_user::{Column as AdminUserColumn, Entity as AdminUser, Model as AdminUserModel};
pub use billing_cycle::{
    Column as BillingCycleColumn, CycleStatus, Entity as BillingCycle, Model as BillingCycleModel,
};
pub use business::{Column as BusinessColumn, Entity as Business, Model as BusinessModel};
pub use cash_payment::{
    Column as CashPaymentColumn, Entity as CashPayment, Model as CashPaymentModel, PaymentType,
};
pub use invoice::{
    Column as InvoiceColumn, Entity as Invoice, InvoiceStatus, Model as InvoiceModel, PaymentStatus,
};
pub use invoice_email::{
    Column as InvoiceEmailColumn, Entity as InvoiceEmail, Model as InvoiceEmailModel,
};
pub use member::{CardStatus, Column as MemberColumn, Entity as Member, Model as MemberModel};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
    TransactionSource,
};
pub use transaction_dispute::{
    Column as TransactionDisputeColumn, DisputeStatus, Entity as TransactionDispute,
    Model as TransactionDisputeModel,
};
