//! Invoice email dispatch and the delivery collaborator seam.

/// Rendering, single sends, and the cycle-wide batch send
pub mod dispatcher;
/// The `EmailDelivery` trait and message types
pub mod message;
/// HTTP client for the hosted delivery provider
pub mod resend;
