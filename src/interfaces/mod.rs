//! Collaborator interfaces.
//!
//! The order/payment core depends on its surroundings only through the
//! traits in this module: order persistence, catalog price lookup, admin
//! recipient resolution, email delivery, and the per-processor payment
//! gateway contract. Each interface carries its own error enum and
//! `Result` alias.

pub mod catalog;
pub mod directory;
pub mod gateway;
pub mod mailer;
pub mod order_store;

pub use catalog::Catalog;
pub use directory::AdminDirectory;
pub use gateway::{
    Callback, CallbackOutcome, CreatedPayment, GatewayError, PaymentGateway, PaymentRequest,
    VerificationFailure, VerifiedResult,
};
pub use mailer::Mailer;
pub use order_store::{Disposition, OrderStore, SettleOutcome, StoreError};
