//! Domain types shared by the relay: platforms, webhook payloads, and the
//! customer-to-contact mapping.

pub mod contact;
pub mod event;
pub mod types;

pub use contact::ContactUpsertPayload;
pub use event::{CustomerUpdateEvent, MauticWebhookEvent, PayloadError};
pub use types::{AccessToken, CustomerId, CustomerRecord, Platform};
