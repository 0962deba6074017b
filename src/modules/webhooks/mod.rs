pub mod controllers;
pub mod models;
pub mod services;

pub use controllers::{configure, SIGNATURE_HEADER};
pub use models::GatewayEvent;
pub use services::{SignatureVerifier, WebhookEventProcessor, WebhookOutcome};
