pub mod event_processor;
pub mod signature;

pub use event_processor::{WebhookEventProcessor, WebhookOutcome};
pub use signature::SignatureVerifier;
