pub mod gateways;
pub mod health;
pub mod installments;
pub mod loans;
pub mod mandates;
pub mod notifications;
pub mod payments;
pub mod webhooks;
