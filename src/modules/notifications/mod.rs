pub mod services;

pub use services::{NotificationKind, Notifier};
