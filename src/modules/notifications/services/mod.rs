pub mod notifier;

pub use notifier::{notifier_from_config, HttpNotifier, LogNotifier, NotificationKind, Notifier};
