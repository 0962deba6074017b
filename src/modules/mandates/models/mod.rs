pub mod mandate;

pub use mandate::{BankAccount, Mandate, MandateEvent, MandateStatus, Transition};
