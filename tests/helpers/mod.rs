// Test helpers shared by the integration and contract suites.
//
// Everything runs against the in-memory store, a scripted gateway and a
// recording notifier, so no database or network is needed.
//
// Usage:
//   #[path = "../helpers/mod.rs"]
//   mod helpers;
//   use helpers::*;

#![allow(dead_code)]

pub mod fakes;
pub mod fixtures;
pub mod payloads;

pub use fakes::*;
pub use fixtures::*;
pub use payloads::*;
