//! Core logic for managed vocabulary-learning devices: the screen
//! access-control gate every screen passes through before becoming
//! interactive, and the first-run setup wizard state machine.
//!
//! The surrounding app (rendering, dialogs, notifications, persistence)
//! stays on the host side; this crate only consumes the capability
//! traits in [`services`].

pub mod error;
pub mod policy;
pub mod services;
pub mod wizard;
