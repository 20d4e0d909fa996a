//! Chat-Sync Provider - the capability interface external chat providers
//! implement, and the registry that dispatches on the provider tag
//! (spec §2.1, §4.1).
//!
//! This crate knows nothing about Discord (or any other concrete provider);
//! `chatsync-discord` implements `Adapter` against this interface.

pub mod adapter;
pub mod registry;

pub use adapter::*;
pub use registry::*;
