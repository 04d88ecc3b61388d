//! Shared types, adapter traits, and core utilities for Consentia.
//!
//! This crate holds the consent record, the validity policy and the adapter
//! traits for the session and persistent tiers. Storage adapters depend on
//! this crate only, so they compile without pulling in the resolver and the
//! web integration.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod consent_adapter;
pub mod error;
pub mod policy;
pub mod prelude;
pub mod record;
pub mod session_adapter;
pub mod types;

// vim: ts=4
