//! Adapter for the server-side session tier (tier 2).
//!
//! Sessions belong to the host application; this trait only reads and writes
//! the one entry the consent resolver owns. Values are codec-encoded records.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::prelude::*;

#[async_trait]
pub trait SessionAdapter: Debug + Send + Sync {
	/// Reads a session value, `Ok(None)` when the key is not set
	async fn read(&self, session_id: &str, key: &str) -> ClResult<Option<Box<str>>>;

	/// Writes a session value
	async fn write(&self, session_id: &str, key: &str, value: &str) -> ClResult<()>;

	/// Removes a session value; removing a missing key is not an error
	async fn remove(&self, session_id: &str, key: &str) -> ClResult<()>;
}

// vim: ts=4
