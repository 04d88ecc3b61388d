//! Request-scoped consent context (tier 1)

use crate::prelude::*;

/// Storage tier a record was found in, fastest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
	Request,
	Session,
	Cookie,
	Persistent,
}

/// Cookie change waiting to be applied to the response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieChange {
	/// Signed cookie value to store
	Set(Box<str>),
	Remove,
}

/// Consent state attached to one request/response exchange.
///
/// Holds the tier-1 record itself plus what the other tiers need from the
/// request: the session id, the inbound cookie and the identity key. Never
/// outlives the request.
#[derive(Debug, Clone, Default)]
pub struct ConsentCtx {
	pub record: Option<ConsentRecord>,
	/// `None` when the host has not initialized a session
	pub session_id: Option<Box<str>>,
	/// Inbound signed cookie value
	pub cookie: Option<Box<str>>,
	pub cookie_change: Option<CookieChange>,
	/// Identity key; `None` for anonymous requests
	pub identity: Option<Box<str>>,
}

impl ConsentCtx {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_session(mut self, session_id: impl Into<Box<str>>) -> Self {
		self.session_id = Some(session_id.into());
		self
	}

	pub fn with_cookie(mut self, cookie: impl Into<Box<str>>) -> Self {
		self.cookie = Some(cookie.into());
		self
	}

	pub fn with_identity(mut self, identity: impl Into<Box<str>>) -> Self {
		self.identity = Some(identity.into());
		self
	}

	/// Cookie value as the client will hold it after this response
	pub fn effective_cookie(&self) -> Option<&str> {
		match &self.cookie_change {
			Some(CookieChange::Set(value)) => Some(value),
			Some(CookieChange::Remove) => None,
			None => self.cookie.as_deref(),
		}
	}
}

// vim: ts=4
