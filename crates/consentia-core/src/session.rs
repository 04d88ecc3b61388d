//! In-memory session store
//!
//! For single-process hosts and tests. Hosts with their own session backend
//! implement [`SessionAdapter`] on top of it instead.

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;

use consentia_types::session_adapter::SessionAdapter;

use crate::prelude::*;

pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

type Session = HashMap<Box<str>, Box<str>>;

/// Session store holding at most a fixed number of sessions. When full, the
/// least recently used session is dropped.
#[derive(Debug)]
pub struct MemorySessionStore {
	sessions: Mutex<LruCache<Box<str>, Session>>,
}

impl Default for MemorySessionStore {
	fn default() -> Self {
		Self::new()
	}
}

impl MemorySessionStore {
	pub fn new() -> Self {
		Self::with_capacity(DEFAULT_MAX_SESSIONS)
	}

	pub fn with_capacity(max_sessions: usize) -> Self {
		const ONE: NonZeroUsize = match NonZeroUsize::new(1) {
			Some(v) => v,
			None => unreachable!(),
		};
		let cap = NonZeroUsize::new(max_sessions).unwrap_or(ONE);
		Self { sessions: Mutex::new(LruCache::new(cap)) }
	}

	/// Number of live sessions
	pub fn len(&self) -> usize {
		self.sessions.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Drops a whole session, e.g. on logout
	pub fn drop_session(&self, session_id: &str) {
		self.sessions.lock().pop(session_id);
	}
}

#[async_trait]
impl SessionAdapter for MemorySessionStore {
	async fn read(&self, session_id: &str, key: &str) -> ClResult<Option<Box<str>>> {
		Ok(self.sessions.lock().get(session_id).and_then(|s| s.get(key)).cloned())
	}

	async fn write(&self, session_id: &str, key: &str, value: &str) -> ClResult<()> {
		let mut sessions = self.sessions.lock();
		if let Some(session) = sessions.get_mut(session_id) {
			session.insert(key.into(), value.into());
			return Ok(());
		}

		if sessions.len() == sessions.cap().get() {
			debug!("session store full, dropping least recently used session");
		}
		let mut session = Session::new();
		session.insert(key.into(), value.into());
		sessions.put(session_id.into(), session);
		Ok(())
	}

	async fn remove(&self, session_id: &str, key: &str) -> ClResult<()> {
		let mut sessions = self.sessions.lock();
		let emptied = match sessions.get_mut(session_id) {
			Some(session) => {
				session.remove(key);
				session.is_empty()
			}
			None => false,
		};
		if emptied {
			sessions.pop(session_id);
		}
		Ok(())
	}
}


// vim: ts=4
