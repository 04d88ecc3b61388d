//! Tiered consent storage
//!
//! Tiers in read precedence, fastest first:
//!
//! 1. request context ([`ConsentCtx::record`])
//! 2. server-side session ([`SessionAdapter`])
//! 3. signed cookie
//! 4. persistent store ([`ConsentAdapter`]), identified visitors only
//!
//! Reads return the first hit. Writes go to every tier on a best-effort
//! basis: a failing tier is logged and skipped, never raised. The persistent
//! tier is never cleared, it is the audit trail.

use std::sync::Arc;

use consentia_types::consent_adapter::{ConsentAdapter, NullConsentAdapter};
use consentia_types::policy::is_effective_consent;
use consentia_types::session_adapter::SessionAdapter;

use crate::codec;
use crate::context::{ConsentCtx, CookieChange, Tier};
use crate::cookie;
use crate::opts::ConsentOpts;
use crate::prelude::*;

/// Per-call options
#[derive(Debug, Default, Clone, Copy)]
pub struct StoreOpts {
	/// Do not write the persistent tier on this call
	pub skip_persistence: bool,
	/// Do not write the session tier on this call; reading it still happens
	pub skip_session_cache: bool,
}

impl StoreOpts {
	pub fn skip_persistence() -> Self {
		StoreOpts { skip_persistence: true, ..Default::default() }
	}

	pub fn skip_session_cache() -> Self {
		StoreOpts { skip_session_cache: true, ..Default::default() }
	}
}

/// Picks the record granted last. The whole record wins, fields are never
/// mixed.
///
/// A parseable `granted_at` beats a missing or raw one. On a tie, or when
/// neither timestamp is usable, the persisted record wins.
pub fn newest(
	persisted: Option<ConsentRecord>,
	cookie: Option<ConsentRecord>,
) -> Option<ConsentRecord> {
	match (persisted, cookie) {
		(Some(persisted), Some(cookie)) => {
			match (persisted.granted_timestamp(), cookie.granted_timestamp()) {
				(Some(p), Some(c)) if c > p => Some(cookie),
				(None, Some(_)) => Some(cookie),
				_ => Some(persisted),
			}
		}
		(persisted, None) => persisted,
		(None, cookie) => cookie,
	}
}

#[derive(Debug, Clone)]
pub struct ConsentStorage {
	opts: Arc<ConsentOpts>,
	sessions: Arc<dyn SessionAdapter>,
	consent_adapter: Arc<dyn ConsentAdapter>,
}

impl ConsentStorage {
	/// Storage without a persistent tier
	pub fn new(opts: ConsentOpts, sessions: Arc<dyn SessionAdapter>) -> Self {
		ConsentStorage {
			opts: Arc::new(opts),
			sessions,
			consent_adapter: Arc::new(NullConsentAdapter),
		}
	}

	pub fn with_consent_adapter(mut self, consent_adapter: Arc<dyn ConsentAdapter>) -> Self {
		self.consent_adapter = consent_adapter;
		self
	}

	pub fn opts(&self) -> &ConsentOpts {
		&self.opts
	}

	// Read
	//******

	/// Returns the first record found, unmodified and without judging its
	/// validity. No side effects.
	pub async fn read(&self, ctx: &ConsentCtx) -> Option<ConsentRecord> {
		self.read_with_source(ctx).await.map(|(record, _)| record)
	}

	/// Like [`Self::read`], also reporting which tier answered
	pub async fn read_with_source(&self, ctx: &ConsentCtx) -> Option<(ConsentRecord, Tier)> {
		if let Some(record) = &ctx.record {
			return Some((record.clone(), Tier::Request));
		}

		match self.read_session(ctx).await {
			Ok(Some(record)) => return Some((record, Tier::Session)),
			Ok(None) => {}
			Err(err) => debug!("consent session tier miss: {}", err),
		}

		match self.read_cookie(ctx) {
			Ok(Some(record)) => return Some((record, Tier::Cookie)),
			Ok(None) => {}
			Err(err) => debug!("consent cookie tier miss: {}", err),
		}

		let identity = ctx.identity.as_deref()?;
		match self.consent_adapter.load_by_identity(identity).await {
			Ok(Some(record)) => Some((record, Tier::Persistent)),
			Ok(None) => None,
			Err(err) => {
				warn!("consent persistent tier unavailable for {}: {}", identity, err);
				None
			}
		}
	}

	async fn read_session(&self, ctx: &ConsentCtx) -> ClResult<Option<ConsentRecord>> {
		let Some(session_id) = ctx.session_id.as_deref() else {
			return Ok(None);
		};
		let value = self.sessions.read(session_id, &self.opts.session_key).await?;
		codec::decode(value.as_deref())
	}

	fn read_cookie(&self, ctx: &ConsentCtx) -> ClResult<Option<ConsentRecord>> {
		let Some(value) = ctx.effective_cookie().filter(|v| !v.is_empty()) else {
			return Ok(None);
		};
		let payload = cookie::verify(&self.opts.secret, value)?;
		codec::decode(Some(payload.as_str()))
	}

	// Write
	//*******

	/// Writes `record` to request context, cookie, session and, for
	/// identified visitors, the persistent store, in that order.
	pub async fn write(&self, ctx: &mut ConsentCtx, record: ConsentRecord, opts: StoreOpts) {
		ctx.record = Some(record.clone());

		match self.encode_cookie(&record) {
			Ok(value) => ctx.cookie_change = Some(CookieChange::Set(value.into())),
			Err(err) => warn!("consent cookie not written: {}", err),
		}

		if opts.skip_session_cache {
			debug!("consent session write skipped");
		} else if let Err(err) = self.write_session(ctx, &record).await {
			warn!("consent session not written: {}", err);
		}

		if opts.skip_persistence {
			debug!("consent persistent write skipped");
		} else if let Some(identity) = ctx.identity.as_deref() {
			if let Err(err) = self.consent_adapter.save(identity, &record).await {
				warn!("consent not persisted for {}: {}", identity, err);
			}
		}
	}

	/// Records a new consent choice made now, then writes it everywhere
	pub async fn grant<I, S>(
		&self,
		ctx: &mut ConsentCtx,
		policy_version: &str,
		categories: I,
		opts: StoreOpts,
	) -> ConsentRecord
	where
		I: IntoIterator<Item = S>,
		S: Into<Box<str>>,
	{
		let record = ConsentRecord::grant(policy_version, categories, now(), self.opts.lifetime_days);
		info!(
			"consent granted: terms={} groups={:?}",
			record.policy_version, record.accepted_categories
		);
		self.write(ctx, record.clone(), opts).await;
		record
	}

	fn encode_cookie(&self, record: &ConsentRecord) -> ClResult<String> {
		let payload = codec::encode(Some(record))?;
		cookie::sign(&self.opts.secret, &payload)
	}

	async fn write_session(&self, ctx: &ConsentCtx, record: &ConsentRecord) -> ClResult<()> {
		let session_id = ctx.session_id.as_deref().ok_or(Error::SessionUnavailable)?;
		let value = codec::encode(Some(record))?;
		self.sessions.write(session_id, &self.opts.session_key, &value).await
	}

	// Delete
	//********

	/// Withdraws consent from request context, cookie and session.
	///
	/// The persistent store keeps its copy.
	pub async fn delete(&self, ctx: &mut ConsentCtx) {
		ctx.record = None;
		ctx.cookie_change = Some(CookieChange::Remove);

		if let Some(session_id) = ctx.session_id.as_deref() {
			if let Err(err) = self.sessions.remove(session_id, &self.opts.session_key).await {
				warn!("consent session not cleared: {}", err);
			}
		}
		info!("consent withdrawn");
	}

	// Sync
	//******

	/// Merges the persisted and the cookie record of a visitor who just got
	/// identified, newest wins, and writes the winner to every tier.
	pub async fn sync_on_identity_established(
		&self,
		ctx: &mut ConsentCtx,
		identity: &str,
		opts: StoreOpts,
	) -> Option<ConsentRecord> {
		ctx.identity = Some(identity.into());

		let persisted = match self.consent_adapter.load_by_identity(identity).await {
			Ok(record) => record,
			Err(err) => {
				warn!("consent persistent tier unavailable for {}: {}", identity, err);
				None
			}
		};
		let from_cookie = self.read_cookie(ctx).unwrap_or_else(|err| {
			debug!("consent cookie tier miss: {}", err);
			None
		});

		let winner = newest(persisted, from_cookie)?;
		debug!(
			"consent sync for {}: terms={} effective={}",
			identity,
			winner.policy_version,
			is_effective_consent(Some(&winner))
		);
		self.write(ctx, winner.clone(), opts).await;
		Some(winner)
	}

	// Cache
	//*******

	/// Copies a record found in a slower tier into the faster ones: request
	/// context, session and, for a persistent hit, the cookie. The
	/// persistent store is never written.
	pub async fn cache(&self, ctx: &mut ConsentCtx, record: &ConsentRecord, source: Tier, opts: StoreOpts) {
		ctx.record = Some(record.clone());

		if source == Tier::Persistent {
			match self.encode_cookie(record) {
				Ok(value) => ctx.cookie_change = Some(CookieChange::Set(value.into())),
				Err(err) => warn!("consent cookie not cached: {}", err),
			}
		}

		if source > Tier::Session && !opts.skip_session_cache && ctx.session_id.is_some() {
			if let Err(err) = self.write_session(ctx, record).await {
				warn!("consent session not cached: {}", err);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::session::MemorySessionStore;
	use parking_lot::Mutex;
	use std::collections::HashMap;

	const SECRET: &[u8] = b"storage-test";

	#[derive(Debug, Default)]
	struct MemoryConsentAdapter {
		records: Mutex<HashMap<Box<str>, Vec<ConsentRecord>>>,
		fail: bool,
	}

	#[async_trait::async_trait]
	impl ConsentAdapter for MemoryConsentAdapter {
		async fn load_by_identity(&self, identity: &str) -> ClResult<Option<ConsentRecord>> {
			if self.fail {
				return Err(Error::DbError);
			}
			Ok(self.records.lock().get(identity).and_then(|v| v.last().cloned()))
		}

		async fn save(&self, identity: &str, record: &ConsentRecord) -> ClResult<()> {
			if self.fail {
				return Err(Error::DbError);
			}
			self.records.lock().entry(identity.into()).or_default().push(record.clone());
			Ok(())
		}
	}

	fn record(terms: &str, granted_at: i64) -> ConsentRecord {
		ConsentRecord::grant(terms, ["essential", "analytics"], Timestamp(granted_at), 365)
	}

	fn storage() -> (ConsentStorage, Arc<MemorySessionStore>, Arc<MemoryConsentAdapter>) {
		let sessions = Arc::new(MemorySessionStore::new());
		let adapter = Arc::new(MemoryConsentAdapter::default());
		let storage = ConsentStorage::new(ConsentOpts::new(SECRET), sessions.clone())
			.with_consent_adapter(adapter.clone());
		(storage, sessions, adapter)
	}

	fn signed(record: &ConsentRecord) -> Box<str> {
		let payload = codec::encode(Some(record)).unwrap();
		cookie::sign(SECRET, &payload).unwrap().into()
	}

	async fn session_record(sessions: &MemorySessionStore, session_id: &str) -> Option<ConsentRecord> {
		let value = sessions.read(session_id, "cookie_consent").await.unwrap();
		codec::decode(value.as_deref()).unwrap()
	}

	#[tokio::test]
	async fn test_read_empty() {
		let (storage, _, _) = storage();
		let ctx = ConsentCtx::new().with_session("s1").with_identity("alice");
		assert_eq!(storage.read(&ctx).await, None);
	}

	#[tokio::test]
	async fn test_request_tier_shadows_session() {
		let (storage, sessions, _) = storage();
		let in_session = record("v1", 100);
		let in_request = record("v2", 200);
		let value = codec::encode(Some(&in_session)).unwrap();
		sessions.write("s1", "cookie_consent", &value).await.unwrap();

		let mut ctx = ConsentCtx::new().with_session("s1");
		assert_eq!(storage.read_with_source(&ctx).await, Some((in_session, Tier::Session)));

		ctx.record = Some(in_request.clone());
		assert_eq!(storage.read_with_source(&ctx).await, Some((in_request, Tier::Request)));
	}

	#[tokio::test]
	async fn test_session_shadows_cookie() {
		let (storage, sessions, _) = storage();
		let in_session = record("v1", 100);
		sessions.write("s1", "cookie_consent", &codec::encode(Some(&in_session)).unwrap()).await.unwrap();

		let ctx = ConsentCtx::new().with_session("s1").with_cookie(signed(&record("v2", 200)));
		assert_eq!(storage.read(&ctx).await, Some(in_session));
	}

	#[tokio::test]
	async fn test_cookie_tier() {
		let (storage, _, _) = storage();
		let rec = record("v1", 100);
		let ctx = ConsentCtx::new().with_cookie(signed(&rec));
		assert_eq!(storage.read_with_source(&ctx).await, Some((rec, Tier::Cookie)));
	}

	#[tokio::test]
	async fn test_bad_cookie_falls_through_to_persistent() {
		let (storage, _, adapter) = storage();
		let rec = record("v1", 100);
		adapter.save("alice", &rec).await.unwrap();

		let ctx = ConsentCtx::new().with_cookie("garbage").with_identity("alice");
		assert_eq!(storage.read_with_source(&ctx).await, Some((rec, Tier::Persistent)));
	}

	#[tokio::test]
	async fn test_anonymous_skips_persistent() {
		let (storage, _, adapter) = storage();
		adapter.save("alice", &record("v1", 100)).await.unwrap();

		let ctx = ConsentCtx::new();
		assert_eq!(storage.read(&ctx).await, None);
	}

	#[tokio::test]
	async fn test_persistent_failure_is_a_miss() {
		let sessions = Arc::new(MemorySessionStore::new());
		let adapter = Arc::new(MemoryConsentAdapter { fail: true, ..Default::default() });
		let storage = ConsentStorage::new(ConsentOpts::new(SECRET), sessions).with_consent_adapter(adapter);

		let mut ctx = ConsentCtx::new().with_identity("alice");
		assert_eq!(storage.read(&ctx).await, None);

		// the other tiers are still written
		storage.write(&mut ctx, record("v1", 100), StoreOpts::default()).await;
		assert!(ctx.record.is_some());
		assert!(matches!(ctx.cookie_change, Some(CookieChange::Set(_))));
	}

	#[tokio::test]
	async fn test_write_all_tiers() {
		let (storage, sessions, adapter) = storage();
		let rec = record("v1", 100);
		let mut ctx = ConsentCtx::new().with_session("s1").with_identity("alice");

		storage.write(&mut ctx, rec.clone(), StoreOpts::default()).await;

		assert_eq!(ctx.record, Some(rec.clone()));
		assert_eq!(session_record(&sessions, "s1").await, Some(rec.clone()));
		assert_eq!(storage.read_cookie(&ctx).unwrap(), Some(rec.clone()));
		assert_eq!(adapter.load_by_identity("alice").await.unwrap(), Some(rec));
	}

	#[tokio::test]
	async fn test_write_without_session() {
		let (storage, _, _) = storage();
		let rec = record("v1", 100);
		let mut ctx = ConsentCtx::new();

		storage.write(&mut ctx, rec.clone(), StoreOpts::default()).await;

		assert_eq!(ctx.record, Some(rec.clone()));
		assert_eq!(storage.read_cookie(&ctx).unwrap(), Some(rec));
	}

	#[derive(Debug)]
	struct FailingSessions;

	#[async_trait::async_trait]
	impl SessionAdapter for FailingSessions {
		async fn read(&self, _session_id: &str, _key: &str) -> ClResult<Option<Box<str>>> {
			Err(Error::SessionUnavailable)
		}

		async fn write(&self, _session_id: &str, _key: &str, _value: &str) -> ClResult<()> {
			Err(Error::SessionUnavailable)
		}

		async fn remove(&self, _session_id: &str, _key: &str) -> ClResult<()> {
			Err(Error::SessionUnavailable)
		}
	}

	#[tokio::test]
	async fn test_write_persists_without_session() {
		let (storage, _, adapter) = storage();
		let rec = record("v1", 100);
		let mut ctx = ConsentCtx::new().with_identity("alice");

		storage.write(&mut ctx, rec.clone(), StoreOpts::default()).await;

		assert_eq!(storage.read_cookie(&ctx).unwrap(), Some(rec.clone()));
		assert_eq!(adapter.load_by_identity("alice").await.unwrap(), Some(rec));
	}

	#[tokio::test]
	async fn test_write_persists_when_session_fails() {
		let adapter = Arc::new(MemoryConsentAdapter::default());
		let storage = ConsentStorage::new(ConsentOpts::new(SECRET), Arc::new(FailingSessions))
			.with_consent_adapter(adapter.clone());
		let rec = record("v1", 100);
		let mut ctx = ConsentCtx::new().with_session("s1").with_identity("alice");

		storage.write(&mut ctx, rec.clone(), StoreOpts::default()).await;

		assert_eq!(ctx.record, Some(rec.clone()));
		assert_eq!(storage.read_cookie(&ctx).unwrap(), Some(rec.clone()));
		assert_eq!(adapter.load_by_identity("alice").await.unwrap(), Some(rec));
	}

	#[tokio::test]
	async fn test_write_skip_flags() {
		let (storage, sessions, adapter) = storage();
		let mut ctx = ConsentCtx::new().with_session("s1").with_identity("alice");

		storage.write(&mut ctx, record("v1", 100), StoreOpts::skip_persistence()).await;
		assert!(session_record(&sessions, "s1").await.is_some());
		assert_eq!(adapter.load_by_identity("alice").await.unwrap(), None);

		let mut ctx = ConsentCtx::new().with_session("s2").with_identity("bob");
		let opts = StoreOpts { skip_persistence: true, skip_session_cache: true };
		storage.write(&mut ctx, record("v1", 100), opts).await;

		assert_eq!(session_record(&sessions, "s2").await, None);
		assert_eq!(adapter.load_by_identity("bob").await.unwrap(), None);
		assert!(ctx.record.is_some());
		assert!(ctx.cookie_change.is_some());
	}

	#[tokio::test]
	async fn test_write_malformed_record_skips_cookie() {
		let (storage, _, _) = storage();
		let mut rec = record("v1", 100);
		rec.policy_version = "".into();
		let mut ctx = ConsentCtx::new();

		storage.write(&mut ctx, rec, StoreOpts::default()).await;

		assert!(ctx.record.is_some());
		assert_eq!(ctx.cookie_change, None);
	}

	#[tokio::test]
	async fn test_grant_stamps_now() {
		let (storage, _, _) = storage();
		let mut ctx = ConsentCtx::new();
		let before = now();

		let rec = storage.grant(&mut ctx, "v1", ["essential"], StoreOpts::default()).await;

		let granted = rec.granted_timestamp().unwrap();
		assert!(granted >= before);
		assert_eq!(rec.expires_timestamp(), Some(granted.add_days(365)));
		assert!(is_effective_consent(ctx.record.as_ref()));
	}

	#[tokio::test]
	async fn test_delete_keeps_audit_tier() {
		let (storage, sessions, _) = storage();
		let rec = record("v1", 100);
		let mut ctx = ConsentCtx::new().with_session("s1").with_identity("alice");
		storage.write(&mut ctx, rec.clone(), StoreOpts::default()).await;

		storage.delete(&mut ctx).await;

		assert_eq!(ctx.record, None);
		assert_eq!(ctx.cookie_change, Some(CookieChange::Remove));
		assert_eq!(session_record(&sessions, "s1").await, None);
		assert_eq!(storage.read_cookie(&ctx).unwrap(), None);
		// falls through to the persistent tier
		assert_eq!(storage.read_with_source(&ctx).await, Some((rec, Tier::Persistent)));
	}

	#[tokio::test]
	async fn test_sync_newest_cookie_wins() {
		let (storage, sessions, adapter) = storage();
		let old = record("v1", 100);
		let new = record("v2", 200);
		adapter.save("alice", &old).await.unwrap();

		let mut ctx = ConsentCtx::new().with_session("s1").with_cookie(signed(&new));
		let winner = storage.sync_on_identity_established(&mut ctx, "alice", StoreOpts::default()).await;

		assert_eq!(winner, Some(new.clone()));
		assert_eq!(ctx.identity.as_deref(), Some("alice"));
		assert_eq!(ctx.record, Some(new.clone()));
		assert_eq!(session_record(&sessions, "s1").await, Some(new.clone()));
		assert_eq!(storage.read_cookie(&ctx).unwrap(), Some(new.clone()));
		assert_eq!(adapter.load_by_identity("alice").await.unwrap(), Some(new));
	}

	#[tokio::test]
	async fn test_sync_newest_persisted_wins() {
		let (storage, _, adapter) = storage();
		let old = record("v1", 100);
		let new = record("v2", 200);
		adapter.save("alice", &new).await.unwrap();

		let mut ctx = ConsentCtx::new().with_cookie(signed(&old));
		let winner = storage.sync_on_identity_established(&mut ctx, "alice", StoreOpts::default()).await;

		assert_eq!(winner, Some(new.clone()));
		assert_eq!(storage.read_cookie(&ctx).unwrap(), Some(new));
	}

	#[tokio::test]
	async fn test_sync_neither() {
		let (storage, _, _) = storage();
		let mut ctx = ConsentCtx::new();
		let winner = storage.sync_on_identity_established(&mut ctx, "alice", StoreOpts::default()).await;

		assert_eq!(winner, None);
		assert_eq!(ctx.record, None);
		assert_eq!(ctx.cookie_change, None);
	}

	#[test]
	fn test_newest_rules() {
		let p = record("persisted", 100);
		let c = record("cookie", 100);
		// tie keeps the persisted record
		assert_eq!(newest(Some(p.clone()), Some(c.clone())), Some(p.clone()));
		assert_eq!(newest(Some(p.clone()), None), Some(p.clone()));
		assert_eq!(newest(None, Some(c.clone())), Some(c.clone()));
		assert_eq!(newest(None, None), None);

		let mut raw = c.clone();
		raw.granted_at = Some(ConsentTime::Raw("not-a-date".into()));
		assert_eq!(newest(Some(p.clone()), Some(raw.clone())), Some(p.clone()));

		let mut undated = p.clone();
		undated.granted_at = None;
		assert_eq!(newest(Some(undated), Some(c.clone())), Some(c));
	}

	#[tokio::test]
	async fn test_cache_copies_into_faster_tiers() {
		let (storage, sessions, _) = storage();
		let rec = record("v1", 100);
		let mut ctx = ConsentCtx::new().with_session("s1");

		storage.cache(&mut ctx, &rec, Tier::Persistent, StoreOpts::default()).await;
		assert_eq!(ctx.record, Some(rec.clone()));
		assert_eq!(session_record(&sessions, "s1").await, Some(rec.clone()));
		assert_eq!(storage.read_cookie(&ctx).unwrap(), Some(rec));
	}

	#[tokio::test]
	async fn test_cache_cookie_hit_leaves_cookie() {
		let (storage, sessions, _) = storage();
		let rec = record("v1", 100);
		let mut ctx = ConsentCtx::new().with_session("s1").with_cookie(signed(&rec));

		storage.cache(&mut ctx, &rec, Tier::Cookie, StoreOpts::default()).await;
		assert_eq!(ctx.cookie_change, None);
		assert_eq!(session_record(&sessions, "s1").await, Some(rec));
	}

	#[tokio::test]
	async fn test_cache_respects_skip_session() {
		let (storage, sessions, _) = storage();
		let rec = record("v1", 100);
		let mut ctx = ConsentCtx::new().with_session("s1");

		storage.cache(&mut ctx, &rec, Tier::Cookie, StoreOpts::skip_session_cache()).await;
		assert_eq!(ctx.record, Some(rec));
		assert_eq!(session_record(&sessions, "s1").await, None);
	}
}

// vim: ts=4
