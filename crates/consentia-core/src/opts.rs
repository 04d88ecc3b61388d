//! Resolver and cookie configuration
//!
//! Passed into [`crate::storage::ConsentStorage`] at construction time; there
//! is no process-wide configuration.

use consentia_types::record::{ConsentGroup, DEFAULT_LIFETIME_DAYS, MAX_LIFETIME_DAYS};

pub const DEFAULT_COOKIE_NAME: &str = "cookie_consent";
pub const DEFAULT_SESSION_KEY: &str = "cookie_consent";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
	Strict,
	Lax,
	None,
}

impl SameSite {
	pub fn as_str(&self) -> &'static str {
		match self {
			SameSite::Strict => "Strict",
			SameSite::Lax => "Lax",
			SameSite::None => "None",
		}
	}
}

#[derive(Clone)]
pub struct ConsentOpts {
	pub cookie_name: Box<str>,
	pub session_key: Box<str>,
	pub cookie_path: Box<str>,
	pub cookie_domain: Option<Box<str>>,
	pub same_site: SameSite,
	pub secure: bool,
	pub http_only: bool,
	/// Consent lifetime, also used as the cookie `Max-Age`
	pub lifetime_days: i64,
	/// Let the middleware cache cookie and persistent hits in the session.
	/// Off when the session is owned by components that must not see it.
	pub session_cache: bool,
	/// HMAC key for signing the consent cookie
	pub secret: Box<[u8]>,
	/// Category catalog shown to visitors. Informational only.
	pub groups: Vec<ConsentGroup>,
}

// The secret stays out of logs
impl std::fmt::Debug for ConsentOpts {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ConsentOpts")
			.field("cookie_name", &self.cookie_name)
			.field("session_key", &self.session_key)
			.field("cookie_path", &self.cookie_path)
			.field("cookie_domain", &self.cookie_domain)
			.field("same_site", &self.same_site)
			.field("secure", &self.secure)
			.field("http_only", &self.http_only)
			.field("lifetime_days", &self.lifetime_days)
			.field("session_cache", &self.session_cache)
			.field("groups", &self.groups)
			.finish_non_exhaustive()
	}
}

impl ConsentOpts {
	pub fn new(secret: impl AsRef<[u8]>) -> Self {
		ConsentOpts {
			cookie_name: DEFAULT_COOKIE_NAME.into(),
			session_key: DEFAULT_SESSION_KEY.into(),
			cookie_path: "/".into(),
			cookie_domain: None,
			same_site: SameSite::Lax,
			secure: true,
			http_only: false,
			lifetime_days: DEFAULT_LIFETIME_DAYS,
			session_cache: true,
			secret: secret.as_ref().into(),
			groups: Vec::new(),
		}
	}

	pub fn cookie_name(&mut self, cookie_name: impl Into<Box<str>>) -> &mut Self {
		self.cookie_name = cookie_name.into();
		self
	}
	pub fn session_key(&mut self, session_key: impl Into<Box<str>>) -> &mut Self {
		self.session_key = session_key.into();
		self
	}
	pub fn cookie_path(&mut self, cookie_path: impl Into<Box<str>>) -> &mut Self {
		self.cookie_path = cookie_path.into();
		self
	}
	pub fn cookie_domain(&mut self, cookie_domain: impl Into<Box<str>>) -> &mut Self {
		self.cookie_domain = Some(cookie_domain.into());
		self
	}
	pub fn same_site(&mut self, same_site: SameSite) -> &mut Self {
		self.same_site = same_site;
		self
	}
	pub fn secure(&mut self, secure: bool) -> &mut Self {
		self.secure = secure;
		self
	}
	pub fn http_only(&mut self, http_only: bool) -> &mut Self {
		self.http_only = http_only;
		self
	}
	/// Clamped to `1..=MAX_LIFETIME_DAYS`
	pub fn lifetime_days(&mut self, lifetime_days: i64) -> &mut Self {
		self.lifetime_days = lifetime_days.clamp(1, MAX_LIFETIME_DAYS);
		self
	}
	pub fn session_cache(&mut self, session_cache: bool) -> &mut Self {
		self.session_cache = session_cache;
		self
	}
	pub fn group(&mut self, group: ConsentGroup) -> &mut Self {
		self.groups.push(group);
		self
	}

	/// Ids of the catalog groups marked as required
	pub fn required_groups(&self) -> impl Iterator<Item = &str> {
		self.groups.iter().filter(|g| g.required).map(|g| g.id.as_ref())
	}
}


// vim: ts=4
