//! The consent record and its timestamps.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::BTreeSet;

use crate::policy;
use crate::types::Timestamp;

/// Default consent lifetime in days
pub const DEFAULT_LIFETIME_DAYS: i64 = 365;
/// Upper bound of a consent lifetime, keeps expiry dates renderable
pub const MAX_LIFETIME_DAYS: i64 = 36_500;

// ConsentTime //
//*************//
/// A timestamp field of a consent record.
///
/// Decoding is tolerant: a field that does not parse is kept verbatim as
/// `Raw` so the rest of the record stays usable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsentTime {
	At(Timestamp),
	Raw(Box<str>),
}

impl ConsentTime {
	pub fn parse(s: &str) -> ConsentTime {
		match Timestamp::parse_iso(s) {
			Some(ts) => ConsentTime::At(ts),
			None => ConsentTime::Raw(s.into()),
		}
	}

	pub fn timestamp(&self) -> Option<Timestamp> {
		match self {
			ConsentTime::At(ts) => Some(*ts),
			ConsentTime::Raw(_) => None,
		}
	}

	pub fn to_wire(&self) -> String {
		match self {
			ConsentTime::At(ts) => ts.to_iso_string(),
			ConsentTime::Raw(raw) => raw.to_string(),
		}
	}
}

impl From<Timestamp> for ConsentTime {
	fn from(ts: Timestamp) -> Self {
		ConsentTime::At(ts)
	}
}

// ConsentRecord //
//***************//
/// One consent decision: which policy version, which categories, and when.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsentRecord {
	pub policy_version: Box<str>,
	pub accepted_categories: BTreeSet<Box<str>>,
	pub granted_at: Option<ConsentTime>,
	pub expires_at: Option<ConsentTime>,
}

impl ConsentRecord {
	/// Creates a record granted at `now`, expiring `lifetime_days` later.
	/// Lifetimes above [`MAX_LIFETIME_DAYS`] are capped.
	///
	/// This is the only place new grant timestamps come from.
	pub fn grant<I, S>(
		policy_version: &str,
		categories: I,
		now: Timestamp,
		lifetime_days: i64,
	) -> ConsentRecord
	where
		I: IntoIterator<Item = S>,
		S: Into<Box<str>>,
	{
		ConsentRecord {
			policy_version: policy_version.into(),
			accepted_categories: categories.into_iter().map(Into::into).collect(),
			granted_at: Some(ConsentTime::At(now)),
			expires_at: Some(ConsentTime::At(now.add_days(lifetime_days.min(MAX_LIFETIME_DAYS)))),
		}
	}

	/// A record with an empty policy version is not a record at all
	pub fn is_well_formed(&self) -> bool {
		!self.policy_version.trim().is_empty()
	}

	pub fn granted_timestamp(&self) -> Option<Timestamp> {
		self.granted_at.as_ref().and_then(ConsentTime::timestamp)
	}

	pub fn expires_timestamp(&self) -> Option<Timestamp> {
		self.expires_at.as_ref().and_then(ConsentTime::timestamp)
	}

	pub fn has_category(&self, category: &str) -> bool {
		self.accepted_categories.contains(category)
	}

	/// Whether `category` is covered by effective consent at `now`
	pub fn allows(&self, category: &str, now: Timestamp) -> bool {
		policy::is_effective_consent_at(Some(self), now) && self.has_category(category)
	}
}

// ConsentGroup //
//**************//
/// Entry of the category catalog a host presents to its visitors.
///
/// The resolver never validates categories against the catalog.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentGroup {
	pub id: Box<str>,
	pub title: Box<str>,
	pub description: Option<Box<str>>,
	#[serde(default)]
	pub required: bool,
}


// vim: ts=4
