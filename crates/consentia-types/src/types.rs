//! Common types used throughout Consentia.

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

pub const SECS_PER_DAY: i64 = 86_400;

// Timestamp //
//***********//
/// UTC instant with second precision, stored as seconds since the Unix epoch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

impl Timestamp {
	pub fn add_seconds(&self, secs: i64) -> Timestamp {
		Timestamp(self.0.saturating_add(secs))
	}

	pub fn add_days(&self, days: i64) -> Timestamp {
		self.add_seconds(days.saturating_mul(SECS_PER_DAY))
	}

	/// RFC 3339 rendering in UTC, e.g. `2024-01-01T00:00:00Z`
	pub fn to_iso_string(&self) -> String {
		match DateTime::from_timestamp(self.0, 0) {
			Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
			None => self.0.to_string(),
		}
	}

	/// Parses RFC 3339 / ISO-8601 text, truncating to whole seconds
	pub fn parse_iso(s: &str) -> Option<Timestamp> {
		DateTime::parse_from_rfc3339(s.trim()).ok().map(|dt| Timestamp(dt.timestamp()))
	}
}

impl std::fmt::Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl Serialize for Timestamp {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_i64(self.0)
	}
}

impl<'de> Deserialize<'de> for Timestamp {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		Ok(Timestamp(i64::deserialize(deserializer)?))
	}
}

pub fn now() -> Timestamp {
	let res = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
	Timestamp(i64::try_from(res.as_secs()).unwrap_or(i64::MAX))
}

pub fn serialize_timestamp_iso<S>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error>
where
	S: serde::Serializer,
{
	serializer.serialize_str(&ts.to_iso_string())
}


// vim: ts=4
