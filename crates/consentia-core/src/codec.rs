//! Consent record codec
//!
//! Converts a [`ConsentRecord`] to and from the JSON text carried in the
//! consent cookie and in the session. Wire keys: `terms`, `groups`,
//! `consented_at`, `expires_at`. Timestamps are RFC 3339 in UTC.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::prelude::*;

#[derive(Serialize)]
struct WireRecord<'a> {
	terms: &'a str,
	groups: Vec<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	consented_at: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	expires_at: Option<String>,
}

/// Encodes a record. `None` or a record without a policy version is
/// `Error::InvalidRecord`; callers skip the cookie in that case.
pub fn encode(record: Option<&ConsentRecord>) -> ClResult<String> {
	let record = record.ok_or(Error::InvalidRecord)?;
	if !record.is_well_formed() {
		return Err(Error::InvalidRecord);
	}

	let wire = WireRecord {
		terms: &record.policy_version,
		groups: record.accepted_categories.iter().map(AsRef::as_ref).collect(),
		consented_at: record.granted_at.as_ref().map(ConsentTime::to_wire),
		expires_at: record.expires_at.as_ref().map(ConsentTime::to_wire),
	};
	serde_json::to_string(&wire).map_err(|err| {
		warn!("consent encode failed: {}", err);
		Error::InvalidRecord
	})
}

/// Decodes transport text. Absent or empty input is "no record", not an error.
pub fn decode(input: Option<&str>) -> ClResult<Option<ConsentRecord>> {
	let input = match input {
		None => return Ok(None),
		Some("") => return Ok(None),
		Some(s) => s,
	};

	let value: Value = serde_json::from_str(input)?;
	match value {
		Value::Object(obj) => from_object(&obj).map(Some),
		_ => Err(Error::InvalidFormat),
	}
}

/// Decodes a transport value that may not be text at all.
///
/// `Null` is "no record", a string is decoded as text, anything else is
/// `Error::InvalidFormat`.
pub fn decode_value(value: &Value) -> ClResult<Option<ConsentRecord>> {
	match value {
		Value::Null => Ok(None),
		Value::String(s) => decode(Some(s.as_str())),
		_ => Err(Error::InvalidFormat),
	}
}

fn from_object(obj: &Map<String, Value>) -> ClResult<ConsentRecord> {
	let policy_version = match obj.get("terms").and_then(Value::as_str) {
		Some(terms) if !terms.trim().is_empty() => terms,
		_ => return Err(Error::DecodeError),
	};

	let accepted_categories: BTreeSet<Box<str>> = obj
		.get("groups")
		.and_then(Value::as_array)
		.map(|groups| groups.iter().filter_map(Value::as_str).map(Into::into).collect())
		.unwrap_or_default();

	Ok(ConsentRecord {
		policy_version: policy_version.into(),
		accepted_categories,
		granted_at: time_field(obj, "consented_at"),
		expires_at: time_field(obj, "expires_at"),
	})
}

fn time_field(obj: &Map<String, Value>, key: &str) -> Option<ConsentTime> {
	match obj.get(key)? {
		Value::Null => None,
		Value::String(s) => {
			let time = ConsentTime::parse(s);
			if let ConsentTime::Raw(raw) = &time {
				debug!("consent field {} kept raw: {:?}", key, raw);
			}
			Some(time)
		}
		other => Some(ConsentTime::Raw(other.to_string().into())),
	}
}


// vim: ts=4
