//! Validity and expiry policy.
//!
//! `is_effective_consent` is the single answer to "do we need to ask again?".
//! Every consumer (prompt visibility, category gates, login sync) goes
//! through it instead of checking categories or expiry on its own.

use crate::record::ConsentRecord;
use crate::types::{Timestamp, now};

/// Effective consent at `now`: present, with categories, and not expired.
///
/// A missing or unparsable `expires_at` is not effective; an ambiguous
/// record resolves toward prompting again.
pub fn is_effective_consent_at(record: Option<&ConsentRecord>, now: Timestamp) -> bool {
	let Some(record) = record else {
		return false;
	};
	if record.accepted_categories.is_empty() {
		return false;
	}
	match record.expires_timestamp() {
		Some(expires_at) => expires_at >= now,
		None => false,
	}
}

/// `is_effective_consent_at` against the current clock
pub fn is_effective_consent(record: Option<&ConsentRecord>) -> bool {
	is_effective_consent_at(record, now())
}


// vim: ts=4
