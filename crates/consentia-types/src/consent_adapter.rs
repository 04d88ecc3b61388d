//! Adapter that persists consent records for identified visitors (tier 4).
//!
//! The persistent store keeps the audit trail: records are only ever added,
//! never removed by withdrawal.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::prelude::*;
use crate::record::ConsentRecord;

/// A `Consentia` persistent consent adapter
///
/// Every persistent store implements this trait. A store that has nothing
/// for an identity answers `Ok(None)`; errors are reserved for I/O failures,
/// which the resolver treats as "tier unavailable for this call".
#[async_trait]
pub trait ConsentAdapter: Debug + Send + Sync {
	/// Loads the current record of an identified visitor
	async fn load_by_identity(&self, identity: &str) -> ClResult<Option<ConsentRecord>>;

	/// Stores a record for an identified visitor
	async fn save(&self, identity: &str, record: &ConsentRecord) -> ClResult<()>;
}

/// Null-object store used when no persistent tier is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NullConsentAdapter;

#[async_trait]
impl ConsentAdapter for NullConsentAdapter {
	async fn load_by_identity(&self, _identity: &str) -> ClResult<Option<ConsentRecord>> {
		Ok(None)
	}

	async fn save(&self, _identity: &str, _record: &ConsentRecord) -> ClResult<()> {
		Ok(())
	}
}


// vim: ts=4
