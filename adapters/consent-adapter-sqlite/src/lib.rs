//! SQLite-backed persistent consent store.
//!
//! Every saved record is a new row, so the table doubles as the audit trail
//! of an identity's consent history. Withdrawal never reaches this store.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

mod schema;

use async_trait::async_trait;
use sqlx::{
	Row,
	sqlite::{self, SqlitePool, SqliteRow},
};
use std::path::Path;

use consentia::{
	consent_adapter::ConsentAdapter,
	prelude::*,
	record::{ConsentRecord, ConsentTime},
};

const DB_FILE: &str = "consent.db";

/// One row of an identity's consent history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentHistoryEntry {
	pub consent_id: i64,
	pub record: ConsentRecord,
	pub created_at: Timestamp,
}

fn inspect(err: &sqlx::Error) {
	warn!("DB: {:#?}", err);
}

fn row_to_record(row: &SqliteRow) -> Result<ConsentRecord, sqlx::Error> {
	let terms: String = row.try_get("terms")?;
	let groups: String = row.try_get("groups")?;
	let groups: Vec<String> = serde_json::from_str(&groups).map_err(|err| sqlx::Error::ColumnDecode {
		index: "groups".into(),
		source: Box::new(err),
	})?;
	let consented_at: Option<String> = row.try_get("consented_at")?;
	let expires_at: Option<String> = row.try_get("expires_at")?;

	Ok(ConsentRecord {
		policy_version: terms.into(),
		accepted_categories: groups.into_iter().map(Into::into).collect(),
		granted_at: consented_at.as_deref().map(ConsentTime::parse),
		expires_at: expires_at.as_deref().map(ConsentTime::parse),
	})
}

#[derive(Debug)]
pub struct ConsentAdapterSqlite {
	db: SqlitePool,
}

impl ConsentAdapterSqlite {
	/// Opens (or creates) `consent.db` inside `dir`
	pub async fn new(dir: impl AsRef<Path>) -> ClResult<Self> {
		let dir = dir.as_ref();
		tokio::fs::create_dir_all(dir).await?;

		let opts = sqlite::SqliteConnectOptions::new()
			.filename(dir.join(DB_FILE))
			.create_if_missing(true)
			.journal_mode(sqlite::SqliteJournalMode::Wal);
		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(5)
			.connect_with(opts)
			.await
			.inspect_err(inspect)
			.or(Err(Error::DbError))?;

		schema::init_db(&db).await.inspect_err(inspect).or(Err(Error::DbError))?;

		Ok(Self { db })
	}

	/// Full consent history of an identity, oldest first
	pub async fn list_history(&self, identity: &str) -> ClResult<Vec<ConsentHistoryEntry>> {
		let rows = sqlx::query(
			"SELECT consent_id, terms, groups, consented_at, expires_at, created_at
			FROM consents WHERE identity = ? ORDER BY consent_id",
		)
		.bind(identity)
		.fetch_all(&self.db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

		rows.iter()
			.map(|row| {
				Ok(ConsentHistoryEntry {
					consent_id: row.try_get("consent_id")?,
					record: row_to_record(row)?,
					created_at: Timestamp(row.try_get("created_at")?),
				})
			})
			.collect::<Result<Vec<_>, sqlx::Error>>()
			.inspect_err(inspect)
			.map_err(|_| Error::DbError)
	}
}

#[async_trait]
impl ConsentAdapter for ConsentAdapterSqlite {
	async fn load_by_identity(&self, identity: &str) -> ClResult<Option<ConsentRecord>> {
		let row = sqlx::query(
			"SELECT terms, groups, consented_at, expires_at
			FROM consents WHERE identity = ? ORDER BY consent_id DESC LIMIT 1",
		)
		.bind(identity)
		.fetch_optional(&self.db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

		match row {
			Some(row) => row_to_record(&row).map(Some).inspect_err(inspect).map_err(|_| Error::DbError),
			None => Ok(None),
		}
	}

	async fn save(&self, identity: &str, record: &ConsentRecord) -> ClResult<()> {
		if !record.is_well_formed() {
			return Err(Error::InvalidRecord);
		}

		// Re-saving the current record (e.g. on login sync) adds no history
		if self.load_by_identity(identity).await?.as_ref() == Some(record) {
			debug!("consent for {} unchanged, not stored", identity);
			return Ok(());
		}

		let groups: Vec<&str> = record.accepted_categories.iter().map(AsRef::as_ref).collect();
		let groups = serde_json::to_string(&groups).map_err(|_| Error::InvalidRecord)?;

		sqlx::query(
			"INSERT INTO consents (identity, terms, groups, consented_at, expires_at)
			VALUES (?, ?, ?, ?, ?)",
		)
		.bind(identity)
		.bind(record.policy_version.as_ref())
		.bind(groups)
		.bind(record.granted_at.as_ref().map(ConsentTime::to_wire))
		.bind(record.expires_at.as_ref().map(ConsentTime::to_wire))
		.execute(&self.db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

		Ok(())
	}
}

// vim: ts=4
