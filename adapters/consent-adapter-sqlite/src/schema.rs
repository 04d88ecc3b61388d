//! Database schema initialization

use sqlx::SqlitePool;

/// Initialize the database schema with all required tables and indexes
pub(crate) async fn init_db(db: &SqlitePool) -> Result<(), sqlx::Error> {
	let mut tx = db.begin().await?;

	// Consents
	//**********
	// Append-only: rows are never updated or deleted, the latest row per
	// identity is the current record.
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS consents (
		consent_id integer NOT NULL,
		identity text NOT NULL,
		terms text NOT NULL,
		groups json NOT NULL,
		consented_at text,
		expires_at text,
		created_at datetime DEFAULT (unixepoch()),
		PRIMARY KEY(consent_id AUTOINCREMENT)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_consents_identity ON consents(identity, consent_id)")
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;
	Ok(())
}

// vim: ts=4
