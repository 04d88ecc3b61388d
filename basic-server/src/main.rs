use std::{env, path, sync::Arc};

use consentia_consent_adapter_sqlite::ConsentAdapterSqlite;
use consentia_core::{
	ConsentOpts, ConsentStorage, MemorySessionStore,
	prelude::*,
	record::{ConsentGroup, MAX_LIFETIME_DAYS},
};

mod app;
mod handler;
mod session;

pub struct Config {
	pub listen: Box<str>,
	pub db_dir: path::PathBuf,
	pub terms: Box<str>,
	pub opts: ConsentOpts,
}

fn env_flag(name: &str, default: bool) -> bool {
	match env::var(name) {
		Ok(v) => matches!(v.as_str(), "1" | "true" | "yes" | "on"),
		Err(_) => default,
	}
}

fn default_groups() -> [ConsentGroup; 3] {
	[
		ConsentGroup {
			id: "essential".into(),
			title: "Essential".into(),
			description: Some("Required for the site to work".into()),
			required: true,
		},
		ConsentGroup {
			id: "analytics".into(),
			title: "Analytics".into(),
			description: Some("Anonymous usage statistics".into()),
			required: false,
		},
		ConsentGroup {
			id: "marketing".into(),
			title: "Marketing".into(),
			description: None,
			required: false,
		},
	]
}

fn config_from_env() -> Config {
	let secret = env::var("CONSENT_SECRET").unwrap_or_else(|_| {
		warn!("CONSENT_SECRET not set, using a random key: consent cookies will not survive a restart");
		uuid::Uuid::new_v4().to_string()
	});

	let mut opts = ConsentOpts::new(secret);
	opts.secure(env_flag("CONSENT_SECURE", true));
	if let Ok(cookie_name) = env::var("CONSENT_COOKIE") {
		opts.cookie_name(cookie_name);
	}
	if let Ok(domain) = env::var("CONSENT_DOMAIN") {
		opts.cookie_domain(domain);
	}
	if let Ok(days) = env::var("CONSENT_LIFETIME_DAYS") {
		match days.parse::<i64>() {
			Ok(days) if (1..=MAX_LIFETIME_DAYS).contains(&days) => {
				opts.lifetime_days(days);
			}
			_ => warn!(
				"CONSENT_LIFETIME_DAYS={} is not in 1..={}, using {}",
				days, MAX_LIFETIME_DAYS, opts.lifetime_days
			),
		}
	}
	for group in default_groups() {
		opts.group(group);
	}

	Config {
		listen: env::var("LISTEN").unwrap_or("127.0.0.1:8080".to_string()).into(),
		db_dir: path::PathBuf::from(env::var("DB_DIR").unwrap_or("./data".to_string())),
		terms: env::var("CONSENT_TERMS").unwrap_or("v1".to_string()).into(),
		opts,
	}
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ClResult<()> {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_target(false)
		.init();

	let config = config_from_env();
	info!("consent config: {:?}", config.opts);

	let consents = Arc::new(ConsentAdapterSqlite::new(&config.db_dir).await?);
	let sessions = Arc::new(MemorySessionStore::new());
	let storage = ConsentStorage::new(config.opts, sessions.clone()).with_consent_adapter(consents.clone());

	let app = Arc::new(app::AppState { storage, sessions, consents, terms: config.terms });

	let listener = tokio::net::TcpListener::bind(config.listen.as_ref()).await?;
	info!("listening on {}", config.listen);
	axum::serve(listener, app::router(app)).await?;

	Ok(())
}

// vim: ts=4
