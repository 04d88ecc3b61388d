//! Application state and routes

use axum::{
	Router, middleware,
	routing::{get, post},
};
use std::sync::Arc;

use consentia_consent_adapter_sqlite::ConsentAdapterSqlite;
use consentia_core::{
	ConsentStorage, MemorySessionStore, consent_middleware, middleware::RequiredCategory, require_consent,
};

use crate::{handler, session};

pub struct AppState {
	pub storage: ConsentStorage,
	pub sessions: Arc<MemorySessionStore>,
	pub consents: Arc<ConsentAdapterSqlite>,
	/// Policy version granted when the visitor does not name one
	pub terms: Box<str>,
}

pub type App = Arc<AppState>;

pub fn router(app: App) -> Router {
	let gated: Router<App> = Router::new()
		.route("/analytics/pixel", get(handler::get_pixel))
		.layer(middleware::from_fn_with_state(RequiredCategory("analytics".into()), require_consent));

	Router::new()
		.route(
			"/consent",
			get(handler::get_consent).put(handler::put_consent).delete(handler::delete_consent),
		)
		.route("/consent/history", get(handler::get_history))
		.route("/login", post(handler::post_login))
		.route("/logout", post(handler::post_logout))
		.merge(gated)
		// consent resolution needs the session, so the session layer wraps it
		.layer(middleware::from_fn_with_state(app.storage.clone(), consent_middleware))
		.layer(middleware::from_fn_with_state(app.clone(), session::session_layer))
		.with_state(app)
}


// vim: ts=4
