//! Consent endpoints of the demo host

use axum::{
	Extension, Json,
	extract::State,
	http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use consentia_core::{
	ConsentHandle, ConsentStatus, StoreOpts,
	prelude::*,
	record::ConsentGroup,
	session_adapter::SessionAdapter,
	types::serialize_timestamp_iso,
};

use crate::app::App;
use crate::session::{SessionCookie, USER_KEY};

/// A consent record in its wire shape
#[skip_serializing_none]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordView {
	pub terms: Box<str>,
	pub groups: Vec<Box<str>>,
	pub consented_at: Option<String>,
	pub expires_at: Option<String>,
}

impl From<&ConsentRecord> for RecordView {
	fn from(record: &ConsentRecord) -> Self {
		RecordView {
			terms: record.policy_version.clone(),
			groups: record.accepted_categories.iter().cloned().collect(),
			consented_at: record.granted_at.as_ref().map(ConsentTime::to_wire),
			expires_at: record.expires_at.as_ref().map(ConsentTime::to_wire),
		}
	}
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentView {
	pub show_prompt: bool,
	pub current_terms: Box<str>,
	pub record: Option<RecordView>,
	pub groups: Vec<ConsentGroup>,
}

/// GET /consent
pub async fn get_consent(State(app): State<App>, status: ConsentStatus) -> Json<ConsentView> {
	Json(ConsentView {
		show_prompt: status.show_prompt(),
		current_terms: app.terms.clone(),
		record: status.record.as_ref().map(RecordView::from),
		groups: app.storage.opts().groups.clone(),
	})
}

#[derive(Debug, Deserialize)]
pub struct GrantReq {
	pub terms: Option<String>,
	#[serde(default)]
	pub groups: Vec<String>,
}

/// PUT /consent
///
/// Required catalog groups are always part of the grant.
pub async fn put_consent(
	State(app): State<App>,
	handle: ConsentHandle,
	Json(req): Json<GrantReq>,
) -> ClResult<Json<RecordView>> {
	let terms = req.terms.as_deref().unwrap_or(&app.terms);
	if terms.trim().is_empty() {
		return Err(Error::InvalidRecord);
	}

	let required: Vec<Box<str>> = app.storage.opts().required_groups().map(Into::into).collect();
	let groups = req.groups.into_iter().map(String::into_boxed_str).chain(required);

	let record = handle.grant(&app.storage, terms, groups, StoreOpts::default()).await;
	Ok(Json(RecordView::from(&record)))
}

/// DELETE /consent
pub async fn delete_consent(State(app): State<App>, handle: ConsentHandle) -> StatusCode {
	handle.withdraw(&app.storage).await;
	StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
pub struct LoginReq {
	pub user: String,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRes {
	pub user: Box<str>,
	pub show_prompt: bool,
	pub record: Option<RecordView>,
}

/// POST /login
///
/// Stands in for a real login: the user name becomes the identity key and
/// the consent of the visitor and the identity are reconciled.
pub async fn post_login(
	State(app): State<App>,
	Extension(SessionCookie(session_id)): Extension<SessionCookie>,
	handle: ConsentHandle,
	Json(req): Json<LoginReq>,
) -> ClResult<Json<LoginRes>> {
	let user = req.user.trim();
	if user.is_empty() {
		return Err(Error::PermissionDenied);
	}
	app.sessions.write(&session_id, USER_KEY, user).await?;

	let record = handle.sync_identity(&app.storage, user, StoreOpts::default()).await;
	let status = ConsentStatus::from_record(record);
	Ok(Json(LoginRes {
		user: user.into(),
		show_prompt: status.show_prompt(),
		record: status.record.as_ref().map(RecordView::from),
	}))
}

/// POST /logout
pub async fn post_logout(
	State(app): State<App>,
	Extension(SessionCookie(session_id)): Extension<SessionCookie>,
) -> StatusCode {
	app.sessions.drop_session(&session_id);
	StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryView {
	pub consent_id: i64,
	pub record: RecordView,
	#[serde(serialize_with = "serialize_timestamp_iso")]
	pub created_at: Timestamp,
}

/// GET /consent/history
pub async fn get_history(State(app): State<App>, handle: ConsentHandle) -> ClResult<Json<Vec<HistoryEntryView>>> {
	let Some(identity) = handle.lock().await.identity.clone() else {
		return Err(Error::PermissionDenied);
	};

	let history = app.consents.list_history(&identity).await?;
	Ok(Json(
		history
			.iter()
			.map(|entry| HistoryEntryView {
				consent_id: entry.consent_id,
				record: RecordView::from(&entry.record),
				created_at: entry.created_at,
			})
			.collect(),
	))
}

/// GET /analytics/pixel, only served with analytics consent
pub async fn get_pixel() -> &'static str {
	"tracked"
}

// vim: ts=4
