//! Extractors for consent state

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use consentia_types::policy::is_effective_consent;

use crate::context::ConsentCtx;
use crate::prelude::*;
use crate::storage::{ConsentStorage, StoreOpts};

// SessionId //
//***********//
/// Session identifier, inserted into request extensions by the host's
/// session layer. Without it the session tier is skipped.
#[derive(Clone, Debug)]
pub struct SessionId(pub Box<str>);

// Identity //
//**********//
/// Identity key of an authenticated visitor, inserted into request
/// extensions by the host's auth layer. Without it the persistent tier is
/// skipped.
#[derive(Clone, Debug)]
pub struct Identity(pub Box<str>);

// ConsentHandle //
//***************//
/// The request's consent context, shared between the consent middleware and
/// the handlers.
#[derive(Clone, Debug)]
pub struct ConsentHandle(Arc<Mutex<ConsentCtx>>);

impl ConsentHandle {
	pub fn new(ctx: ConsentCtx) -> Self {
		ConsentHandle(Arc::new(Mutex::new(ctx)))
	}

	pub async fn lock(&self) -> MutexGuard<'_, ConsentCtx> {
		self.0.lock().await
	}

	/// The record resolved for this request, if any
	pub async fn record(&self) -> Option<ConsentRecord> {
		self.0.lock().await.record.clone()
	}

	pub async fn grant<I, S>(
		&self,
		storage: &ConsentStorage,
		policy_version: &str,
		categories: I,
		opts: StoreOpts,
	) -> ConsentRecord
	where
		I: IntoIterator<Item = S>,
		S: Into<Box<str>>,
	{
		let mut ctx = self.0.lock().await;
		storage.grant(&mut ctx, policy_version, categories, opts).await
	}

	pub async fn withdraw(&self, storage: &ConsentStorage) {
		let mut ctx = self.0.lock().await;
		storage.delete(&mut ctx).await;
	}

	pub async fn sync_identity(
		&self,
		storage: &ConsentStorage,
		identity: &str,
		opts: StoreOpts,
	) -> Option<ConsentRecord> {
		let mut ctx = self.0.lock().await;
		storage.sync_on_identity_established(&mut ctx, identity, opts).await
	}
}

impl<S> FromRequestParts<S> for ConsentHandle
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		parts.extensions.get::<ConsentHandle>().cloned().ok_or_else(|| {
			error!("ConsentHandle requested but consent_middleware is not installed");
			Error::Internal("consent middleware missing".into())
		})
	}
}

// ConsentStatus //
//***************//
/// Snapshot of the request's consent, for rendering decisions
#[derive(Clone, Debug)]
pub struct ConsentStatus {
	pub record: Option<ConsentRecord>,
	pub effective: bool,
}

impl ConsentStatus {
	pub fn from_record(record: Option<ConsentRecord>) -> Self {
		let effective = is_effective_consent(record.as_ref());
		ConsentStatus { record, effective }
	}

	/// Whether the consent prompt has to be shown
	pub fn show_prompt(&self) -> bool {
		!self.effective
	}

	pub fn allows(&self, category: &str) -> bool {
		self.effective && self.record.as_ref().is_some_and(|r| r.has_category(category))
	}
}

impl<S> FromRequestParts<S> for ConsentStatus
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
		let handle = ConsentHandle::from_request_parts(parts, state).await?;
		Ok(ConsentStatus::from_record(handle.record().await))
	}
}


// vim: ts=4
