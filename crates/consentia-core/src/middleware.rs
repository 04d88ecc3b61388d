//! Consent middlewares

use axum::{
	body::Body,
	extract::{Request, State},
	http::{Response, header},
	middleware::Next,
};

use crate::context::{ConsentCtx, CookieChange};
use crate::cookie;
use crate::extract::{ConsentHandle, ConsentStatus, Identity, SessionId};
use crate::prelude::*;
use crate::storage::{ConsentStorage, StoreOpts};

/// Resolves the visitor's consent for every request.
///
/// Builds the request context from the consent cookie and the host's
/// `SessionId` / `Identity` extensions, reads the tiers, caches a hit into
/// the faster tiers and exposes the context as [`ConsentHandle`]. Pending
/// cookie changes are written to the response as `Set-Cookie`.
pub async fn consent_middleware(
	State(storage): State<ConsentStorage>,
	mut req: Request,
	next: Next,
) -> Response<Body> {
	let opts = storage.opts();
	let mut ctx = ConsentCtx {
		cookie: cookie::read_cookie(req.headers(), &opts.cookie_name),
		session_id: req.extensions().get::<SessionId>().map(|s| s.0.clone()),
		identity: req.extensions().get::<Identity>().map(|i| i.0.clone()),
		..Default::default()
	};

	if let Some((record, source)) = storage.read_with_source(&ctx).await {
		debug!("consent resolved from {:?} tier: terms={}", source, record.policy_version);
		let store_opts = StoreOpts { skip_session_cache: !opts.session_cache, ..Default::default() };
		storage.cache(&mut ctx, &record, source, store_opts).await;
	}

	let handle = ConsentHandle::new(ctx);
	req.extensions_mut().insert(handle.clone());

	let mut res = next.run(req).await;

	let change = handle.lock().await.cookie_change.clone();
	let header = match change {
		Some(CookieChange::Set(value)) => cookie::set_cookie_header(opts, &value),
		Some(CookieChange::Remove) => cookie::remove_cookie_header(opts),
		None => return res,
	};
	match header {
		Ok(header) => {
			res.headers_mut().append(header::SET_COOKIE, header);
		}
		Err(err) => warn!("consent cookie not sent: {}", err),
	}
	res
}

/// Category a route requires, used as state of [`require_consent`]
#[derive(Clone, Debug)]
pub struct RequiredCategory(pub Box<str>);

/// Rejects the request with `Error::ConsentRequired` unless the visitor has
/// effective consent covering the category. Must run inside
/// [`consent_middleware`].
pub async fn require_consent(
	State(category): State<RequiredCategory>,
	status: ConsentStatus,
	req: Request,
	next: Next,
) -> ClResult<Response<Body>> {
	if !status.allows(&category.0) {
		debug!("consent required for {}", category.0);
		return Err(Error::ConsentRequired(category.0));
	}
	Ok(next.run(req).await)
}


// vim: ts=4
