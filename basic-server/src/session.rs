//! Minimal session layer of the demo host
//!
//! Hands out an opaque `sid` cookie. Only a client that sends it back gets
//! a [`SessionId`], so clients that drop cookies never allocate sessions. A
//! visitor who logged in has a `user` key in the session, which becomes the
//! request's [`Identity`].

use axum::{
	body::Body,
	extract::{Request, State},
	http::{HeaderValue, Response, header},
	middleware::Next,
};

use consentia_core::{Identity, SessionId, cookie, prelude::*, session_adapter::SessionAdapter};

use crate::app::App;

pub const SESSION_COOKIE: &str = "sid";
pub const USER_KEY: &str = "user";

/// The `sid` of the request, including one issued by this response. Handlers
/// that have to create the session (login) use it.
#[derive(Clone, Debug)]
pub struct SessionCookie(pub Box<str>);

pub async fn session_layer(State(app): State<App>, mut req: Request, next: Next) -> Response<Body> {
	let (session_id, fresh) = match cookie::read_cookie(req.headers(), SESSION_COOKIE) {
		Some(session_id) => (session_id, false),
		None => (uuid::Uuid::new_v4().to_string().into_boxed_str(), true),
	};

	if !fresh {
		match app.sessions.read(&session_id, USER_KEY).await {
			Ok(Some(user)) => {
				req.extensions_mut().insert(Identity(user));
			}
			Ok(None) => (),
			Err(err) => warn!("session read failed: {}", err),
		}
		req.extensions_mut().insert(SessionId(session_id.clone()));
	}
	req.extensions_mut().insert(SessionCookie(session_id.clone()));

	let mut res = next.run(req).await;

	if fresh {
		let value = format!("{}={}; Path=/; SameSite=Lax; HttpOnly", SESSION_COOKIE, session_id);
		match HeaderValue::from_str(&value) {
			Ok(value) => {
				res.headers_mut().append(header::SET_COOKIE, value);
			}
			Err(err) => warn!("session cookie not sent: {}", err),
		}
	}
	res
}

// vim: ts=4
