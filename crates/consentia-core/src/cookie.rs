//! Signed consent cookie
//!
//! Cookie value: `base64url(payload) "." base64url(HMAC-SHA256(secret, payload))`.
//! The payload is the codec JSON, so client script can still read the
//! categories after base64url-decoding the first segment.

use axum::http::{HeaderMap, HeaderValue, header};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::opts::ConsentOpts;
use crate::prelude::*;
use consentia_types::types::SECS_PER_DAY;

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &[u8]) -> ClResult<HmacSha256> {
	HmacSha256::new_from_slice(secret).map_err(|_| Error::Internal("invalid cookie secret".into()))
}

/// Signs a codec payload into a cookie value
pub fn sign(secret: &[u8], payload: &str) -> ClResult<String> {
	let mut mac = mac(secret)?;
	mac.update(payload.as_bytes());
	let sig = mac.finalize().into_bytes();

	Ok(format!("{}.{}", URL_SAFE_NO_PAD.encode(payload), URL_SAFE_NO_PAD.encode(sig)))
}

/// Verifies a cookie value and returns the codec payload
pub fn verify(secret: &[u8], value: &str) -> ClResult<String> {
	let (payload, sig) = value.split_once('.').ok_or(Error::InvalidSignature)?;
	let payload = URL_SAFE_NO_PAD.decode(payload).map_err(|_| Error::InvalidSignature)?;
	let sig = URL_SAFE_NO_PAD.decode(sig).map_err(|_| Error::InvalidSignature)?;

	let mut mac = mac(secret)?;
	mac.update(&payload);
	mac.verify_slice(&sig).map_err(|_| Error::InvalidSignature)?;

	String::from_utf8(payload).map_err(|_| Error::InvalidFormat)
}

/// Finds a cookie by name in the request `Cookie` headers
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<Box<str>> {
	headers
		.get_all(header::COOKIE)
		.iter()
		.filter_map(|h| h.to_str().ok())
		.flat_map(|h| h.split(';'))
		.filter_map(|pair| pair.trim().split_once('='))
		.find(|(key, _)| *key == name)
		.map(|(_, value)| value.trim_matches('"').into())
}

/// Builds the `Set-Cookie` header storing `value`
pub fn set_cookie_header(opts: &ConsentOpts, value: &str) -> ClResult<HeaderValue> {
	let max_age = opts.lifetime_days.saturating_mul(SECS_PER_DAY);
	header_value(&build(opts, value, max_age))
}

/// Builds the `Set-Cookie` header removing the consent cookie
pub fn remove_cookie_header(opts: &ConsentOpts) -> ClResult<HeaderValue> {
	header_value(&build(opts, "", 0))
}

fn build(opts: &ConsentOpts, value: &str, max_age: i64) -> String {
	let mut cookie = format!("{}={}; Path={}; Max-Age={}", opts.cookie_name, value, opts.cookie_path, max_age);
	if let Some(domain) = &opts.cookie_domain {
		cookie.push_str("; Domain=");
		cookie.push_str(domain);
	}
	cookie.push_str("; SameSite=");
	cookie.push_str(opts.same_site.as_str());
	if opts.secure {
		cookie.push_str("; Secure");
	}
	if opts.http_only {
		cookie.push_str("; HttpOnly");
	}
	cookie
}

fn header_value(cookie: &str) -> ClResult<HeaderValue> {
	HeaderValue::from_str(cookie).map_err(|_| Error::Internal("invalid Set-Cookie header".into()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::opts::SameSite;

	const SECRET: &[u8] = b"test-secret";

	#[test]
	fn test_sign_and_verify() {
		let value = sign(SECRET, r#"{"terms":"v1"}"#).unwrap();
		assert_eq!(verify(SECRET, &value).unwrap(), r#"{"terms":"v1"}"#);
	}

	#[test]
	fn test_tampered_value_is_rejected() {
		let value = sign(SECRET, r#"{"terms":"v1"}"#).unwrap();
		let (_, sig) = value.split_once('.').unwrap();
		let forged = format!("{}.{}", URL_SAFE_NO_PAD.encode(r#"{"terms":"v2"}"#), sig);

		assert!(matches!(verify(SECRET, &forged), Err(Error::InvalidSignature)));
		assert!(matches!(verify(b"other-secret", &value), Err(Error::InvalidSignature)));
		assert!(matches!(verify(SECRET, "no-dot"), Err(Error::InvalidSignature)));
	}

	#[test]
	fn test_read_cookie() {
		let mut headers = HeaderMap::new();
		headers.insert(header::COOKIE, HeaderValue::from_static("a=1; cookie_consent=abc.def; b=2"));
		assert_eq!(read_cookie(&headers, "cookie_consent").as_deref(), Some("abc.def"));
		assert_eq!(read_cookie(&headers, "missing"), None);
	}

	#[test]
	fn test_set_cookie_attributes() {
		let opts = ConsentOpts::new(SECRET);
		let header = set_cookie_header(&opts, "abc.def").unwrap();
		assert_eq!(
			header.to_str().unwrap(),
			"cookie_consent=abc.def; Path=/; Max-Age=31536000; SameSite=Lax; Secure"
		);
	}

	#[test]
	fn test_remove_cookie_with_custom_opts() {
		let mut opts = ConsentOpts::new(SECRET);
		opts.cookie_name("consent")
			.cookie_domain("example.com")
			.same_site(SameSite::Strict)
			.secure(false)
			.http_only(true);
		let header = remove_cookie_header(&opts).unwrap();
		assert_eq!(
			header.to_str().unwrap(),
			"consent=; Path=/; Max-Age=0; Domain=example.com; SameSite=Strict; HttpOnly"
		);
	}
}

// vim: ts=4
