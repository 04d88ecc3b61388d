//! Error type shared by all Consentia crates.
//!
//! Only the codec surfaces these to its callers. The resolver logs them and
//! treats the affected tier as a miss, so a storage or format problem never
//! turns into a failed request.

use axum::{
	Json,
	http::StatusCode,
	response::{IntoResponse, Response},
};

pub type ClResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	NotFound,
	PermissionDenied,
	DbError,

	/// Tried to encode something that is not a well-formed consent record
	InvalidRecord,
	/// Transport text could not be parsed at all
	DecodeError,
	/// Transport value present but of the wrong basic type
	InvalidFormat,
	/// Cookie signature missing or not matching
	InvalidSignature,
	/// Session tier requested but the request carries no session
	SessionUnavailable,
	/// The requested category has no effective consent
	ConsentRequired(Box<str>),
	Internal(String),

	// externals
	Io(std::io::Error),
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		tracing::debug!("JSON: {}", err);
		Self::DecodeError
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Error::ConsentRequired(category) => write!(f, "consent required for {}", category),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Io(err) => write!(f, "I/O error: {}", err),
			_ => write!(f, "{:?}", self),
		}
	}
}

impl std::error::Error for Error {}

impl Error {
	fn code(&self) -> &'static str {
		match self {
			Error::NotFound => "E-NOT-FOUND",
			Error::PermissionDenied => "E-PERMISSION-DENIED",
			Error::InvalidRecord => "E-CONSENT-INVALID-RECORD",
			Error::DecodeError => "E-CONSENT-DECODE",
			Error::InvalidFormat => "E-CONSENT-FORMAT",
			Error::InvalidSignature => "E-CONSENT-SIGNATURE",
			Error::ConsentRequired(_) => "E-CONSENT-REQUIRED",
			Error::DbError
			| Error::SessionUnavailable
			| Error::Internal(_)
			| Error::Io(_) => "E-INTERNAL",
		}
	}
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let status = match &self {
			Error::NotFound => StatusCode::NOT_FOUND,
			Error::PermissionDenied => StatusCode::FORBIDDEN,
			Error::InvalidRecord
			| Error::DecodeError
			| Error::InvalidFormat
			| Error::InvalidSignature => StatusCode::BAD_REQUEST,
			// 451 Unavailable For Legal Reasons
			Error::ConsentRequired(_) => StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		};

		let mut body = serde_json::json!({
			"error": {
				"code": self.code(),
				"message": status.canonical_reason().unwrap_or("error"),
			}
		});
		if let Error::ConsentRequired(category) = &self {
			body["error"]["details"] = serde_json::json!({ "category": category });
		}

		(status, Json(body)).into_response()
	}
}


// vim: ts=4
