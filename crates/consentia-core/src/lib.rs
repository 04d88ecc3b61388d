//! Consent resolution for axum services.
//!
//! A visitor's consent record lives in up to four places: the current
//! request, the server-side session, a signed cookie and, for identified
//! visitors, a persistent store. [`storage::ConsentStorage`] reads them in
//! that order and keeps them consistent; [`middleware::consent_middleware`]
//! runs it for every request.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod context;
pub mod cookie;
pub mod extract;
pub mod middleware;
pub mod opts;
pub mod prelude;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use context::{ConsentCtx, CookieChange, Tier};
pub use extract::{ConsentHandle, ConsentStatus, Identity, SessionId};
pub use middleware::{consent_middleware, require_consent};
pub use opts::{ConsentOpts, SameSite};
pub use session::MemorySessionStore;
pub use storage::{ConsentStorage, StoreOpts};

pub use consentia_types::{consent_adapter, policy, record, session_adapter, types};

// vim: ts=4
