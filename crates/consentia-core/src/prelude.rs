pub use consentia_types::error::{ClResult, Error};
pub use consentia_types::record::{ConsentRecord, ConsentTime};
pub use consentia_types::types::{Timestamp, now};

pub use tracing::{debug, debug_span, error, error_span, info, info_span, warn, warn_span};

// vim: ts=4
