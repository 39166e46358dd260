//! Platform environment switch and the endpoint set derived from it.
//!
//! `environment` selects the QA or production base domains. `endpoints` holds the validated
//! URLs the broker talks to (token, identity, authorize) and lets tests and proxies point the
//! broker elsewhere.

pub mod endpoints;
pub mod environment;

pub use endpoints::*;
pub use environment::*;
