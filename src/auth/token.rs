//! Stored credential records and the secret wrapper that keeps them out of logs.

pub mod credential;
pub mod secret;
