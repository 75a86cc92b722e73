//! Error classification, sanitizing and retry with exponential backoff.
//!
//! Every driver call an adapter makes goes through [`RetryPolicy::run`]:
//! transient failures are retried with jittered backoff, fatal ones fail
//! immediately, and whatever escapes is classified and sanitized first.

mod classify;
mod policy;
mod sanitize;

pub use classify::{classify, ErrorClass, TRANSIENT_CODES, TRANSIENT_VOCABULARY};
pub use policy::{RetryPolicy, Sleeper};
pub use sanitize::{sanitize, SanitizedError, MAX_TRACE_FRAMES};
