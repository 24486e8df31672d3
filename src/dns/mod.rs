//! Zone consistency and live-observability core
//!
//! # Module Structure
//!
//! * `protocol` - record types, the generic content codec, and the
//!   serializable packet representation used by the request log
//! * `validation` - namespace-ownership checks for names under the apex
//! * `serial` - the transactional SOA serial counter
//! * `store` - record and request-log persistence
//! * `requests` - request logging with persist-then-broadcast semantics
//! * `stream` - per-domain live subscriptions
//! * `sweeper` - periodic retention deletes
//! * `errors` - the crate error taxonomy

/// Crate error taxonomy
pub mod errors;

/// Record types, content codec, packet representation
pub mod protocol;

/// Subdomain namespace-ownership validation
pub mod validation;

/// Transactional SOA serial counter
pub mod serial;

/// Record and request-log persistence
pub mod store;

/// Request logging and broadcast
pub mod requests;

/// Per-domain live event streams
pub mod stream;

/// Periodic retention sweeps
pub mod sweeper;
