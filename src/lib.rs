//! DNS playground backend
//!
//! Zone storage and live observability for an authoritative DNS playground:
//! every user owns one subdomain under a fixed apex and can create, inspect,
//! and delete arbitrary resource records for it, while every query served for
//! that subdomain is logged and streamed to anyone watching.
//!
//! # Features
//!
//! * Generic record storage: any supported record type round-trips through a
//!   single self-describing content column
//! * Transactional SOA serial, bumped atomically with every zone mutation
//! * Namespace-ownership validation (one owner label directly under the apex)
//! * Persist-then-broadcast request logging with per-domain subscriptions
//! * Background retention sweeps for aged records and logged requests

/// Zone storage, record codec, validation, and request streaming
pub mod dns;
