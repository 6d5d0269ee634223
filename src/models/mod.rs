//! Core data models for the S3 listing service.
//!
//! These entities describe what the browser-facing API and the Redis cache
//! exchange: individual bucket entries, the per-prefix cache records, and the
//! paginated listing response. Everything serializes as camelCase JSON via
//! `serde`, so cached payloads and HTTP responses share one wire shape.

pub mod entry;
pub mod listing;
