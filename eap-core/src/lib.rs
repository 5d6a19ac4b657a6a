//! EAP Core: request/notify/download engine for the vendor data API.
//!
//! This crate contains the whole run, minus orchestration:
//! - Domain types (session, identifiers, request descriptor, result table)
//! - Identifier mapping with priority ranks
//! - Catalog resolution and request-resource creation
//! - Delivery listener state machine over the shared notification stream
//! - Payload decoding (gzip CSV / JSON records)
//! - Result transformation (timestamps, priority, column housekeeping)
//! - Collaborator seams: API session, event stream, downloader, sink, ticker source

pub mod api;
pub mod delivery;
pub mod domain;
pub mod error;
pub mod payload;
pub mod sink;
pub mod transform;
pub mod universe;

pub use error::EapError;
