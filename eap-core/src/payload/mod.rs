//! Delivered artifact decoding.

pub mod decode;

pub use decode::{decode_artifact, decode_csv, decode_json, DecodedTable};
