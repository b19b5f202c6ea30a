#![deny(unsafe_code)]

//! Bayeux message field model and the JSON/gzip codec used to put messages on the wire
//!
//! ## Core Features:
//! - **Field model**: [`Fields`] maps Bayeux field names to shared JSON values, so copying a
//!   message only bumps reference counts
//! - **Codec contract**: [`JsonCodec`] is the narrow `generate`/`parse` pair the message cache
//!   depends on; [`SerdeJsonCodec`] is the serde_json backed implementation
//! - **Gzip framing**: [`zip`] compresses large JSON bodies into a standard gzip container
//!
//! ```rust
//! use std::sync::Arc;
//! use cometd_codec::{Fields, JsonCodec, SerdeJsonCodec, DATA_FIELD};
//! use serde_json::json;
//!
//! let mut fields = Fields::new();
//! fields.insert(DATA_FIELD.into(), Arc::new(json!("JsonData")));
//! let json = SerdeJsonCodec.generate(&fields).unwrap();
//! assert_eq!(json, r#"{"data":"JsonData"}"#);
//! assert_eq!(SerdeJsonCodec.parse(&json).unwrap()["data"], "JsonData");
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

/// Error types for generate/parse/gzip operations
pub mod error;

/// Gzip helpers
pub mod zip;

pub use error::CodecError;

pub const CHANNEL_FIELD: &str = "channel";
pub const ID_FIELD: &str = "id";
pub const CLIENT_ID_FIELD: &str = "clientId";
pub const DATA_FIELD: &str = "data";
pub const EXT_FIELD: &str = "ext";
pub const ADVICE_FIELD: &str = "advice";
pub const SUCCESSFUL_FIELD: &str = "successful";

/// Message fields keyed by Bayeux field name.
///
/// Values sit behind `Arc` so a snapshot of the fields is a shallow copy and the
/// identity of the `data` payload survives copies.
pub type Fields = BTreeMap<String, Arc<Value>>;

/// The JSON contract a message cache needs.
pub trait JsonCodec: Send + Sync {
    /// Render the fields as a JSON object.
    fn generate(&self, fields: &Fields) -> Result<String, CodecError>;

    /// Parse a JSON object back into a key/value mapping.
    fn parse(&self, json: &str) -> Result<Map<String, Value>, CodecError>;
}

/// serde_json backed codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeJsonCodec;

impl JsonCodec for SerdeJsonCodec {
    #[inline]
    fn generate(&self, fields: &Fields) -> Result<String, CodecError> {
        serde_json::to_string(fields).map_err(CodecError::Generate)
    }

    #[inline]
    fn parse(&self, json: &str) -> Result<Map<String, Value>, CodecError> {
        match serde_json::from_str::<Value>(json).map_err(CodecError::Parse)? {
            Value::Object(map) => Ok(map),
            _ => Err(CodecError::NotAnObject),
        }
    }
}

impl<T: JsonCodec + ?Sized> JsonCodec for Arc<T> {
    #[inline]
    fn generate(&self, fields: &Fields) -> Result<String, CodecError> {
        (**self).generate(fields)
    }

    #[inline]
    fn parse(&self, json: &str) -> Result<Map<String, Value>, CodecError> {
        (**self).parse(json)
    }
}
