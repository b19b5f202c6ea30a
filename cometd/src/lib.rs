#![deny(unsafe_code)] // Enforce memory safety across the entire crate

//! # Overall Example
//! ```rust
//! use std::sync::Arc;
//!
//! use cometd::{Message, MessageFactory};
//! use cometd::codec::SerdeJsonCodec;
//! use serde_json::json;
//!
//! let factory = MessageFactory::new(Arc::new(SerdeJsonCodec)).zip_message_size_threshold(1024);
//!
//! let mut message = Message::new();
//! message.set_channel("/devices/42/measurements");
//! message.set_data(json!({"temperature": 21.5}));
//!
//! let weak = Arc::new(factory.freeze(&message));
//! assert_eq!(weak.data().unwrap()["temperature"], json!(21.5));
//! assert!(!weak.is_compressed());
//! assert!(weak.json().unwrap().contains("/devices/42/measurements"));
//! ```

/// Error types
pub mod error;
/// Builds messages from shared settings
pub mod factory;
/// slog logger wiring for binaries
#[cfg(feature = "logger")]
pub mod logger;
/// Plain mutable message
pub mod message;
/// Frozen, lazily serialized message
pub mod weak;

pub use error::{MessageError, Result};
pub use factory::MessageFactory;
pub use message::{MapView, Message};
pub use weak::WeakMessage;

/// External Crate Re-exports
pub use cometd_codec as codec; // Field model, JSON codec, gzip
pub use cometd_conf as conf; // Settings
pub use cometd_utils as utils; // Common utilities
pub use {anyhow, log, serde_json};
