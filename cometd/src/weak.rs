//! Outgoing message that serializes itself once and then lets go of its payload.
//!
//! A [`WeakMessage`] is built and frozen by one producer, then shared (usually as
//! `Arc<WeakMessage>`) by every delivery worker that writes it to a session.
//!
//! ## Lifecycle
//! 1. **Mutable**: fields are written through `put`/`set_data`/`ext_mut`.
//! 2. **Frozen**: `freeze()` takes a shallow snapshot of the fields. The live `data`
//!    slot is downgraded to a `Weak` right away, the snapshot keeps the payload alive
//!    until the first serialization.
//! 3. **Serialized**: the first `json()`/`json_bytes()`/`raw_data()` renders the
//!    snapshot through the codec, downgrades the snapshot's payload as well and
//!    decides between plain and gzip storage. From then on the message only pins
//!    the wire bytes; the payload lives as long as somebody else holds it.
//!
//! Reading `data` on a frozen message tries the weak reference first and falls back
//! to parsing the serialized JSON, so callers may get an equal value with a
//! different identity once the original payload has been dropped.

use std::fmt;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use cometd_codec::{
    zip, CodecError, Fields, JsonCodec, ADVICE_FIELD, CHANNEL_FIELD, CLIENT_ID_FIELD, DATA_FIELD, EXT_FIELD,
    ID_FIELD,
};

use crate::message::{object_mut, MapView, Message};
use crate::{MessageError, Result};

#[derive(Clone)]
enum Slot {
    Absent,
    Null,
    Live(Arc<Value>),
    Weak(Weak<Value>),
}

impl Slot {
    #[inline]
    fn from_value(value: Arc<Value>) -> Slot {
        if value.is_null() {
            Slot::Null
        } else {
            Slot::Live(value)
        }
    }

    #[inline]
    fn upgrade(&self) -> Option<Arc<Value>> {
        match self {
            Slot::Live(v) => Some(v.clone()),
            Slot::Weak(w) => w.upgrade(),
            Slot::Absent | Slot::Null => None,
        }
    }

    #[inline]
    fn downgrade(&self) -> Slot {
        match self {
            Slot::Live(v) => Slot::Weak(Arc::downgrade(v)),
            other => other.clone(),
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Absent => f.write_str("Absent"),
            Slot::Null => f.write_str("Null"),
            Slot::Live(v) => write!(f, "Live({v})"),
            Slot::Weak(w) => match w.upgrade() {
                Some(v) => write!(f, "Weak({v})"),
                None => f.write_str("Weak(<reclaimed>)"),
            },
        }
    }
}

/// Fields captured by `freeze()`. `data` is kept apart so it can be downgraded
/// after serialization without touching the other fields. Every copy of a frozen
/// message shares one `Frozen`, so the first serialization serves all of them.
struct Frozen {
    fields: Fields,
    data: Mutex<Slot>,
    format: OnceCell<Arc<Format>>,
}

impl Frozen {
    #[inline]
    fn format(&self) -> Option<&Format> {
        self.format.get().map(|f| f.as_ref())
    }
}

/// Wire form chosen on first serialization.
enum Format {
    Plain { json: Arc<str>, bytes: Bytes },
    Gzip { bytes: Bytes },
}

impl Format {
    fn new(json: String, zip_message_size_threshold: usize) -> Result<Format> {
        if json.len() > zip_message_size_threshold {
            let bytes = zip::gzip(json.as_bytes()).map_err(|e| {
                log::error!("Unable to zip json data, {e:?}");
                e
            })?;
            log::trace!("zipped json data, {} => {} bytes", json.len(), bytes.len());
            Ok(Format::Gzip { bytes })
        } else {
            let bytes = Bytes::copy_from_slice(json.as_bytes());
            Ok(Format::Plain { json: Arc::from(json), bytes })
        }
    }

    #[inline]
    fn json(&self) -> Result<Arc<str>> {
        match self {
            Format::Plain { json, .. } => Ok(json.clone()),
            Format::Gzip { bytes } => zip::gunzip_to_string(bytes).map(Arc::from).map_err(unzip_error),
        }
    }

    #[inline]
    fn json_bytes(&self) -> Result<Bytes> {
        match self {
            Format::Plain { bytes, .. } => Ok(bytes.clone()),
            Format::Gzip { bytes } => zip::gunzip(bytes).map_err(unzip_error),
        }
    }

    #[inline]
    fn raw_data(&self) -> Bytes {
        match self {
            Format::Plain { bytes, .. } | Format::Gzip { bytes } => bytes.clone(),
        }
    }
}

fn unzip_error(e: CodecError) -> MessageError {
    log::error!("Unable to unzip json data, {e:?}");
    MessageError::Codec(e)
}

pub struct WeakMessage {
    fields: Fields,
    data: Slot,
    associated: Option<Arc<WeakMessage>>,
    lazy: bool,
    local: bool,
    frozen: Option<Arc<Frozen>>,
    zip_message_size_threshold: usize,
    codec: Arc<dyn JsonCodec>,
    ignore_null_data: bool,
}

impl WeakMessage {
    /// An empty message.
    ///
    /// `zip_message_size_threshold` is compared against the UTF-8 length of the
    /// serialized JSON; anything longer is stored gzipped, so `0` compresses every
    /// non-empty message.
    #[inline]
    pub fn new(zip_message_size_threshold: usize, codec: Arc<dyn JsonCodec>, ignore_null_data: bool) -> Self {
        Self {
            fields: Fields::new(),
            data: Slot::Absent,
            associated: None,
            lazy: false,
            local: false,
            frozen: None,
            zip_message_size_threshold,
            codec,
            ignore_null_data,
        }
    }

    /// Copies every field of `message`, the payload by reference.
    #[inline]
    pub fn from_message(
        message: &Message,
        zip_message_size_threshold: usize,
        codec: Arc<dyn JsonCodec>,
        ignore_null_data: bool,
    ) -> Self {
        let mut msg = Self::new(zip_message_size_threshold, codec, ignore_null_data);
        for (key, value) in message.fields() {
            if key == DATA_FIELD {
                msg.data = Slot::from_value(value.clone());
            } else {
                msg.fields.insert(key.clone(), value.clone());
            }
        }
        msg
    }

    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    #[inline]
    pub fn is_serialized(&self) -> bool {
        self.format().is_some()
    }

    /// `true` once serialized in gzip form.
    #[inline]
    pub fn is_compressed(&self) -> bool {
        matches!(self.format(), Some(Format::Gzip { .. }))
    }

    #[inline]
    fn format(&self) -> Option<&Format> {
        self.frozen.as_ref().and_then(|frozen| frozen.format())
    }

    #[inline]
    pub fn zip_message_size_threshold(&self) -> usize {
        self.zip_message_size_threshold
    }

    #[inline]
    pub fn ignore_null_data(&self) -> bool {
        self.ignore_null_data
    }

    /// Sets a field and returns the previous value.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Arc<Value>>) -> Result<Option<Arc<Value>>> {
        if self.is_frozen() {
            return Err(MessageError::Frozen);
        }
        let key = key.into();
        let value = value.into();
        if key == DATA_FIELD {
            let prev = std::mem::replace(&mut self.data, Slot::from_value(value));
            return Ok(prev.upgrade());
        }
        Ok(self.fields.insert(key, value))
    }

    pub fn remove(&mut self, key: &str) -> Result<Option<Arc<Value>>> {
        if self.is_frozen() {
            return Err(MessageError::Frozen);
        }
        if key == DATA_FIELD {
            return Ok(std::mem::replace(&mut self.data, Slot::Absent).upgrade());
        }
        Ok(self.fields.remove(key))
    }

    /// Reads a field. `data` goes through [`WeakMessage::data`].
    #[inline]
    pub fn get(&self, key: &str) -> Option<Arc<Value>> {
        if key == DATA_FIELD {
            return self.data();
        }
        self.fields.get(key).cloned()
    }

    #[inline]
    pub fn set_data(&mut self, data: impl Into<Arc<Value>>) -> Result<()> {
        self.put(DATA_FIELD, data).map(|_| ())
    }

    /// The payload.
    ///
    /// Before `freeze()` this is the live value. Afterwards the snapshot's reference
    /// is tried first; if the payload has been dropped, the serialized JSON is parsed
    /// and its `data` field returned. Without a serialized form there is nothing to
    /// fall back to and `None` is returned.
    pub fn data(&self) -> Option<Arc<Value>> {
        let frozen = match self.frozen.as_ref() {
            Some(frozen) => frozen,
            None => return self.data.upgrade(),
        };

        if let Some(data) = frozen.data.lock().upgrade() {
            return Some(data);
        }

        frozen.format().and_then(|format| self.data_from_json(format))
    }

    fn data_from_json(&self, format: &Format) -> Option<Arc<Value>> {
        let json = match format.json() {
            Ok(json) => json,
            Err(e) => {
                log::error!("Error while reading json data from WeakMessage, {e}");
                return None;
            }
        };
        match self.codec.parse(&json) {
            Ok(mut map) => map.remove(DATA_FIELD).filter(|v| !v.is_null()).map(Arc::new),
            Err(e) => {
                log::error!("Error while parsing json data from WeakMessage, {e}");
                None
            }
        }
    }

    /// The payload as a read-only map, `None` when it is not a JSON object.
    #[inline]
    pub fn data_as_map(&self) -> Option<MapView> {
        self.data().and_then(MapView::new)
    }

    #[inline]
    pub fn channel(&self) -> Option<&str> {
        self.fields.get(CHANNEL_FIELD).and_then(|v| v.as_str())
    }

    #[inline]
    pub fn set_channel(&mut self, channel: impl Into<String>) -> Result<()> {
        self.put(CHANNEL_FIELD, Value::String(channel.into())).map(|_| ())
    }

    #[inline]
    pub fn id(&self) -> Option<&str> {
        self.fields.get(ID_FIELD).and_then(|v| v.as_str())
    }

    #[inline]
    pub fn set_id(&mut self, id: impl Into<String>) -> Result<()> {
        self.put(ID_FIELD, Value::String(id.into())).map(|_| ())
    }

    #[inline]
    pub fn client_id(&self) -> Option<&str> {
        self.fields.get(CLIENT_ID_FIELD).and_then(|v| v.as_str())
    }

    #[inline]
    pub fn set_client_id(&mut self, client_id: impl Into<String>) -> Result<()> {
        self.put(CLIENT_ID_FIELD, Value::String(client_id.into())).map(|_| ())
    }

    #[inline]
    pub fn ext(&self) -> Option<MapView> {
        self.fields.get(EXT_FIELD).cloned().and_then(MapView::new)
    }

    #[inline]
    pub fn ext_mut(&mut self, create: bool) -> Result<Option<&mut Map<String, Value>>> {
        if self.is_frozen() {
            return Err(MessageError::Frozen);
        }
        Ok(object_mut(&mut self.fields, EXT_FIELD, create))
    }

    #[inline]
    pub fn advice(&self) -> Option<MapView> {
        self.fields.get(ADVICE_FIELD).cloned().and_then(MapView::new)
    }

    #[inline]
    pub fn associated(&self) -> Option<&Arc<WeakMessage>> {
        self.associated.as_ref()
    }

    #[inline]
    pub fn set_associated(&mut self, associated: Option<Arc<WeakMessage>>) {
        self.associated = associated;
    }

    #[inline]
    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    #[inline]
    pub fn set_lazy(&mut self, lazy: bool) {
        self.lazy = lazy;
    }

    #[inline]
    pub fn is_local(&self) -> bool {
        self.local
    }

    #[inline]
    pub fn set_local(&mut self, local: bool) {
        self.local = local;
    }

    /// Snapshots the fields and stops accepting writes. Calling it again is a no-op.
    pub fn freeze(&mut self) {
        if self.is_frozen() {
            log::debug!("message {:?} on {:?} is already frozen", self.id(), self.channel());
            return;
        }

        let data = match self.data.clone() {
            Slot::Absent | Slot::Null if self.ignore_null_data => Slot::Absent,
            Slot::Absent | Slot::Null => Slot::Null,
            slot => slot,
        };
        self.data = self.data.downgrade();
        self.frozen =
            Some(Arc::new(Frozen { fields: self.fields.clone(), data: Mutex::new(data), format: OnceCell::new() }));
    }

    /// The JSON text. Gzipped messages are decompressed on every call.
    #[inline]
    pub fn json(&self) -> Result<Arc<str>> {
        self.serialize_if_needed()?.json()
    }

    /// The uncompressed JSON bytes. Gzipped messages are decompressed on every call.
    #[inline]
    pub fn json_bytes(&self) -> Result<Bytes> {
        self.serialize_if_needed()?.json_bytes()
    }

    /// The stored wire bytes, gzipped when the JSON exceeded the threshold.
    #[inline]
    pub fn raw_data(&self) -> Result<Bytes> {
        Ok(self.serialize_if_needed()?.raw_data())
    }

    fn serialize_if_needed(&self) -> Result<&Format> {
        let frozen = self.frozen.as_ref().ok_or(MessageError::NotFrozen)?;
        frozen
            .format
            .get_or_try_init(|| {
                let mut data = frozen.data.lock();

                let mut fields = frozen.fields.clone();
                match &*data {
                    Slot::Null => {
                        fields.insert(DATA_FIELD.into(), Arc::new(Value::Null));
                    }
                    slot => {
                        if let Some(value) = slot.upgrade() {
                            fields.insert(DATA_FIELD.into(), value);
                        }
                    }
                }

                let json = self.codec.generate(&fields)?;
                *data = data.downgrade();
                Format::new(json, self.zip_message_size_threshold).map(Arc::new)
            })
            .map(|format| format.as_ref())
    }

    /// A new message with the same configuration and fields. A frozen snapshot,
    /// together with its serialized form, is shared rather than recomputed.
    /// `associated`, `lazy` and `local` are not carried over.
    pub fn copy(&self) -> WeakMessage {
        WeakMessage {
            fields: self.fields.clone(),
            data: self.data.clone(),
            associated: None,
            lazy: false,
            local: false,
            frozen: self.frozen.clone(),
            zip_message_size_threshold: self.zip_message_size_threshold,
            codec: self.codec.clone(),
            ignore_null_data: self.ignore_null_data,
        }
    }
}

impl fmt::Debug for WeakMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakMessage")
            .field("fields", &self.fields)
            .field("data", &self.data)
            .field("lazy", &self.lazy)
            .field("local", &self.local)
            .field("frozen", &self.is_frozen())
            .field("serialized", &self.is_serialized())
            .field("compressed", &self.is_compressed())
            .finish()
    }
}
