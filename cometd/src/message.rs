//! Plain, always mutable Bayeux message.
//!
//! `Message` is what handlers build before a message is handed to delivery. It is
//! also the source a [`WeakMessage`](crate::WeakMessage) copies its fields from.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use cometd_codec::{
    CodecError, Fields, JsonCodec, ADVICE_FIELD, CHANNEL_FIELD, CLIENT_ID_FIELD, DATA_FIELD, EXT_FIELD,
    ID_FIELD,
};

#[derive(Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Message {
    fields: Fields,
}

impl Message {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn from_fields(fields: Fields) -> Self {
        Self { fields }
    }

    /// Build a message from a parsed JSON object.
    #[inline]
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self { fields: map.into_iter().map(|(k, v)| (k, Arc::new(v))).collect() }
    }

    #[inline]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    #[inline]
    pub fn into_fields(self) -> Fields {
        self.fields
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&Arc<Value>> {
        self.fields.get(key)
    }

    #[inline]
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Arc<Value>>) -> Option<Arc<Value>> {
        self.fields.insert(key.into(), value.into())
    }

    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<Arc<Value>> {
        self.fields.remove(key)
    }

    #[inline]
    pub fn channel(&self) -> Option<&str> {
        self.get(CHANNEL_FIELD).and_then(|v| v.as_str())
    }

    #[inline]
    pub fn set_channel(&mut self, channel: impl Into<String>) {
        self.put(CHANNEL_FIELD, Value::String(channel.into()));
    }

    #[inline]
    pub fn id(&self) -> Option<&str> {
        self.get(ID_FIELD).and_then(|v| v.as_str())
    }

    #[inline]
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.put(ID_FIELD, Value::String(id.into()));
    }

    #[inline]
    pub fn client_id(&self) -> Option<&str> {
        self.get(CLIENT_ID_FIELD).and_then(|v| v.as_str())
    }

    #[inline]
    pub fn set_client_id(&mut self, client_id: impl Into<String>) {
        self.put(CLIENT_ID_FIELD, Value::String(client_id.into()));
    }

    #[inline]
    pub fn data(&self) -> Option<&Arc<Value>> {
        self.get(DATA_FIELD)
    }

    /// Passing an `Arc` keeps the caller's handle pointing at the same payload.
    #[inline]
    pub fn set_data(&mut self, data: impl Into<Arc<Value>>) {
        self.put(DATA_FIELD, data);
    }

    #[inline]
    pub fn ext(&self) -> Option<&Map<String, Value>> {
        self.get(EXT_FIELD).and_then(|v| v.as_object())
    }

    /// Mutable access to the `ext` map, creating an empty one when `create` is set.
    #[inline]
    pub fn ext_mut(&mut self, create: bool) -> Option<&mut Map<String, Value>> {
        object_mut(&mut self.fields, EXT_FIELD, create)
    }

    #[inline]
    pub fn advice(&self) -> Option<&Map<String, Value>> {
        self.get(ADVICE_FIELD).and_then(|v| v.as_object())
    }

    #[inline]
    pub fn to_json(&self, codec: &dyn JsonCodec) -> Result<String, CodecError> {
        codec.generate(&self.fields)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.fields.iter()).finish()
    }
}

pub(crate) fn object_mut<'a>(
    fields: &'a mut Fields,
    key: &str,
    create: bool,
) -> Option<&'a mut Map<String, Value>> {
    if create && !fields.get(key).map(|v| v.is_object()).unwrap_or(false) {
        fields.insert(key.into(), Arc::new(Value::Object(Map::new())));
    }
    fields.get_mut(key).and_then(|v| Arc::make_mut(v).as_object_mut())
}

/// Read-only view of a JSON object field.
#[derive(Clone)]
pub struct MapView(Arc<Value>);

impl MapView {
    #[inline]
    pub(crate) fn new(value: Arc<Value>) -> Option<Self> {
        if value.is_object() {
            Some(MapView(value))
        } else {
            None
        }
    }

    #[inline]
    pub fn as_value(&self) -> &Arc<Value> {
        &self.0
    }
}

impl Deref for MapView {
    type Target = Map<String, Value>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        match self.0.as_ref() {
            Value::Object(map) => map,
            _ => unreachable!("MapView always wraps an object"),
        }
    }
}

impl fmt::Debug for MapView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.deref(), f)
    }
}

#[cfg(test)]
mod tests {
    use cometd_codec::SerdeJsonCodec;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_accessors() {
        let mut msg = Message::new();
        msg.set_channel("/some/channel");
        msg.set_id("123");
        msg.set_client_id("321");
        msg.set_data(json!({"name": "testGroup1"}));

        assert_eq!(msg.channel(), Some("/some/channel"));
        assert_eq!(msg.id(), Some("123"));
        assert_eq!(msg.client_id(), Some("321"));
        assert_eq!(msg.data().map(|d| d["name"].clone()), Some(json!("testGroup1")));
        assert!(msg.ext().is_none());
        assert!(msg.advice().is_none());

        let json: Value = serde_json::from_str(&msg.to_json(&SerdeJsonCodec).unwrap()).unwrap();
        assert_eq!(
            json,
            json!({"channel": "/some/channel", "id": "123", "clientId": "321", "data": {"name": "testGroup1"}})
        );
    }

    #[test]
    fn test_ext_mut_is_copy_on_write() {
        let mut msg = Message::new();
        assert!(msg.ext_mut(false).is_none());
        msg.ext_mut(true).unwrap().insert("ack".into(), json!(true));

        let mut other = msg.clone();
        other.ext_mut(false).unwrap().insert("ack".into(), json!(false));

        assert_eq!(msg.ext().unwrap()["ack"], json!(true));
        assert_eq!(other.ext().unwrap()["ack"], json!(false));
    }

    #[test]
    fn test_set_data_keeps_identity() {
        let payload = Arc::new(json!([1, 2, 3]));
        let mut msg = Message::new();
        msg.set_data(payload.clone());
        assert!(Arc::ptr_eq(msg.data().unwrap(), &payload));
    }

    #[test]
    fn test_from_map() {
        let map = SerdeJsonCodec.parse(r#"{"channel":"/a","advice":{"reconnect":"retry"}}"#).unwrap();
        let msg = Message::from_map(map);
        assert_eq!(msg.channel(), Some("/a"));
        assert_eq!(msg.advice().unwrap()["reconnect"], json!("retry"));

        assert!(MapView::new(Arc::new(json!("x"))).is_none());
        let view = MapView::new(msg.get(ADVICE_FIELD).unwrap().clone()).unwrap();
        assert_eq!(view.get("reconnect"), Some(&json!("retry")));
    }
}
