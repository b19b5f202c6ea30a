use std::sync::Arc;

use cometd_codec::JsonCodec;
use cometd_conf::MessageConf;

use crate::message::Message;
use crate::weak::WeakMessage;

/// Builds [`WeakMessage`]s that all share one codec and one set of options.
#[derive(Clone)]
pub struct MessageFactory {
    zip_message_size_threshold: usize,
    ignore_null_data: bool,
    codec: Arc<dyn JsonCodec>,
}

impl MessageFactory {
    /// Factory with the default message settings.
    #[inline]
    pub fn new(codec: Arc<dyn JsonCodec>) -> Self {
        Self::from_conf(&MessageConf::default(), codec)
    }

    #[inline]
    pub fn from_conf(conf: &MessageConf, codec: Arc<dyn JsonCodec>) -> Self {
        Self {
            zip_message_size_threshold: conf.zip_message_size_threshold.as_usize(),
            ignore_null_data: conf.ignore_null_data,
            codec,
        }
    }

    #[inline]
    pub fn zip_message_size_threshold(mut self, threshold: usize) -> Self {
        self.zip_message_size_threshold = threshold;
        self
    }

    #[inline]
    pub fn ignore_null_data(mut self, ignore_null_data: bool) -> Self {
        self.ignore_null_data = ignore_null_data;
        self
    }

    #[inline]
    pub fn codec(&self) -> &Arc<dyn JsonCodec> {
        &self.codec
    }

    #[inline]
    pub fn create(&self) -> WeakMessage {
        WeakMessage::new(self.zip_message_size_threshold, self.codec.clone(), self.ignore_null_data)
    }

    #[inline]
    pub fn wrap(&self, message: &Message) -> WeakMessage {
        WeakMessage::from_message(message, self.zip_message_size_threshold, self.codec.clone(), self.ignore_null_data)
    }

    /// Wraps and freezes `message`, ready to be queued for delivery.
    #[inline]
    pub fn freeze(&self, message: &Message) -> WeakMessage {
        let mut msg = self.wrap(message);
        msg.freeze();
        msg
    }
}

#[cfg(test)]
mod tests {
    use cometd_codec::SerdeJsonCodec;
    use cometd_utils::Bytesize;
    use serde_json::{json, Value};

    use super::*;

    #[test]
    fn test_from_conf() {
        let conf = MessageConf { zip_message_size_threshold: Bytesize::from("1K"), ignore_null_data: true };
        let factory = MessageFactory::from_conf(&conf, Arc::new(SerdeJsonCodec));

        let msg = factory.create();
        assert_eq!(msg.zip_message_size_threshold(), 1024);
        assert!(msg.ignore_null_data());
        assert!(!msg.is_frozen());

        let defaults = MessageFactory::new(Arc::new(SerdeJsonCodec)).create();
        assert_eq!(defaults.zip_message_size_threshold(), 51200);
        assert!(!defaults.ignore_null_data());
    }

    #[test]
    fn test_freeze() {
        let factory = MessageFactory::new(Arc::new(SerdeJsonCodec)).zip_message_size_threshold(0);

        let mut message = Message::new();
        message.set_channel("/devices/42");
        message.set_data(json!({"c8y_Temperature": 21.5}));

        let msg = factory.freeze(&message);
        assert!(msg.is_frozen());
        assert_eq!(msg.channel(), Some("/devices/42"));
        assert!(cometd_codec::zip::is_gzip(&msg.raw_data().unwrap()));

        let json: Value = serde_json::from_str(&msg.json().unwrap()).unwrap();
        assert_eq!(json, json!({"channel": "/devices/42", "data": {"c8y_Temperature": 21.5}}));
    }

    #[test]
    fn test_ignore_null_data() {
        let factory = MessageFactory::new(Arc::new(SerdeJsonCodec)).ignore_null_data(true);
        let mut message = Message::new();
        message.set_channel("/meta/connect");
        assert_eq!(factory.freeze(&message).json().unwrap().as_ref(), r#"{"channel":"/meta/connect"}"#);

        let factory = factory.ignore_null_data(false);
        assert_eq!(
            factory.freeze(&message).json().unwrap().as_ref(),
            r#"{"channel":"/meta/connect","data":null}"#
        );
    }
}
