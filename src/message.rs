//! Content properties and delivered-message model.
//!
//! AMQP's content header carries a fixed, ordered property list behind
//! a flag bitmap: one bit per property, packed into one or more 16-bit
//! words (low bit of each word means "another word follows"). Only
//! properties that are `Some` are written, and only set bits are read
//! back on decode.

use std::sync::Weak;

use crate::codec::{Decoder, Encoder};
use crate::error::Result;
use crate::types::{FieldTable, Timestamp};

/// The fixed AMQP 0.9.1 `basic` content property list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicProperties {
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub headers: Option<FieldTable>,
    pub delivery_mode: Option<u8>,
    pub priority: Option<u8>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
    pub expiration: Option<String>,
    pub message_id: Option<String>,
    pub timestamp: Option<Timestamp>,
    pub kind: Option<String>,
    pub user_id: Option<String>,
    pub app_id: Option<String>,
    pub cluster_id: Option<String>,
}

impl BasicProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_type(mut self, v: impl Into<String>) -> Self {
        self.content_type = Some(v.into());
        self
    }

    pub fn with_content_encoding(mut self, v: impl Into<String>) -> Self {
        self.content_encoding = Some(v.into());
        self
    }

    pub fn with_delivery_mode(mut self, v: u8) -> Self {
        self.delivery_mode = Some(v);
        self
    }

    pub fn with_correlation_id(mut self, v: impl Into<String>) -> Self {
        self.correlation_id = Some(v.into());
        self
    }

    pub fn with_reply_to(mut self, v: impl Into<String>) -> Self {
        self.reply_to = Some(v.into());
        self
    }

    pub fn with_message_id(mut self, v: impl Into<String>) -> Self {
        self.message_id = Some(v.into());
        self
    }

    /// Bit index (0 = highest bit of the first flag word) for each
    /// property, in wire order.
    fn flag_bits(&self) -> [bool; 14] {
        [
            self.content_type.is_some(),
            self.content_encoding.is_some(),
            self.headers.is_some(),
            self.delivery_mode.is_some(),
            self.priority.is_some(),
            self.correlation_id.is_some(),
            self.reply_to.is_some(),
            self.expiration.is_some(),
            self.message_id.is_some(),
            self.timestamp.is_some(),
            self.kind.is_some(),
            self.user_id.is_some(),
            self.app_id.is_some(),
            self.cluster_id.is_some(),
        ]
    }

    /// Serialize the property-flag bitmap followed by each present
    /// property, in wire order.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let flags = self.flag_bits();

        let mut words: Vec<u16> = Vec::new();
        let mut word: u16 = 0;
        for (i, set) in flags.iter().enumerate() {
            let bit_in_word = i % 15;
            if i > 0 && bit_in_word == 0 {
                words.push(word);
                word = 0;
            }
            if *set {
                word |= 1 << (15 - bit_in_word);
            }
        }
        words.push(word);

        for (idx, w) in words.iter().enumerate() {
            let mut w = *w;
            if idx + 1 < words.len() {
                w |= 1; // more words follow
            }
            buf.extend_from_slice(&w.to_be_bytes());
        }

        let mut enc = Encoder::new(&mut buf);
        if let Some(v) = &self.content_type {
            enc.write_shortstr(v)?;
        }
        if let Some(v) = &self.content_encoding {
            enc.write_shortstr(v)?;
        }
        if let Some(v) = &self.headers {
            enc.write_table(v)?;
        }
        if let Some(v) = self.delivery_mode {
            enc.write_octet(v)?;
        }
        if let Some(v) = self.priority {
            enc.write_octet(v)?;
        }
        if let Some(v) = &self.correlation_id {
            enc.write_shortstr(v)?;
        }
        if let Some(v) = &self.reply_to {
            enc.write_shortstr(v)?;
        }
        if let Some(v) = &self.expiration {
            enc.write_shortstr(v)?;
        }
        if let Some(v) = &self.message_id {
            enc.write_shortstr(v)?;
        }
        if let Some(v) = self.timestamp {
            enc.write_timestamp(v)?;
        }
        if let Some(v) = &self.kind {
            enc.write_shortstr(v)?;
        }
        if let Some(v) = &self.user_id {
            enc.write_shortstr(v)?;
        }
        if let Some(v) = &self.app_id {
            enc.write_shortstr(v)?;
        }
        if let Some(v) = &self.cluster_id {
            enc.write_shortstr(v)?;
        }
        enc.finish()?;
        Ok(buf)
    }

    pub fn decode(payload: &[u8]) -> Result<BasicProperties> {
        let mut pos = 0usize;
        let mut bits: Vec<bool> = Vec::new();
        loop {
            let word = u16::from_be_bytes([payload[pos], payload[pos + 1]]);
            pos += 2;
            for i in 0..15 {
                bits.push((word & (1 << (15 - i))) != 0);
            }
            if word & 1 == 0 {
                break;
            }
        }

        let mut dec = Decoder::new(std::io::Cursor::new(&payload[pos..]));
        let mut props = BasicProperties::default();
        if bits[0] {
            props.content_type = Some(dec.read_shortstr()?);
        }
        if bits[1] {
            props.content_encoding = Some(dec.read_shortstr()?);
        }
        if bits[2] {
            props.headers = Some(dec.read_table()?);
        }
        if bits[3] {
            props.delivery_mode = Some(dec.read_octet()?);
        }
        if bits[4] {
            props.priority = Some(dec.read_octet()?);
        }
        if bits[5] {
            props.correlation_id = Some(dec.read_shortstr()?);
        }
        if bits[6] {
            props.reply_to = Some(dec.read_shortstr()?);
        }
        if bits[7] {
            props.expiration = Some(dec.read_shortstr()?);
        }
        if bits[8] {
            props.message_id = Some(dec.read_shortstr()?);
        }
        if bits[9] {
            props.timestamp = Some(dec.read_timestamp()?);
        }
        if bits[10] {
            props.kind = Some(dec.read_shortstr()?);
        }
        if bits[11] {
            props.user_id = Some(dec.read_shortstr()?);
        }
        if bits[12] {
            props.app_id = Some(dec.read_shortstr()?);
        }
        if bits[13] {
            props.cluster_id = Some(dec.read_shortstr()?);
        }
        Ok(props)
    }
}

/// Where a delivered message came from and how to acknowledge it.
#[derive(Debug, Clone, Default)]
pub struct DeliveryInfo {
    pub consumer_tag: Option<String>,
    pub delivery_tag: Option<u64>,
    pub redelivered: bool,
    pub exchange: String,
    pub routing_key: String,
    pub message_count: Option<u32>,
}

/// A message delivered to the application, via `basic.deliver`,
/// `basic.get-ok` or `basic.return`.
#[derive(Debug, Clone)]
pub struct Message {
    pub properties: BasicProperties,
    pub body: Vec<u8>,
    pub delivery_info: DeliveryInfo,
    pub decoded_text: Option<String>,
    pub(crate) channel: Weak<crate::channel::Channel>,
}

impl Message {
    pub fn new(properties: BasicProperties, body: Vec<u8>, delivery_info: DeliveryInfo) -> Self {
        Message {
            properties,
            body,
            delivery_info,
            decoded_text: None,
            channel: Weak::new(),
        }
    }

    pub fn delivery_tag(&self) -> Option<u64> {
        self.delivery_info.delivery_tag
    }

    /// Runs the channel's best-effort decode: UTF-8 only, and only when
    /// `content_encoding` is unset or names UTF-8, so a declared
    /// encoding like `gzip` is never misread as text. Failure (or a
    /// non-UTF-8 encoding) leaves `decoded_text` unset and `body`
    /// untouched. Called from delivery/return handling when the
    /// channel's `auto_decode` is enabled; messages built directly via
    /// `Message::new` never run it.
    pub(crate) fn auto_decode_body(&mut self) {
        let is_utf8 = match self.properties.content_encoding.as_deref() {
            None => true,
            Some(enc) => enc.eq_ignore_ascii_case("utf-8") || enc.eq_ignore_ascii_case("utf8"),
        };
        if is_utf8 {
            self.decoded_text = std::str::from_utf8(&self.body).ok().map(str::to_owned);
        }
    }

    /// The body decoded as text, if the delivering channel had
    /// `auto_decode` enabled and the decode succeeded. `None` for
    /// binary payloads, a non-UTF-8 `content_encoding`, `auto_decode`
    /// disabled, or a `Message` built directly via `Message::new`.
    pub fn body_as_str(&self) -> Option<&str> {
        self.decoded_text.as_deref()
    }

    /// Acknowledge this message on its owning channel. A no-op (returns
    /// `Ok(())`) if the channel has since been dropped.
    pub fn ack(&self, multiple: bool) -> Result<()> {
        if let (Some(channel), Some(tag)) = (self.channel.upgrade(), self.delivery_tag()) {
            channel.basic_ack(tag, multiple)?;
        }
        Ok(())
    }

    pub fn reject(&self, requeue: bool) -> Result<()> {
        if let (Some(channel), Some(tag)) = (self.channel.upgrade(), self.delivery_tag()) {
            channel.basic_reject(tag, requeue)?;
        }
        Ok(())
    }

    pub fn nack(&self, multiple: bool, requeue: bool) -> Result<()> {
        if let (Some(channel), Some(tag)) = (self.channel.upgrade(), self.delivery_tag()) {
            channel.basic_nack(tag, multiple, requeue)?;
        }
        Ok(())
    }
}

/// A message the broker could not route, bounced back via `basic.return`.
#[derive(Debug, Clone)]
pub struct ReturnedMessage {
    pub reply_code: u16,
    pub reply_text: String,
    pub exchange: String,
    pub routing_key: String,
    pub message: Message,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_roundtrip_with_sparse_fields() {
        let props = BasicProperties::new()
            .with_content_type("text/plain")
            .with_delivery_mode(2)
            .with_correlation_id("abc-123");
        let bytes = props.encode().unwrap();
        let decoded = BasicProperties::decode(&bytes).unwrap();
        assert_eq!(props, decoded);
    }

    #[test]
    fn properties_roundtrip_with_all_fourteen_fields() {
        let mut headers = FieldTable::new();
        headers.insert("x", crate::types::AmqpValue::LongUInt(1));
        let props = BasicProperties {
            content_type: Some("application/json".into()),
            content_encoding: Some("utf-8".into()),
            headers: Some(headers),
            delivery_mode: Some(2),
            priority: Some(5),
            correlation_id: Some("c".into()),
            reply_to: Some("r".into()),
            expiration: Some("60000".into()),
            message_id: Some("m".into()),
            timestamp: Some(1_700_000_000),
            kind: Some("t".into()),
            user_id: Some("guest".into()),
            app_id: Some("app".into()),
            cluster_id: Some("cluster".into()),
        };
        let bytes = props.encode().unwrap();
        // All 14 properties fit in the 15 usable bits of a single flag word.
        assert_eq!(&bytes[0..2], &[0b1111_1111, 0b1111_1100][..]);
        let decoded = BasicProperties::decode(&bytes).unwrap();
        assert_eq!(props, decoded);
    }

    #[test]
    fn empty_properties_encode_to_a_single_zero_word() {
        let props = BasicProperties::new();
        let bytes = props.encode().unwrap();
        assert_eq!(bytes, vec![0, 0]);
    }
}
