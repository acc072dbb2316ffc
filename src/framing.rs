//! Turns the raw frame stream into complete [`Method`]s and back.
//!
//! A content-bearing method (`basic.publish`/`return`/`deliver`/`get-ok`)
//! spans a METHOD frame, a HEADER frame, and zero or more BODY frames;
//! [`MethodAssembler`] tracks that per-channel state machine, and
//! [`MethodEmitter`] is its mirror image for sending.

use std::collections::HashMap;
use std::convert::TryInto;

use crate::error::{Error, Result};
use crate::frame::{Frame, FrameType};
use crate::message::BasicProperties;
use crate::method::Method;
use crate::transport::TransportReader;
use crate::transport::TransportWriter;

/// An assembled inbound method, with its decoded content body attached
/// if it carried one.
#[derive(Debug, Clone)]
pub struct AssembledMethod {
    pub channel: u16,
    pub method: Method,
    pub content: Option<(BasicProperties, Vec<u8>)>,
}

#[derive(Debug)]
struct PartialContent {
    method: Method,
    class_id: u16,
    expected_body_size: u64,
    properties: Option<BasicProperties>,
    body: Vec<u8>,
}

/// Collects frames for every channel into complete methods.
///
/// Per spec this tracks one "expected next frame type" per channel,
/// defaulting to METHOD; receiving a content-bearing method switches
/// that channel to expect HEADER, then BODY frames until the declared
/// body size has been read.
#[derive(Default)]
pub struct MethodAssembler {
    pending: HashMap<u16, PartialContent>,
}

pub enum AssembleOutcome {
    Complete(AssembledMethod),
    Heartbeat,
    NeedMoreFrames,
}

impl MethodAssembler {
    pub fn new() -> Self {
        MethodAssembler {
            pending: HashMap::new(),
        }
    }

    /// Feed one frame in; returns a complete method once all its frames
    /// have arrived, or `NeedMoreFrames` if the channel's content
    /// assembly is still in progress.
    pub fn feed(&mut self, frame: Frame) -> Result<AssembleOutcome> {
        match frame.frame_type {
            FrameType::Heartbeat => Ok(AssembleOutcome::Heartbeat),
            FrameType::Method => {
                if frame.payload.len() < 4 {
                    return Err(Error::FrameSyntaxError {
                        code: 502,
                        text: "method frame payload shorter than class_id+method_id".into(),
                        method: None,
                    });
                }
                let class_id = u16::from_be_bytes([frame.payload[0], frame.payload[1]]);
                let method_id = u16::from_be_bytes([frame.payload[2], frame.payload[3]]);
                let method = Method::decode(class_id, method_id, &frame.payload[4..])?;

                if method.is_content_bearing() {
                    self.pending.insert(
                        frame.channel,
                        PartialContent {
                            method,
                            class_id,
                            expected_body_size: 0,
                            properties: None,
                            body: Vec::new(),
                        },
                    );
                    Ok(AssembleOutcome::NeedMoreFrames)
                } else {
                    Ok(AssembleOutcome::Complete(AssembledMethod {
                        channel: frame.channel,
                        method,
                        content: None,
                    }))
                }
            }
            FrameType::Header => {
                let partial = self.pending.get_mut(&frame.channel).ok_or_else(|| Error::UnexpectedFrame {
                    code: 505,
                    text: format!("unexpected header frame on channel {}", frame.channel),
                    method: None,
                })?;
                if frame.payload.len() < 12 {
                    return Err(Error::FrameSyntaxError {
                        code: 502,
                        text: "header frame payload too short".into(),
                        method: None,
                    });
                }
                let header_class_id = u16::from_be_bytes([frame.payload[0], frame.payload[1]]);
                if header_class_id != partial.class_id {
                    return Err(Error::UnexpectedFrame {
                        code: 505,
                        text: "header frame class_id does not match the preceding method".into(),
                        method: None,
                    });
                }
                let body_size = u64::from_be_bytes(frame.payload[4..12].try_into().unwrap());
                let properties = BasicProperties::decode(&frame.payload[12..])?;
                partial.expected_body_size = body_size;
                partial.properties = Some(properties);

                if body_size == 0 {
                    let partial = self.pending.remove(&frame.channel).unwrap();
                    Ok(AssembleOutcome::Complete(AssembledMethod {
                        channel: frame.channel,
                        method: partial.method,
                        content: Some((partial.properties.unwrap(), partial.body)),
                    }))
                } else {
                    Ok(AssembleOutcome::NeedMoreFrames)
                }
            }
            FrameType::Body => {
                let partial = self.pending.get_mut(&frame.channel).ok_or_else(|| Error::UnexpectedFrame {
                    code: 505,
                    text: format!("unexpected body frame on channel {}", frame.channel),
                    method: None,
                })?;
                partial.body.extend_from_slice(&frame.payload);
                if partial.body.len() as u64 >= partial.expected_body_size {
                    let partial = self.pending.remove(&frame.channel).unwrap();
                    Ok(AssembleOutcome::Complete(AssembledMethod {
                        channel: frame.channel,
                        method: partial.method,
                        content: Some((partial.properties.unwrap(), partial.body)),
                    }))
                } else {
                    Ok(AssembleOutcome::NeedMoreFrames)
                }
            }
        }
    }

    /// Read frames from the transport until one complete method (or a
    /// heartbeat) has been assembled. Callers hold the frame-read lock
    /// for the duration of this call.
    pub fn read_method(&mut self, reader: &mut TransportReader) -> Result<Option<AssembledMethod>> {
        loop {
            let frame = reader.read_frame()?;
            match self.feed(frame)? {
                AssembleOutcome::Complete(m) => return Ok(Some(m)),
                AssembleOutcome::Heartbeat => return Ok(None),
                AssembleOutcome::NeedMoreFrames => continue,
            }
        }
    }
}

/// Splits a method (plus optional content) into ordered frames and
/// writes them to the transport without interleaving.
pub struct MethodEmitter;

impl MethodEmitter {
    /// `frame_max - 8` matches the source library's chunk size: the
    /// frame header/terminator overhead the broker accounts for when it
    /// advertises `frame_max`.
    fn chunk_size(frame_max: u32) -> usize {
        (frame_max as usize).saturating_sub(8).max(1)
    }

    /// Callers hold the frame-write lock for the duration of this call so
    /// a method's frames never interleave with another channel's.
    pub fn write_method(
        writer: &mut TransportWriter,
        channel: u16,
        method: &Method,
        content: Option<(&BasicProperties, &[u8])>,
        frame_max: u32,
    ) -> Result<()> {
        let kind = method.kind();
        let mut payload = Vec::with_capacity(4);
        payload.extend_from_slice(&kind.class_id.to_be_bytes());
        payload.extend_from_slice(&kind.method_id.to_be_bytes());
        payload.extend_from_slice(&method.encode_args()?);
        writer.write_frame(&Frame::new(FrameType::Method, channel, payload))?;

        if let Some((properties, body)) = content {
            let mut header_payload = Vec::new();
            header_payload.extend_from_slice(&kind.class_id.to_be_bytes());
            header_payload.extend_from_slice(&0u16.to_be_bytes()); // weight, always 0
            header_payload.extend_from_slice(&(body.len() as u64).to_be_bytes());
            header_payload.extend_from_slice(&properties.encode()?);
            writer.write_frame(&Frame::new(FrameType::Header, channel, header_payload))?;

            let chunk_size = Self::chunk_size(frame_max);
            for chunk in body.chunks(chunk_size) {
                writer.write_frame(&Frame::new(FrameType::Body, channel, chunk.to_vec()))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::{BasicPublish, QueueDeclareOk};

    #[test]
    fn non_content_method_assembles_immediately() {
        let method = Method::QueueDeclareOk(QueueDeclareOk {
            queue: "q".into(),
            message_count: 0,
            consumer_count: 0,
        });
        let mut payload = Vec::new();
        let kind = method.kind();
        payload.extend_from_slice(&kind.class_id.to_be_bytes());
        payload.extend_from_slice(&kind.method_id.to_be_bytes());
        payload.extend_from_slice(&method.encode_args().unwrap());

        let mut assembler = MethodAssembler::new();
        let outcome = assembler
            .feed(Frame::new(FrameType::Method, 1, payload))
            .unwrap();
        match outcome {
            AssembleOutcome::Complete(m) => {
                assert_eq!(m.channel, 1);
                assert!(m.content.is_none());
            }
            _ => panic!("expected immediate completion"),
        }
    }

    #[test]
    fn content_bearing_method_waits_for_header_and_body() {
        let method = Method::BasicPublish(BasicPublish {
            exchange: "".into(),
            routing_key: "k".into(),
            mandatory: false,
            immediate: false,
        });
        let kind = method.kind();
        let mut method_payload = Vec::new();
        method_payload.extend_from_slice(&kind.class_id.to_be_bytes());
        method_payload.extend_from_slice(&kind.method_id.to_be_bytes());
        method_payload.extend_from_slice(&method.encode_args().unwrap());

        let mut assembler = MethodAssembler::new();
        let outcome = assembler.feed(Frame::new(FrameType::Method, 1, method_payload)).unwrap();
        assert!(matches!(outcome, AssembleOutcome::NeedMoreFrames));

        let body = b"hello world".to_vec();
        let props = BasicProperties::new().with_content_type("text/plain");
        let mut header_payload = Vec::new();
        header_payload.extend_from_slice(&60u16.to_be_bytes());
        header_payload.extend_from_slice(&0u16.to_be_bytes());
        header_payload.extend_from_slice(&(body.len() as u64).to_be_bytes());
        header_payload.extend_from_slice(&props.encode().unwrap());
        let outcome = assembler.feed(Frame::new(FrameType::Header, 1, header_payload)).unwrap();
        assert!(matches!(outcome, AssembleOutcome::NeedMoreFrames));

        let outcome = assembler.feed(Frame::new(FrameType::Body, 1, body.clone())).unwrap();
        match outcome {
            AssembleOutcome::Complete(m) => {
                let (decoded_props, decoded_body) = m.content.unwrap();
                assert_eq!(decoded_body, body);
                assert_eq!(decoded_props.content_type.as_deref(), Some("text/plain"));
            }
            _ => panic!("expected completion after body frame"),
        }
    }

    #[test]
    fn chunk_size_matches_frame_max_minus_eight() {
        assert_eq!(MethodEmitter::chunk_size(4096), 4088);
    }
}
