//! A hermetic, in-process stand-in for a broker: binds a loopback
//! listener, speaks just enough of the handshake to get a real
//! `Connection` open, then hands the raw socket to the test for the
//! scenario-specific remainder of the conversation.

use std::convert::TryInto;
use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

use warren::frame::{read_frame, write_frame, Frame, FrameType};
use warren::message::BasicProperties;
use warren::method::{ConnectionOpenOk, ConnectionStart, ConnectionTune, Method};
use warren::types::FieldTable;

pub fn send_method(stream: &mut TcpStream, channel: u16, method: &Method) {
    let kind = method.kind();
    let mut payload = Vec::with_capacity(4);
    payload.extend_from_slice(&kind.class_id.to_be_bytes());
    payload.extend_from_slice(&kind.method_id.to_be_bytes());
    payload.extend_from_slice(&method.encode_args().unwrap());
    write_frame(stream, &Frame::new(FrameType::Method, channel, payload)).unwrap();
}

pub fn recv_method(stream: &mut TcpStream) -> (u16, Method) {
    let frame = read_frame(stream).unwrap();
    assert_eq!(frame.frame_type, FrameType::Method);
    let class_id = u16::from_be_bytes([frame.payload[0], frame.payload[1]]);
    let method_id = u16::from_be_bytes([frame.payload[2], frame.payload[3]]);
    let method = Method::decode(class_id, method_id, &frame.payload[4..]).unwrap();
    (frame.channel, method)
}

pub fn send_content(stream: &mut TcpStream, channel: u16, class_id: u16, properties: &BasicProperties, body: &[u8]) {
    let mut header_payload = Vec::new();
    header_payload.extend_from_slice(&class_id.to_be_bytes());
    header_payload.extend_from_slice(&0u16.to_be_bytes());
    header_payload.extend_from_slice(&(body.len() as u64).to_be_bytes());
    header_payload.extend_from_slice(&properties.encode().unwrap());
    write_frame(stream, &Frame::new(FrameType::Header, channel, header_payload)).unwrap();
    if !body.is_empty() {
        write_frame(stream, &Frame::new(FrameType::Body, channel, body.to_vec())).unwrap();
    }
}

pub fn recv_content(stream: &mut TcpStream) -> (BasicProperties, Vec<u8>) {
    let header = read_frame(stream).unwrap();
    assert_eq!(header.frame_type, FrameType::Header);
    let body_size = u64::from_be_bytes(header.payload[4..12].try_into().unwrap());
    let properties = BasicProperties::decode(&header.payload[12..]).unwrap();
    let mut body = Vec::new();
    while (body.len() as u64) < body_size {
        let frame = read_frame(stream).unwrap();
        assert_eq!(frame.frame_type, FrameType::Body);
        body.extend_from_slice(&frame.payload);
    }
    (properties, body)
}

/// Accept one connection, run the handshake as the broker side (no
/// heartbeat, so the test doesn't have to race a background thread),
/// then hand the socket to `script` for the rest of the conversation.
pub fn spawn_broker<F>(script: F) -> (u16, JoinHandle<()>)
where
    F: FnOnce(TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();

        let mut header = [0u8; 8];
        stream.read_exact(&mut header).unwrap();
        assert_eq!(&header, b"AMQP\x00\x00\x09\x01");

        send_method(
            &mut stream,
            0,
            &Method::ConnectionStart(ConnectionStart {
                version_major: 0,
                version_minor: 9,
                server_properties: FieldTable::new(),
                mechanisms: "PLAIN AMQPLAIN".into(),
                locales: "en_US".into(),
            }),
        );
        let (_, start_ok) = recv_method(&mut stream);
        assert!(matches!(start_ok, Method::ConnectionStartOk(_)));

        send_method(
            &mut stream,
            0,
            &Method::ConnectionTune(ConnectionTune {
                channel_max: 2047,
                frame_max: 131072,
                heartbeat: 0,
            }),
        );
        let (_, tune_ok) = recv_method(&mut stream);
        assert!(matches!(tune_ok, Method::ConnectionTuneOk(_)));

        let (_, open) = recv_method(&mut stream);
        assert!(matches!(open, Method::ConnectionOpen(_)));
        send_method(&mut stream, 0, &Method::ConnectionOpenOk(ConnectionOpenOk));

        script(stream);
    });
    (port, handle)
}

pub fn client_config(port: u16) -> warren::ConnectionConfig {
    warren::ConnectionConfig::new()
        .host("127.0.0.1")
        .port(port)
        .auto_heartbeat(false)
}
