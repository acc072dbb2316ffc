mod common;

use warren::method::{BasicGetOk, ChannelOpenOk, Method};
use warren::BasicProperties;

#[test]
fn publish_then_get_round_trips_body_and_properties() {
    let (port, handle) = common::spawn_broker(|mut stream| {
        let (_, open) = common::recv_method(&mut stream);
        assert!(matches!(open, Method::ChannelOpen(_)));
        common::send_method(&mut stream, 1, &Method::ChannelOpenOk(ChannelOpenOk));

        let (_, publish) = common::recv_method(&mut stream);
        match publish {
            Method::BasicPublish(p) => assert_eq!(p.routing_key, "hello"),
            other => panic!("expected basic.publish, got {:?}", other),
        }
        let (properties, body) = common::recv_content(&mut stream);
        assert_eq!(properties.content_type.as_deref(), Some("text/plain"));
        assert_eq!(body, b"hi there");

        let (_, get) = common::recv_method(&mut stream);
        assert!(matches!(get, Method::BasicGet(_)));
        common::send_method(
            &mut stream,
            1,
            &Method::BasicGetOk(BasicGetOk {
                delivery_tag: 1,
                redelivered: false,
                exchange: "".into(),
                routing_key: "hello".into(),
                message_count: 0,
            }),
        );
        common::send_content(&mut stream, 1, 60, &properties, &body);
    });

    let connection = warren::Connection::open(common::client_config(port)).unwrap();
    let channel = connection.channel().unwrap();

    channel
        .basic_publish(
            "",
            "hello",
            false,
            false,
            BasicProperties::new().with_content_type("text/plain"),
            b"hi there",
        )
        .unwrap();

    let message = channel.basic_get("hello", true).unwrap().expect("a message should be waiting");
    assert_eq!(message.body, b"hi there");
    assert_eq!(message.properties.content_type.as_deref(), Some("text/plain"));
    assert_eq!(message.delivery_tag(), Some(1));

    drop(channel);
    drop(connection);
    handle.join().unwrap();
}
