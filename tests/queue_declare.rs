mod common;

use warren::method::{ChannelOpenOk, Method, QueueDeclareOk};

#[test]
fn queue_declare_round_trip() {
    let (port, handle) = common::spawn_broker(|mut stream| {
        let (_, open) = common::recv_method(&mut stream);
        assert!(matches!(open, Method::ChannelOpen(_)));
        common::send_method(&mut stream, 1, &Method::ChannelOpenOk(ChannelOpenOk));

        let (_, declare) = common::recv_method(&mut stream);
        match declare {
            Method::QueueDeclare(d) => assert_eq!(d.queue, "hello"),
            other => panic!("expected queue.declare, got {:?}", other),
        }
        common::send_method(
            &mut stream,
            1,
            &Method::QueueDeclareOk(QueueDeclareOk {
                queue: "hello".into(),
                message_count: 0,
                consumer_count: 0,
            }),
        );
    });

    let connection = warren::Connection::open(common::client_config(port)).unwrap();
    let channel = connection.channel().unwrap();
    let info = channel
        .queue_declare("hello", false, true, false, false, Default::default())
        .unwrap();
    assert_eq!(info.queue, "hello");
    assert_eq!(info.message_count, 0);

    drop(channel);
    drop(connection);
    handle.join().unwrap();
}
