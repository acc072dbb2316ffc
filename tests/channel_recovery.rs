mod common;

use warren::error::Error;
use warren::method::{ChannelClose, ChannelOpenOk, Method, QueueDeclareOk};

#[test]
fn channel_reopens_transparently_after_a_channel_level_error() {
    let (port, handle) = common::spawn_broker(|mut stream| {
        // First channel.open.
        let (_, open) = common::recv_method(&mut stream);
        assert!(matches!(open, Method::ChannelOpen(_)));
        common::send_method(&mut stream, 1, &Method::ChannelOpenOk(ChannelOpenOk));

        // queue.declare fails: broker closes the channel.
        let (_, declare) = common::recv_method(&mut stream);
        assert!(matches!(declare, Method::QueueDeclare(_)));
        common::send_method(
            &mut stream,
            1,
            &Method::ChannelClose(ChannelClose {
                reply_code: 404,
                reply_text: "NOT_FOUND - no queue 'missing'".into(),
                class_id: 50,
                method_id: 10,
            }),
        );
        let (_, close_ok) = common::recv_method(&mut stream);
        assert!(matches!(close_ok, Method::ChannelCloseOk(_)));

        // The next operation on the same `Channel` transparently reopens it.
        let (_, reopen) = common::recv_method(&mut stream);
        assert!(matches!(reopen, Method::ChannelOpen(_)));
        common::send_method(&mut stream, 1, &Method::ChannelOpenOk(ChannelOpenOk));

        let (_, declare_again) = common::recv_method(&mut stream);
        assert!(matches!(declare_again, Method::QueueDeclare(_)));
        common::send_method(
            &mut stream,
            1,
            &Method::QueueDeclareOk(QueueDeclareOk {
                queue: "missing".into(),
                message_count: 0,
                consumer_count: 0,
            }),
        );
    });

    let connection = warren::Connection::open(common::client_config(port)).unwrap();
    let channel = connection.channel().unwrap();

    let err = channel
        .queue_declare("missing", true, false, false, false, Default::default())
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { code: 404, .. }));

    let info = channel
        .queue_declare("missing", true, false, false, false, Default::default())
        .unwrap();
    assert_eq!(info.queue, "missing");

    drop(channel);
    drop(connection);
    handle.join().unwrap();
}
