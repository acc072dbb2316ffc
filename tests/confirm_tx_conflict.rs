mod common;

use warren::error::Error;
use warren::method::{ChannelOpenOk, ConfirmSelectOk, Method};
use warren::PublishMode;

#[test]
fn confirm_select_and_tx_select_are_mutually_exclusive() {
    let (port, handle) = common::spawn_broker(|mut stream| {
        let (_, open) = common::recv_method(&mut stream);
        assert!(matches!(open, Method::ChannelOpen(_)));
        common::send_method(&mut stream, 1, &Method::ChannelOpenOk(ChannelOpenOk));

        let (_, confirm) = common::recv_method(&mut stream);
        assert!(matches!(confirm, Method::ConfirmSelect(_)));
        common::send_method(&mut stream, 1, &Method::ConfirmSelectOk(ConfirmSelectOk));
    });

    let connection = warren::Connection::open(common::client_config(port)).unwrap();
    let channel = connection.channel().unwrap();

    channel.confirm_select().unwrap();
    assert_eq!(channel.mode(), PublishMode::Confirm);

    let err = channel.tx_select().unwrap_err();
    assert!(matches!(err, Error::PreconditionFailed { code: 406, .. }));
    assert_eq!(channel.mode(), PublishMode::Confirm);

    drop(channel);
    drop(connection);
    handle.join().unwrap();
}
