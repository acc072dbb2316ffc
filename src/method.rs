//! The AMQP 0.9.1 method registry: every `(class_id, method_id)` pair
//! this client speaks, its typed argument list, and the encode/decode
//! between that argument list and a METHOD frame payload.

use crate::codec::{Decoder, Encoder};
use crate::error::{Error, Result};
use crate::types::FieldTable;

/// A bare `(class_id, method_id)` tag, used in error reporting and by
/// the allowed-method sets RPC waits are built from, without forcing
/// callers to carry a fully decoded [`Method`] around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodKind {
    pub class_id: u16,
    pub method_id: u16,
}

impl MethodKind {
    pub const fn new(class_id: u16, method_id: u16) -> Self {
        MethodKind { class_id, method_id }
    }
}

macro_rules! method_kinds {
    ($($name:ident = ($class:expr, $id:expr)),* $(,)?) => {
        impl MethodKind {
            $(pub const $name: MethodKind = MethodKind::new($class, $id);)*
        }
    };
}

method_kinds! {
    CONNECTION_START = (10, 10),
    CONNECTION_START_OK = (10, 11),
    CONNECTION_SECURE = (10, 20),
    CONNECTION_SECURE_OK = (10, 21),
    CONNECTION_TUNE = (10, 30),
    CONNECTION_TUNE_OK = (10, 31),
    CONNECTION_OPEN = (10, 40),
    CONNECTION_OPEN_OK = (10, 41),
    CONNECTION_CLOSE = (10, 50),
    CONNECTION_CLOSE_OK = (10, 51),
    CONNECTION_BLOCKED = (10, 60),
    CONNECTION_UNBLOCKED = (10, 61),
    CHANNEL_OPEN = (20, 10),
    CHANNEL_OPEN_OK = (20, 11),
    CHANNEL_FLOW = (20, 20),
    CHANNEL_FLOW_OK = (20, 21),
    CHANNEL_CLOSE = (20, 40),
    CHANNEL_CLOSE_OK = (20, 41),
    EXCHANGE_DECLARE = (40, 10),
    EXCHANGE_DECLARE_OK = (40, 11),
    EXCHANGE_DELETE = (40, 20),
    EXCHANGE_DELETE_OK = (40, 21),
    EXCHANGE_BIND = (40, 30),
    EXCHANGE_BIND_OK = (40, 31),
    EXCHANGE_UNBIND = (40, 40),
    EXCHANGE_UNBIND_OK = (40, 51),
    QUEUE_DECLARE = (50, 10),
    QUEUE_DECLARE_OK = (50, 11),
    QUEUE_BIND = (50, 20),
    QUEUE_BIND_OK = (50, 21),
    QUEUE_PURGE = (50, 30),
    QUEUE_PURGE_OK = (50, 31),
    QUEUE_DELETE = (50, 40),
    QUEUE_DELETE_OK = (50, 41),
    QUEUE_UNBIND = (50, 50),
    QUEUE_UNBIND_OK = (50, 51),
    BASIC_QOS = (60, 10),
    BASIC_QOS_OK = (60, 11),
    BASIC_CONSUME = (60, 20),
    BASIC_CONSUME_OK = (60, 21),
    BASIC_CANCEL = (60, 30),
    BASIC_CANCEL_OK = (60, 31),
    BASIC_PUBLISH = (60, 40),
    BASIC_RETURN = (60, 50),
    BASIC_DELIVER = (60, 60),
    BASIC_GET = (60, 70),
    BASIC_GET_OK = (60, 71),
    BASIC_GET_EMPTY = (60, 72),
    BASIC_ACK = (60, 80),
    BASIC_REJECT = (60, 90),
    BASIC_RECOVER_ASYNC = (60, 100),
    BASIC_RECOVER = (60, 110),
    BASIC_RECOVER_OK = (60, 111),
    BASIC_NACK = (60, 120),
    TX_SELECT = (90, 10),
    TX_SELECT_OK = (90, 11),
    TX_COMMIT = (90, 20),
    TX_COMMIT_OK = (90, 21),
    TX_ROLLBACK = (90, 30),
    TX_ROLLBACK_OK = (90, 31),
    CONFIRM_SELECT = (85, 10),
    CONFIRM_SELECT_OK = (85, 11),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionStart {
    pub version_major: u8,
    pub version_minor: u8,
    pub server_properties: FieldTable,
    pub mechanisms: String,
    pub locales: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionStartOk {
    pub client_properties: FieldTable,
    pub mechanism: String,
    pub response: String,
    pub locale: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionSecure {
    pub challenge: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionSecureOk {
    pub response: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConnectionTune {
    pub channel_max: u16,
    pub frame_max: u32,
    pub heartbeat: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConnectionTuneOk {
    pub channel_max: u16,
    pub frame_max: u32,
    pub heartbeat: u16,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionOpen {
    pub virtual_host: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionOpenOk;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionClose {
    pub reply_code: u16,
    pub reply_text: String,
    pub class_id: u16,
    pub method_id: u16,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionCloseOk;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionBlocked {
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionUnblocked;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelOpen;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelOpenOk;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelFlow {
    pub active: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelFlowOk {
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelClose {
    pub reply_code: u16,
    pub reply_text: String,
    pub class_id: u16,
    pub method_id: u16,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelCloseOk;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeDeclare {
    pub exchange: String,
    pub kind: String,
    pub passive: bool,
    pub durable: bool,
    pub auto_delete: bool,
    pub internal: bool,
    pub no_wait: bool,
    pub arguments: FieldTable,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeDeclareOk;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeDelete {
    pub exchange: String,
    pub if_unused: bool,
    pub no_wait: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeDeleteOk;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeBind {
    pub destination: String,
    pub source: String,
    pub routing_key: String,
    pub no_wait: bool,
    pub arguments: FieldTable,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeBindOk;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeUnbind {
    pub destination: String,
    pub source: String,
    pub routing_key: String,
    pub no_wait: bool,
    pub arguments: FieldTable,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeUnbindOk;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueDeclare {
    pub queue: String,
    pub passive: bool,
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
    pub no_wait: bool,
    pub arguments: FieldTable,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueDeclareOk {
    pub queue: String,
    pub message_count: u32,
    pub consumer_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueBind {
    pub queue: String,
    pub exchange: String,
    pub routing_key: String,
    pub no_wait: bool,
    pub arguments: FieldTable,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueBindOk;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueUnbind {
    pub queue: String,
    pub exchange: String,
    pub routing_key: String,
    pub arguments: FieldTable,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueUnbindOk;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueuePurge {
    pub queue: String,
    pub no_wait: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueuePurgeOk {
    pub message_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueDelete {
    pub queue: String,
    pub if_unused: bool,
    pub if_empty: bool,
    pub no_wait: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueueDeleteOk {
    pub message_count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BasicQos {
    pub prefetch_size: u32,
    pub prefetch_count: u16,
    pub global: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicQosOk;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicConsume {
    pub queue: String,
    pub consumer_tag: String,
    pub no_local: bool,
    pub no_ack: bool,
    pub exclusive: bool,
    pub no_wait: bool,
    pub arguments: FieldTable,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicConsumeOk {
    pub consumer_tag: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicCancel {
    pub consumer_tag: String,
    pub no_wait: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicCancelOk {
    pub consumer_tag: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicPublish {
    pub exchange: String,
    pub routing_key: String,
    pub mandatory: bool,
    pub immediate: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicReturn {
    pub reply_code: u16,
    pub reply_text: String,
    pub exchange: String,
    pub routing_key: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicDeliver {
    pub consumer_tag: String,
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub exchange: String,
    pub routing_key: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicGet {
    pub queue: String,
    pub no_ack: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicGetOk {
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub exchange: String,
    pub routing_key: String,
    pub message_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicGetEmpty;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BasicAck {
    pub delivery_tag: u64,
    pub multiple: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BasicReject {
    pub delivery_tag: u64,
    pub requeue: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BasicRecoverAsync {
    pub requeue: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BasicRecover {
    pub requeue: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicRecoverOk;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BasicNack {
    pub delivery_tag: u64,
    pub multiple: bool,
    pub requeue: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxSelect;
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxSelectOk;
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxCommit;
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxCommitOk;
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxRollback;
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxRollbackOk;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfirmSelect {
    pub no_wait: bool,
}
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfirmSelectOk;

/// One fully decoded AMQP method and its typed arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Method {
    ConnectionStart(ConnectionStart),
    ConnectionStartOk(ConnectionStartOk),
    ConnectionSecure(ConnectionSecure),
    ConnectionSecureOk(ConnectionSecureOk),
    ConnectionTune(ConnectionTune),
    ConnectionTuneOk(ConnectionTuneOk),
    ConnectionOpen(ConnectionOpen),
    ConnectionOpenOk(ConnectionOpenOk),
    ConnectionClose(ConnectionClose),
    ConnectionCloseOk(ConnectionCloseOk),
    ConnectionBlocked(ConnectionBlocked),
    ConnectionUnblocked(ConnectionUnblocked),
    ChannelOpen(ChannelOpen),
    ChannelOpenOk(ChannelOpenOk),
    ChannelFlow(ChannelFlow),
    ChannelFlowOk(ChannelFlowOk),
    ChannelClose(ChannelClose),
    ChannelCloseOk(ChannelCloseOk),
    ExchangeDeclare(ExchangeDeclare),
    ExchangeDeclareOk(ExchangeDeclareOk),
    ExchangeDelete(ExchangeDelete),
    ExchangeDeleteOk(ExchangeDeleteOk),
    ExchangeBind(ExchangeBind),
    ExchangeBindOk(ExchangeBindOk),
    ExchangeUnbind(ExchangeUnbind),
    ExchangeUnbindOk(ExchangeUnbindOk),
    QueueDeclare(QueueDeclare),
    QueueDeclareOk(QueueDeclareOk),
    QueueBind(QueueBind),
    QueueBindOk(QueueBindOk),
    QueueUnbind(QueueUnbind),
    QueueUnbindOk(QueueUnbindOk),
    QueuePurge(QueuePurge),
    QueuePurgeOk(QueuePurgeOk),
    QueueDelete(QueueDelete),
    QueueDeleteOk(QueueDeleteOk),
    BasicQos(BasicQos),
    BasicQosOk(BasicQosOk),
    BasicConsume(BasicConsume),
    BasicConsumeOk(BasicConsumeOk),
    BasicCancel(BasicCancel),
    BasicCancelOk(BasicCancelOk),
    BasicPublish(BasicPublish),
    BasicReturn(BasicReturn),
    BasicDeliver(BasicDeliver),
    BasicGet(BasicGet),
    BasicGetOk(BasicGetOk),
    BasicGetEmpty(BasicGetEmpty),
    BasicAck(BasicAck),
    BasicReject(BasicReject),
    BasicRecoverAsync(BasicRecoverAsync),
    BasicRecover(BasicRecover),
    BasicRecoverOk(BasicRecoverOk),
    BasicNack(BasicNack),
    TxSelect(TxSelect),
    TxSelectOk(TxSelectOk),
    TxCommit(TxCommit),
    TxCommitOk(TxCommitOk),
    TxRollback(TxRollback),
    TxRollbackOk(TxRollbackOk),
    ConfirmSelect(ConfirmSelect),
    ConfirmSelectOk(ConfirmSelectOk),
}

impl Method {
    pub fn kind(&self) -> MethodKind {
        use Method::*;
        match self {
            ConnectionStart(_) => MethodKind::CONNECTION_START,
            ConnectionStartOk(_) => MethodKind::CONNECTION_START_OK,
            ConnectionSecure(_) => MethodKind::CONNECTION_SECURE,
            ConnectionSecureOk(_) => MethodKind::CONNECTION_SECURE_OK,
            ConnectionTune(_) => MethodKind::CONNECTION_TUNE,
            ConnectionTuneOk(_) => MethodKind::CONNECTION_TUNE_OK,
            ConnectionOpen(_) => MethodKind::CONNECTION_OPEN,
            ConnectionOpenOk(_) => MethodKind::CONNECTION_OPEN_OK,
            ConnectionClose(_) => MethodKind::CONNECTION_CLOSE,
            ConnectionCloseOk(_) => MethodKind::CONNECTION_CLOSE_OK,
            ConnectionBlocked(_) => MethodKind::CONNECTION_BLOCKED,
            ConnectionUnblocked(_) => MethodKind::CONNECTION_UNBLOCKED,
            ChannelOpen(_) => MethodKind::CHANNEL_OPEN,
            ChannelOpenOk(_) => MethodKind::CHANNEL_OPEN_OK,
            ChannelFlow(_) => MethodKind::CHANNEL_FLOW,
            ChannelFlowOk(_) => MethodKind::CHANNEL_FLOW_OK,
            ChannelClose(_) => MethodKind::CHANNEL_CLOSE,
            ChannelCloseOk(_) => MethodKind::CHANNEL_CLOSE_OK,
            ExchangeDeclare(_) => MethodKind::EXCHANGE_DECLARE,
            ExchangeDeclareOk(_) => MethodKind::EXCHANGE_DECLARE_OK,
            ExchangeDelete(_) => MethodKind::EXCHANGE_DELETE,
            ExchangeDeleteOk(_) => MethodKind::EXCHANGE_DELETE_OK,
            ExchangeBind(_) => MethodKind::EXCHANGE_BIND,
            ExchangeBindOk(_) => MethodKind::EXCHANGE_BIND_OK,
            ExchangeUnbind(_) => MethodKind::EXCHANGE_UNBIND,
            ExchangeUnbindOk(_) => MethodKind::EXCHANGE_UNBIND_OK,
            QueueDeclare(_) => MethodKind::QUEUE_DECLARE,
            QueueDeclareOk(_) => MethodKind::QUEUE_DECLARE_OK,
            QueueBind(_) => MethodKind::QUEUE_BIND,
            QueueBindOk(_) => MethodKind::QUEUE_BIND_OK,
            QueueUnbind(_) => MethodKind::QUEUE_UNBIND,
            QueueUnbindOk(_) => MethodKind::QUEUE_UNBIND_OK,
            QueuePurge(_) => MethodKind::QUEUE_PURGE,
            QueuePurgeOk(_) => MethodKind::QUEUE_PURGE_OK,
            QueueDelete(_) => MethodKind::QUEUE_DELETE,
            QueueDeleteOk(_) => MethodKind::QUEUE_DELETE_OK,
            BasicQos(_) => MethodKind::BASIC_QOS,
            BasicQosOk(_) => MethodKind::BASIC_QOS_OK,
            BasicConsume(_) => MethodKind::BASIC_CONSUME,
            BasicConsumeOk(_) => MethodKind::BASIC_CONSUME_OK,
            BasicCancel(_) => MethodKind::BASIC_CANCEL,
            BasicCancelOk(_) => MethodKind::BASIC_CANCEL_OK,
            BasicPublish(_) => MethodKind::BASIC_PUBLISH,
            BasicReturn(_) => MethodKind::BASIC_RETURN,
            BasicDeliver(_) => MethodKind::BASIC_DELIVER,
            BasicGet(_) => MethodKind::BASIC_GET,
            BasicGetOk(_) => MethodKind::BASIC_GET_OK,
            BasicGetEmpty(_) => MethodKind::BASIC_GET_EMPTY,
            BasicAck(_) => MethodKind::BASIC_ACK,
            BasicReject(_) => MethodKind::BASIC_REJECT,
            BasicRecoverAsync(_) => MethodKind::BASIC_RECOVER_ASYNC,
            BasicRecover(_) => MethodKind::BASIC_RECOVER,
            BasicRecoverOk(_) => MethodKind::BASIC_RECOVER_OK,
            BasicNack(_) => MethodKind::BASIC_NACK,
            TxSelect(_) => MethodKind::TX_SELECT,
            TxSelectOk(_) => MethodKind::TX_SELECT_OK,
            TxCommit(_) => MethodKind::TX_COMMIT,
            TxCommitOk(_) => MethodKind::TX_COMMIT_OK,
            TxRollback(_) => MethodKind::TX_ROLLBACK,
            TxRollbackOk(_) => MethodKind::TX_ROLLBACK_OK,
            ConfirmSelect(_) => MethodKind::CONFIRM_SELECT,
            ConfirmSelectOk(_) => MethodKind::CONFIRM_SELECT_OK,
        }
    }

    /// Methods that carry a content body (header frame + 0 or more body frames).
    pub fn is_content_bearing(&self) -> bool {
        matches!(
            self,
            Method::BasicPublish(_) | Method::BasicReturn(_) | Method::BasicDeliver(_) | Method::BasicGetOk(_)
        )
    }

    pub fn encode_args(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        {
            let mut enc = Encoder::new(&mut buf);
            use Method::*;
            match self {
                ConnectionStart(a) => {
                    enc.write_octet(a.version_major)?;
                    enc.write_octet(a.version_minor)?;
                    enc.write_table(&a.server_properties)?;
                    enc.write_longstr(&a.mechanisms)?;
                    enc.write_longstr(&a.locales)?;
                }
                ConnectionStartOk(a) => {
                    enc.write_table(&a.client_properties)?;
                    enc.write_shortstr(&a.mechanism)?;
                    enc.write_longstr(&a.response)?;
                    enc.write_shortstr(&a.locale)?;
                }
                ConnectionSecure(a) => enc.write_longstr(&a.challenge)?,
                ConnectionSecureOk(a) => enc.write_longstr(&a.response)?,
                ConnectionTune(a) => {
                    enc.write_short(a.channel_max)?;
                    enc.write_long(a.frame_max)?;
                    enc.write_short(a.heartbeat)?;
                }
                ConnectionTuneOk(a) => {
                    enc.write_short(a.channel_max)?;
                    enc.write_long(a.frame_max)?;
                    enc.write_short(a.heartbeat)?;
                }
                ConnectionOpen(a) => {
                    enc.write_shortstr(&a.virtual_host)?;
                    enc.write_shortstr("")?; // reserved: capabilities
                    enc.write_bit(false)?; // reserved: insist
                }
                ConnectionOpenOk(_) => enc.write_shortstr("")?, // reserved: known-hosts
                ConnectionClose(a) => {
                    enc.write_short(a.reply_code)?;
                    enc.write_shortstr(&a.reply_text)?;
                    enc.write_short(a.class_id)?;
                    enc.write_short(a.method_id)?;
                }
                ConnectionCloseOk(_) => {}
                ConnectionBlocked(a) => enc.write_shortstr(&a.reason)?,
                ConnectionUnblocked(_) => {}
                ChannelOpen(_) => enc.write_shortstr("")?, // reserved: out-of-band
                ChannelOpenOk(_) => enc.write_longstr("")?, // reserved: channel-id
                ChannelFlow(a) => enc.write_bit(a.active)?,
                ChannelFlowOk(a) => enc.write_bit(a.active)?,
                ChannelClose(a) => {
                    enc.write_short(a.reply_code)?;
                    enc.write_shortstr(&a.reply_text)?;
                    enc.write_short(a.class_id)?;
                    enc.write_short(a.method_id)?;
                }
                ChannelCloseOk(_) => {}
                ExchangeDeclare(a) => {
                    enc.write_short(0)?; // reserved-1
                    enc.write_shortstr(&a.exchange)?;
                    enc.write_shortstr(&a.kind)?;
                    enc.write_bit(a.passive)?;
                    enc.write_bit(a.durable)?;
                    enc.write_bit(a.auto_delete)?;
                    enc.write_bit(a.internal)?;
                    enc.write_bit(a.no_wait)?;
                    enc.write_table(&a.arguments)?;
                }
                ExchangeDeclareOk(_) => {}
                ExchangeDelete(a) => {
                    enc.write_short(0)?;
                    enc.write_shortstr(&a.exchange)?;
                    enc.write_bit(a.if_unused)?;
                    enc.write_bit(a.no_wait)?;
                }
                ExchangeDeleteOk(_) => {}
                ExchangeBind(a) => {
                    enc.write_short(0)?;
                    enc.write_shortstr(&a.destination)?;
                    enc.write_shortstr(&a.source)?;
                    enc.write_shortstr(&a.routing_key)?;
                    enc.write_bit(a.no_wait)?;
                    enc.write_table(&a.arguments)?;
                }
                ExchangeBindOk(_) => {}
                ExchangeUnbind(a) => {
                    enc.write_short(0)?;
                    enc.write_shortstr(&a.destination)?;
                    enc.write_shortstr(&a.source)?;
                    enc.write_shortstr(&a.routing_key)?;
                    enc.write_bit(a.no_wait)?;
                    enc.write_table(&a.arguments)?;
                }
                ExchangeUnbindOk(_) => {}
                QueueDeclare(a) => {
                    enc.write_short(0)?;
                    enc.write_shortstr(&a.queue)?;
                    enc.write_bit(a.passive)?;
                    enc.write_bit(a.durable)?;
                    enc.write_bit(a.exclusive)?;
                    enc.write_bit(a.auto_delete)?;
                    enc.write_bit(a.no_wait)?;
                    enc.write_table(&a.arguments)?;
                }
                QueueDeclareOk(a) => {
                    enc.write_shortstr(&a.queue)?;
                    enc.write_long(a.message_count)?;
                    enc.write_long(a.consumer_count)?;
                }
                QueueBind(a) => {
                    enc.write_short(0)?;
                    enc.write_shortstr(&a.queue)?;
                    enc.write_shortstr(&a.exchange)?;
                    enc.write_shortstr(&a.routing_key)?;
                    enc.write_bit(a.no_wait)?;
                    enc.write_table(&a.arguments)?;
                }
                QueueBindOk(_) => {}
                QueueUnbind(a) => {
                    enc.write_short(0)?;
                    enc.write_shortstr(&a.queue)?;
                    enc.write_shortstr(&a.exchange)?;
                    enc.write_shortstr(&a.routing_key)?;
                    enc.write_table(&a.arguments)?;
                }
                QueueUnbindOk(_) => {}
                QueuePurge(a) => {
                    enc.write_short(0)?;
                    enc.write_shortstr(&a.queue)?;
                    enc.write_bit(a.no_wait)?;
                }
                QueuePurgeOk(a) => enc.write_long(a.message_count)?,
                QueueDelete(a) => {
                    enc.write_short(0)?;
                    enc.write_shortstr(&a.queue)?;
                    enc.write_bit(a.if_unused)?;
                    enc.write_bit(a.if_empty)?;
                    enc.write_bit(a.no_wait)?;
                }
                QueueDeleteOk(a) => enc.write_long(a.message_count)?,
                BasicQos(a) => {
                    enc.write_long(a.prefetch_size)?;
                    enc.write_short(a.prefetch_count)?;
                    enc.write_bit(a.global)?;
                }
                BasicQosOk(_) => {}
                BasicConsume(a) => {
                    enc.write_short(0)?;
                    enc.write_shortstr(&a.queue)?;
                    enc.write_shortstr(&a.consumer_tag)?;
                    enc.write_bit(a.no_local)?;
                    enc.write_bit(a.no_ack)?;
                    enc.write_bit(a.exclusive)?;
                    enc.write_bit(a.no_wait)?;
                    enc.write_table(&a.arguments)?;
                }
                BasicConsumeOk(a) => enc.write_shortstr(&a.consumer_tag)?,
                BasicCancel(a) => {
                    enc.write_shortstr(&a.consumer_tag)?;
                    enc.write_bit(a.no_wait)?;
                }
                BasicCancelOk(a) => enc.write_shortstr(&a.consumer_tag)?,
                BasicPublish(a) => {
                    enc.write_short(0)?;
                    enc.write_shortstr(&a.exchange)?;
                    enc.write_shortstr(&a.routing_key)?;
                    enc.write_bit(a.mandatory)?;
                    enc.write_bit(a.immediate)?;
                }
                BasicReturn(a) => {
                    enc.write_short(a.reply_code)?;
                    enc.write_shortstr(&a.reply_text)?;
                    enc.write_shortstr(&a.exchange)?;
                    enc.write_shortstr(&a.routing_key)?;
                }
                BasicDeliver(a) => {
                    enc.write_shortstr(&a.consumer_tag)?;
                    enc.write_longlong(a.delivery_tag)?;
                    enc.write_bit(a.redelivered)?;
                    enc.write_shortstr(&a.exchange)?;
                    enc.write_shortstr(&a.routing_key)?;
                }
                BasicGet(a) => {
                    enc.write_short(0)?;
                    enc.write_shortstr(&a.queue)?;
                    enc.write_bit(a.no_ack)?;
                }
                BasicGetOk(a) => {
                    enc.write_longlong(a.delivery_tag)?;
                    enc.write_bit(a.redelivered)?;
                    enc.write_shortstr(&a.exchange)?;
                    enc.write_shortstr(&a.routing_key)?;
                    enc.write_long(a.message_count)?;
                }
                BasicGetEmpty(_) => enc.write_shortstr("")?,
                BasicAck(a) => {
                    enc.write_longlong(a.delivery_tag)?;
                    enc.write_bit(a.multiple)?;
                }
                BasicReject(a) => {
                    enc.write_longlong(a.delivery_tag)?;
                    enc.write_bit(a.requeue)?;
                }
                BasicRecoverAsync(a) => enc.write_bit(a.requeue)?,
                BasicRecover(a) => enc.write_bit(a.requeue)?,
                BasicRecoverOk(_) => {}
                BasicNack(a) => {
                    enc.write_longlong(a.delivery_tag)?;
                    enc.write_bit(a.multiple)?;
                    enc.write_bit(a.requeue)?;
                }
                TxSelect(_) | TxSelectOk(_) | TxCommit(_) | TxCommitOk(_) | TxRollback(_) | TxRollbackOk(_) => {}
                ConfirmSelect(a) => enc.write_bit(a.no_wait)?,
                ConfirmSelectOk(_) => {}
            }
            enc.finish()?;
        }
        Ok(buf)
    }

    pub fn decode(class_id: u16, method_id: u16, payload: &[u8]) -> Result<Method> {
        let mut dec = Decoder::new(std::io::Cursor::new(payload));
        let kind = MethodKind::new(class_id, method_id);
        Ok(match kind {
            MethodKind::CONNECTION_START => Method::ConnectionStart(ConnectionStart {
                version_major: dec.read_octet()?,
                version_minor: dec.read_octet()?,
                server_properties: dec.read_table()?,
                mechanisms: dec.read_longstr()?,
                locales: dec.read_longstr()?,
            }),
            MethodKind::CONNECTION_START_OK => Method::ConnectionStartOk(ConnectionStartOk {
                client_properties: dec.read_table()?,
                mechanism: dec.read_shortstr()?,
                response: dec.read_longstr()?,
                locale: dec.read_shortstr()?,
            }),
            MethodKind::CONNECTION_SECURE => Method::ConnectionSecure(ConnectionSecure {
                challenge: dec.read_longstr()?,
            }),
            MethodKind::CONNECTION_SECURE_OK => Method::ConnectionSecureOk(ConnectionSecureOk {
                response: dec.read_longstr()?,
            }),
            MethodKind::CONNECTION_TUNE => Method::ConnectionTune(ConnectionTune {
                channel_max: dec.read_short()?,
                frame_max: dec.read_long()?,
                heartbeat: dec.read_short()?,
            }),
            MethodKind::CONNECTION_TUNE_OK => Method::ConnectionTuneOk(ConnectionTuneOk {
                channel_max: dec.read_short()?,
                frame_max: dec.read_long()?,
                heartbeat: dec.read_short()?,
            }),
            MethodKind::CONNECTION_OPEN => {
                let virtual_host = dec.read_shortstr()?;
                let _capabilities = dec.read_shortstr()?;
                let _insist = dec.read_bit()?;
                Method::ConnectionOpen(ConnectionOpen { virtual_host })
            }
            MethodKind::CONNECTION_OPEN_OK => {
                let _known_hosts = dec.read_shortstr()?;
                Method::ConnectionOpenOk(ConnectionOpenOk)
            }
            MethodKind::CONNECTION_CLOSE => Method::ConnectionClose(ConnectionClose {
                reply_code: dec.read_short()?,
                reply_text: dec.read_shortstr()?,
                class_id: dec.read_short()?,
                method_id: dec.read_short()?,
            }),
            MethodKind::CONNECTION_CLOSE_OK => Method::ConnectionCloseOk(ConnectionCloseOk),
            MethodKind::CONNECTION_BLOCKED => Method::ConnectionBlocked(ConnectionBlocked {
                reason: dec.read_shortstr()?,
            }),
            MethodKind::CONNECTION_UNBLOCKED => Method::ConnectionUnblocked(ConnectionUnblocked),
            MethodKind::CHANNEL_OPEN => {
                let _out_of_band = dec.read_shortstr()?;
                Method::ChannelOpen(ChannelOpen)
            }
            MethodKind::CHANNEL_OPEN_OK => {
                let _reserved = dec.read_longstr()?;
                Method::ChannelOpenOk(ChannelOpenOk)
            }
            MethodKind::CHANNEL_FLOW => Method::ChannelFlow(ChannelFlow {
                active: dec.read_bit()?,
            }),
            MethodKind::CHANNEL_FLOW_OK => Method::ChannelFlowOk(ChannelFlowOk {
                active: dec.read_bit()?,
            }),
            MethodKind::CHANNEL_CLOSE => Method::ChannelClose(ChannelClose {
                reply_code: dec.read_short()?,
                reply_text: dec.read_shortstr()?,
                class_id: dec.read_short()?,
                method_id: dec.read_short()?,
            }),
            MethodKind::CHANNEL_CLOSE_OK => Method::ChannelCloseOk(ChannelCloseOk),
            MethodKind::EXCHANGE_DECLARE => {
                let _reserved = dec.read_short()?;
                Method::ExchangeDeclare(ExchangeDeclare {
                    exchange: dec.read_shortstr()?,
                    kind: dec.read_shortstr()?,
                    passive: dec.read_bit()?,
                    durable: dec.read_bit()?,
                    auto_delete: dec.read_bit()?,
                    internal: dec.read_bit()?,
                    no_wait: dec.read_bit()?,
                    arguments: dec.read_table()?,
                })
            }
            MethodKind::EXCHANGE_DECLARE_OK => Method::ExchangeDeclareOk(ExchangeDeclareOk),
            MethodKind::EXCHANGE_DELETE => {
                let _reserved = dec.read_short()?;
                Method::ExchangeDelete(ExchangeDelete {
                    exchange: dec.read_shortstr()?,
                    if_unused: dec.read_bit()?,
                    no_wait: dec.read_bit()?,
                })
            }
            MethodKind::EXCHANGE_DELETE_OK => Method::ExchangeDeleteOk(ExchangeDeleteOk),
            MethodKind::EXCHANGE_BIND => {
                let _reserved = dec.read_short()?;
                Method::ExchangeBind(ExchangeBind {
                    destination: dec.read_shortstr()?,
                    source: dec.read_shortstr()?,
                    routing_key: dec.read_shortstr()?,
                    no_wait: dec.read_bit()?,
                    arguments: dec.read_table()?,
                })
            }
            MethodKind::EXCHANGE_BIND_OK => Method::ExchangeBindOk(ExchangeBindOk),
            MethodKind::EXCHANGE_UNBIND => {
                let _reserved = dec.read_short()?;
                Method::ExchangeUnbind(ExchangeUnbind {
                    destination: dec.read_shortstr()?,
                    source: dec.read_shortstr()?,
                    routing_key: dec.read_shortstr()?,
                    no_wait: dec.read_bit()?,
                    arguments: dec.read_table()?,
                })
            }
            MethodKind::EXCHANGE_UNBIND_OK => Method::ExchangeUnbindOk(ExchangeUnbindOk),
            MethodKind::QUEUE_DECLARE => {
                let _reserved = dec.read_short()?;
                Method::QueueDeclare(QueueDeclare {
                    queue: dec.read_shortstr()?,
                    passive: dec.read_bit()?,
                    durable: dec.read_bit()?,
                    exclusive: dec.read_bit()?,
                    auto_delete: dec.read_bit()?,
                    no_wait: dec.read_bit()?,
                    arguments: dec.read_table()?,
                })
            }
            MethodKind::QUEUE_DECLARE_OK => Method::QueueDeclareOk(QueueDeclareOk {
                queue: dec.read_shortstr()?,
                message_count: dec.read_long()?,
                consumer_count: dec.read_long()?,
            }),
            MethodKind::QUEUE_BIND => {
                let _reserved = dec.read_short()?;
                Method::QueueBind(QueueBind {
                    queue: dec.read_shortstr()?,
                    exchange: dec.read_shortstr()?,
                    routing_key: dec.read_shortstr()?,
                    no_wait: dec.read_bit()?,
                    arguments: dec.read_table()?,
                })
            }
            MethodKind::QUEUE_BIND_OK => Method::QueueBindOk(QueueBindOk),
            MethodKind::QUEUE_UNBIND => {
                let _reserved = dec.read_short()?;
                Method::QueueUnbind(QueueUnbind {
                    queue: dec.read_shortstr()?,
                    exchange: dec.read_shortstr()?,
                    routing_key: dec.read_shortstr()?,
                    arguments: dec.read_table()?,
                })
            }
            MethodKind::QUEUE_UNBIND_OK => Method::QueueUnbindOk(QueueUnbindOk),
            MethodKind::QUEUE_PURGE => {
                let _reserved = dec.read_short()?;
                Method::QueuePurge(QueuePurge {
                    queue: dec.read_shortstr()?,
                    no_wait: dec.read_bit()?,
                })
            }
            MethodKind::QUEUE_PURGE_OK => Method::QueuePurgeOk(QueuePurgeOk {
                message_count: dec.read_long()?,
            }),
            MethodKind::QUEUE_DELETE => {
                let _reserved = dec.read_short()?;
                Method::QueueDelete(QueueDelete {
                    queue: dec.read_shortstr()?,
                    if_unused: dec.read_bit()?,
                    if_empty: dec.read_bit()?,
                    no_wait: dec.read_bit()?,
                })
            }
            MethodKind::QUEUE_DELETE_OK => Method::QueueDeleteOk(QueueDeleteOk {
                message_count: dec.read_long()?,
            }),
            MethodKind::BASIC_QOS => Method::BasicQos(BasicQos {
                prefetch_size: dec.read_long()?,
                prefetch_count: dec.read_short()?,
                global: dec.read_bit()?,
            }),
            MethodKind::BASIC_QOS_OK => Method::BasicQosOk(BasicQosOk),
            MethodKind::BASIC_CONSUME => {
                let _reserved = dec.read_short()?;
                Method::BasicConsume(BasicConsume {
                    queue: dec.read_shortstr()?,
                    consumer_tag: dec.read_shortstr()?,
                    no_local: dec.read_bit()?,
                    no_ack: dec.read_bit()?,
                    exclusive: dec.read_bit()?,
                    no_wait: dec.read_bit()?,
                    arguments: dec.read_table()?,
                })
            }
            MethodKind::BASIC_CONSUME_OK => Method::BasicConsumeOk(BasicConsumeOk {
                consumer_tag: dec.read_shortstr()?,
            }),
            MethodKind::BASIC_CANCEL => Method::BasicCancel(BasicCancel {
                consumer_tag: dec.read_shortstr()?,
                no_wait: dec.read_bit()?,
            }),
            MethodKind::BASIC_CANCEL_OK => Method::BasicCancelOk(BasicCancelOk {
                consumer_tag: dec.read_shortstr()?,
            }),
            MethodKind::BASIC_PUBLISH => {
                let _reserved = dec.read_short()?;
                Method::BasicPublish(BasicPublish {
                    exchange: dec.read_shortstr()?,
                    routing_key: dec.read_shortstr()?,
                    mandatory: dec.read_bit()?,
                    immediate: dec.read_bit()?,
                })
            }
            MethodKind::BASIC_RETURN => Method::BasicReturn(BasicReturn {
                reply_code: dec.read_short()?,
                reply_text: dec.read_shortstr()?,
                exchange: dec.read_shortstr()?,
                routing_key: dec.read_shortstr()?,
            }),
            MethodKind::BASIC_DELIVER => Method::BasicDeliver(BasicDeliver {
                consumer_tag: dec.read_shortstr()?,
                delivery_tag: dec.read_longlong()?,
                redelivered: dec.read_bit()?,
                exchange: dec.read_shortstr()?,
                routing_key: dec.read_shortstr()?,
            }),
            MethodKind::BASIC_GET => {
                let _reserved = dec.read_short()?;
                Method::BasicGet(BasicGet {
                    queue: dec.read_shortstr()?,
                    no_ack: dec.read_bit()?,
                })
            }
            MethodKind::BASIC_GET_OK => Method::BasicGetOk(BasicGetOk {
                delivery_tag: dec.read_longlong()?,
                redelivered: dec.read_bit()?,
                exchange: dec.read_shortstr()?,
                routing_key: dec.read_shortstr()?,
                message_count: dec.read_long()?,
            }),
            MethodKind::BASIC_GET_EMPTY => {
                let _reserved = dec.read_shortstr()?;
                Method::BasicGetEmpty(BasicGetEmpty)
            }
            MethodKind::BASIC_ACK => Method::BasicAck(BasicAck {
                delivery_tag: dec.read_longlong()?,
                multiple: dec.read_bit()?,
            }),
            MethodKind::BASIC_REJECT => Method::BasicReject(BasicReject {
                delivery_tag: dec.read_longlong()?,
                requeue: dec.read_bit()?,
            }),
            MethodKind::BASIC_RECOVER_ASYNC => Method::BasicRecoverAsync(BasicRecoverAsync {
                requeue: dec.read_bit()?,
            }),
            MethodKind::BASIC_RECOVER => Method::BasicRecover(BasicRecover {
                requeue: dec.read_bit()?,
            }),
            MethodKind::BASIC_RECOVER_OK => Method::BasicRecoverOk(BasicRecoverOk),
            MethodKind::BASIC_NACK => Method::BasicNack(BasicNack {
                delivery_tag: dec.read_longlong()?,
                multiple: dec.read_bit()?,
                requeue: dec.read_bit()?,
            }),
            MethodKind::TX_SELECT => Method::TxSelect(TxSelect),
            MethodKind::TX_SELECT_OK => Method::TxSelectOk(TxSelectOk),
            MethodKind::TX_COMMIT => Method::TxCommit(TxCommit),
            MethodKind::TX_COMMIT_OK => Method::TxCommitOk(TxCommitOk),
            MethodKind::TX_ROLLBACK => Method::TxRollback(TxRollback),
            MethodKind::TX_ROLLBACK_OK => Method::TxRollbackOk(TxRollbackOk),
            MethodKind::CONFIRM_SELECT => Method::ConfirmSelect(ConfirmSelect {
                no_wait: dec.read_bit()?,
            }),
            MethodKind::CONFIRM_SELECT_OK => Method::ConfirmSelectOk(ConfirmSelectOk),
            _ => return Err(Error::UnknownMethod { class_id, method_id }),
        })
    }
}

/// Human-readable `Class.method` name, used in logs and error text.
pub fn method_name(kind: MethodKind) -> &'static str {
    match kind {
        MethodKind::CONNECTION_START => "connection.start",
        MethodKind::CONNECTION_START_OK => "connection.start-ok",
        MethodKind::CONNECTION_SECURE => "connection.secure",
        MethodKind::CONNECTION_SECURE_OK => "connection.secure-ok",
        MethodKind::CONNECTION_TUNE => "connection.tune",
        MethodKind::CONNECTION_TUNE_OK => "connection.tune-ok",
        MethodKind::CONNECTION_OPEN => "connection.open",
        MethodKind::CONNECTION_OPEN_OK => "connection.open-ok",
        MethodKind::CONNECTION_CLOSE => "connection.close",
        MethodKind::CONNECTION_CLOSE_OK => "connection.close-ok",
        MethodKind::CONNECTION_BLOCKED => "connection.blocked",
        MethodKind::CONNECTION_UNBLOCKED => "connection.unblocked",
        MethodKind::CHANNEL_OPEN => "channel.open",
        MethodKind::CHANNEL_OPEN_OK => "channel.open-ok",
        MethodKind::CHANNEL_FLOW => "channel.flow",
        MethodKind::CHANNEL_FLOW_OK => "channel.flow-ok",
        MethodKind::CHANNEL_CLOSE => "channel.close",
        MethodKind::CHANNEL_CLOSE_OK => "channel.close-ok",
        MethodKind::EXCHANGE_DECLARE => "exchange.declare",
        MethodKind::EXCHANGE_DECLARE_OK => "exchange.declare-ok",
        MethodKind::EXCHANGE_DELETE => "exchange.delete",
        MethodKind::EXCHANGE_DELETE_OK => "exchange.delete-ok",
        MethodKind::EXCHANGE_BIND => "exchange.bind",
        MethodKind::EXCHANGE_BIND_OK => "exchange.bind-ok",
        MethodKind::EXCHANGE_UNBIND => "exchange.unbind",
        MethodKind::EXCHANGE_UNBIND_OK => "exchange.unbind-ok",
        MethodKind::QUEUE_DECLARE => "queue.declare",
        MethodKind::QUEUE_DECLARE_OK => "queue.declare-ok",
        MethodKind::QUEUE_BIND => "queue.bind",
        MethodKind::QUEUE_BIND_OK => "queue.bind-ok",
        MethodKind::QUEUE_UNBIND => "queue.unbind",
        MethodKind::QUEUE_UNBIND_OK => "queue.unbind-ok",
        MethodKind::QUEUE_PURGE => "queue.purge",
        MethodKind::QUEUE_PURGE_OK => "queue.purge-ok",
        MethodKind::QUEUE_DELETE => "queue.delete",
        MethodKind::QUEUE_DELETE_OK => "queue.delete-ok",
        MethodKind::BASIC_QOS => "basic.qos",
        MethodKind::BASIC_QOS_OK => "basic.qos-ok",
        MethodKind::BASIC_CONSUME => "basic.consume",
        MethodKind::BASIC_CONSUME_OK => "basic.consume-ok",
        MethodKind::BASIC_CANCEL => "basic.cancel",
        MethodKind::BASIC_CANCEL_OK => "basic.cancel-ok",
        MethodKind::BASIC_PUBLISH => "basic.publish",
        MethodKind::BASIC_RETURN => "basic.return",
        MethodKind::BASIC_DELIVER => "basic.deliver",
        MethodKind::BASIC_GET => "basic.get",
        MethodKind::BASIC_GET_OK => "basic.get-ok",
        MethodKind::BASIC_GET_EMPTY => "basic.get-empty",
        MethodKind::BASIC_ACK => "basic.ack",
        MethodKind::BASIC_REJECT => "basic.reject",
        MethodKind::BASIC_RECOVER_ASYNC => "basic.recover-async",
        MethodKind::BASIC_RECOVER => "basic.recover",
        MethodKind::BASIC_RECOVER_OK => "basic.recover-ok",
        MethodKind::BASIC_NACK => "basic.nack",
        MethodKind::TX_SELECT => "tx.select",
        MethodKind::TX_SELECT_OK => "tx.select-ok",
        MethodKind::TX_COMMIT => "tx.commit",
        MethodKind::TX_COMMIT_OK => "tx.commit-ok",
        MethodKind::TX_ROLLBACK => "tx.rollback",
        MethodKind::TX_ROLLBACK_OK => "tx.rollback-ok",
        MethodKind::CONFIRM_SELECT => "confirm.select",
        MethodKind::CONFIRM_SELECT_OK => "confirm.select-ok",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_publish_roundtrips() {
        let m = Method::BasicPublish(BasicPublish {
            exchange: "amq.direct".into(),
            routing_key: "k".into(),
            mandatory: true,
            immediate: false,
        });
        let bytes = m.encode_args().unwrap();
        let decoded = Method::decode(60, 40, &bytes).unwrap();
        assert_eq!(m, decoded);
        assert!(m.is_content_bearing());
    }

    #[test]
    fn queue_declare_ok_roundtrips() {
        let m = Method::QueueDeclareOk(QueueDeclareOk {
            queue: "Q".into(),
            message_count: 5,
            consumer_count: 0,
        });
        let bytes = m.encode_args().unwrap();
        let decoded = Method::decode(50, 11, &bytes).unwrap();
        assert_eq!(m, decoded);
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert!(Method::decode(9999, 1, &[]).is_err());
    }
}
