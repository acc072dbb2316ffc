//! Per-channel RPC surface: exchange/queue/basic/tx/confirm operations,
//! consumer dispatch, returned messages, and the channel lifecycle.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::abstract_channel::AbstractChannel;
use crate::channel_status::{ChannelState, ChannelStatus};
use crate::connection::Connection;
use crate::consumer::{CancelCallback, ConsumerRegistry, DeliveryCallback};
use crate::error::{Error, ErrorScope, Result};
use crate::framing::AssembledMethod;
use crate::message::{BasicProperties, DeliveryInfo, Message, ReturnedMessage};
use crate::method::{
    BasicAck, BasicCancel, BasicConsume, BasicGet, BasicNack, BasicPublish, BasicQos, BasicRecover, BasicRecoverAsync,
    BasicReject, ChannelClose, ChannelFlow, ChannelFlowOk, ChannelOpen, ConfirmSelect, ExchangeBind, ExchangeDeclare,
    ExchangeDelete, ExchangeUnbind, Method, MethodKind, QueueBind, QueueDeclare, QueueDeclareOk, QueueDelete,
    QueuePurge, QueueUnbind, TxCommit, TxRollback, TxSelect,
};
use crate::types::FieldTable;

/// What a channel's publishes currently mean: plain fire-and-forget,
/// transactional, or RabbitMQ publisher-confirms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    None,
    Tx,
    Confirm,
}

pub struct Channel {
    pub id: u16,
    abstract_channel: AbstractChannel,
    connection: Arc<Connection>,
    status: ChannelStatus,
    mode: Mutex<PublishMode>,
    consumers: ConsumerRegistry,
    returned_messages: Mutex<VecDeque<ReturnedMessage>>,
    auto_decode: AtomicBool,
    flow_active: AtomicBool,
    released: AtomicBool,
    weak_self: Weak<Channel>,
}

impl Channel {
    pub(crate) fn new(id: u16, abstract_channel: AbstractChannel, connection: Arc<Connection>) -> Arc<Channel> {
        Arc::new_cyclic(|weak_self| Channel {
            id,
            abstract_channel,
            connection,
            status: ChannelStatus::new(),
            mode: Mutex::new(PublishMode::None),
            consumers: ConsumerRegistry::new(),
            returned_messages: Mutex::new(VecDeque::new()),
            auto_decode: AtomicBool::new(true),
            flow_active: AtomicBool::new(true),
            released: AtomicBool::new(false),
            weak_self: weak_self.clone(),
        })
    }

    pub fn set_auto_decode(&self, enabled: bool) {
        self.auto_decode.store(enabled, Ordering::SeqCst);
    }

    pub fn is_flow_active(&self) -> bool {
        self.flow_active.load(Ordering::SeqCst)
    }

    pub fn mode(&self) -> PublishMode {
        *self.mode.lock()
    }

    pub fn pop_returned_message(&self) -> Option<ReturnedMessage> {
        self.returned_messages.lock().pop_front()
    }

    fn build_message(&self, properties: BasicProperties, body: Vec<u8>, delivery_info: DeliveryInfo) -> Message {
        let mut message = Message::new(properties, body, delivery_info);
        message.channel = self.weak_self.clone();
        if self.auto_decode.load(Ordering::SeqCst) {
            message.auto_decode_body();
        }
        message
    }

    /// Open the channel if it's never been opened, or re-open it
    /// transparently after a recoverable channel-level close. A
    /// connection whose config asked for publisher confirms by default
    /// enables confirm mode on first open.
    fn ensure_open(&self) -> Result<()> {
        if self.status.is_usable() {
            return Ok(());
        }
        self.status.set(ChannelState::Initial);
        self.abstract_channel
            .call(&Method::ChannelOpen(ChannelOpen), None, &[MethodKind::CHANNEL_OPEN_OK])?;
        self.status.set(ChannelState::Connected);
        self.flow_active.store(true, Ordering::SeqCst);
        if self.connection.publisher_confirms_default && *self.mode.lock() == PublishMode::None {
            self.enable_confirm_mode()?;
        }
        Ok(())
    }

    /// Ensure the channel is open, then run one request/reply RPC.
    /// A channel-scoped error (the common case: the broker closed the
    /// channel) marks this channel for transparent reopen on next use.
    fn channel_call(
        &self,
        method: &Method,
        content: Option<(&BasicProperties, &[u8])>,
        allowed: &[MethodKind],
    ) -> Result<AssembledMethod> {
        self.ensure_open()?;
        match self.abstract_channel.call(method, content, allowed) {
            Ok(m) => Ok(m),
            Err(e) => {
                if e.scope() == ErrorScope::Channel {
                    self.status.set(ChannelState::Error);
                }
                Err(e)
            }
        }
    }

    // ---- exchange.* -----------------------------------------------

    pub fn exchange_declare(
        &self,
        exchange: &str,
        kind: &str,
        passive: bool,
        durable: bool,
        auto_delete: bool,
        internal: bool,
        arguments: FieldTable,
    ) -> Result<()> {
        self.channel_call(
            &Method::ExchangeDeclare(ExchangeDeclare {
                exchange: exchange.into(),
                kind: kind.into(),
                passive,
                durable,
                auto_delete,
                internal,
                no_wait: false,
                arguments,
            }),
            None,
            &[MethodKind::EXCHANGE_DECLARE_OK],
        )?;
        Ok(())
    }

    pub fn exchange_delete(&self, exchange: &str, if_unused: bool) -> Result<()> {
        self.channel_call(
            &Method::ExchangeDelete(ExchangeDelete {
                exchange: exchange.into(),
                if_unused,
                no_wait: false,
            }),
            None,
            &[MethodKind::EXCHANGE_DELETE_OK],
        )?;
        Ok(())
    }

    pub fn exchange_bind(&self, destination: &str, source: &str, routing_key: &str, arguments: FieldTable) -> Result<()> {
        self.channel_call(
            &Method::ExchangeBind(ExchangeBind {
                destination: destination.into(),
                source: source.into(),
                routing_key: routing_key.into(),
                no_wait: false,
                arguments,
            }),
            None,
            &[MethodKind::EXCHANGE_BIND_OK],
        )?;
        Ok(())
    }

    pub fn exchange_unbind(&self, destination: &str, source: &str, routing_key: &str, arguments: FieldTable) -> Result<()> {
        self.channel_call(
            &Method::ExchangeUnbind(ExchangeUnbind {
                destination: destination.into(),
                source: source.into(),
                routing_key: routing_key.into(),
                no_wait: false,
                arguments,
            }),
            None,
            &[MethodKind::EXCHANGE_UNBIND_OK],
        )?;
        Ok(())
    }

    // ---- queue.* ----------------------------------------------------

    pub fn queue_declare(
        &self,
        queue: &str,
        passive: bool,
        durable: bool,
        exclusive: bool,
        auto_delete: bool,
        arguments: FieldTable,
    ) -> Result<QueueDeclareOk> {
        let reply = self.channel_call(
            &Method::QueueDeclare(QueueDeclare {
                queue: queue.into(),
                passive,
                durable,
                exclusive,
                auto_delete,
                no_wait: false,
                arguments,
            }),
            None,
            &[MethodKind::QUEUE_DECLARE_OK],
        )?;
        match reply.method {
            Method::QueueDeclareOk(ok) => Ok(ok),
            _ => unreachable!("wait_for only returns allowed kinds"),
        }
    }

    pub fn queue_bind(&self, queue: &str, exchange: &str, routing_key: &str, arguments: FieldTable) -> Result<()> {
        self.channel_call(
            &Method::QueueBind(QueueBind {
                queue: queue.into(),
                exchange: exchange.into(),
                routing_key: routing_key.into(),
                no_wait: false,
                arguments,
            }),
            None,
            &[MethodKind::QUEUE_BIND_OK],
        )?;
        Ok(())
    }

    pub fn queue_unbind(&self, queue: &str, exchange: &str, routing_key: &str, arguments: FieldTable) -> Result<()> {
        self.channel_call(
            &Method::QueueUnbind(QueueUnbind {
                queue: queue.into(),
                exchange: exchange.into(),
                routing_key: routing_key.into(),
                arguments,
            }),
            None,
            &[MethodKind::QUEUE_UNBIND_OK],
        )?;
        Ok(())
    }

    pub fn queue_purge(&self, queue: &str) -> Result<u32> {
        let reply = self.channel_call(
            &Method::QueuePurge(QueuePurge {
                queue: queue.into(),
                no_wait: false,
            }),
            None,
            &[MethodKind::QUEUE_PURGE_OK],
        )?;
        match reply.method {
            Method::QueuePurgeOk(ok) => Ok(ok.message_count),
            _ => unreachable!(),
        }
    }

    pub fn queue_delete(&self, queue: &str, if_unused: bool, if_empty: bool) -> Result<u32> {
        let reply = self.channel_call(
            &Method::QueueDelete(QueueDelete {
                queue: queue.into(),
                if_unused,
                if_empty,
                no_wait: false,
            }),
            None,
            &[MethodKind::QUEUE_DELETE_OK],
        )?;
        match reply.method {
            Method::QueueDeleteOk(ok) => Ok(ok.message_count),
            _ => unreachable!(),
        }
    }

    // ---- basic.* ----------------------------------------------------

    pub fn basic_qos(&self, prefetch_size: u32, prefetch_count: u16, global: bool) -> Result<()> {
        self.channel_call(
            &Method::BasicQos(BasicQos {
                prefetch_size,
                prefetch_count,
                global,
            }),
            None,
            &[MethodKind::BASIC_QOS_OK],
        )?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn basic_consume(
        &self,
        queue: &str,
        consumer_tag: &str,
        no_local: bool,
        no_ack: bool,
        exclusive: bool,
        arguments: FieldTable,
        on_delivery: DeliveryCallback,
        on_cancel: Option<CancelCallback>,
    ) -> Result<String> {
        let reply = self.channel_call(
            &Method::BasicConsume(BasicConsume {
                queue: queue.into(),
                consumer_tag: consumer_tag.into(),
                no_local,
                no_ack,
                exclusive,
                no_wait: false,
                arguments,
            }),
            None,
            &[MethodKind::BASIC_CONSUME_OK],
        )?;
        let tag = match reply.method {
            Method::BasicConsumeOk(ok) => ok.consumer_tag,
            _ => unreachable!(),
        };
        self.consumers.register(tag.clone(), no_ack, on_delivery, on_cancel);
        Ok(tag)
    }

    pub fn basic_cancel(&self, consumer_tag: &str) -> Result<()> {
        self.channel_call(
            &Method::BasicCancel(BasicCancel {
                consumer_tag: consumer_tag.into(),
                no_wait: false,
            }),
            None,
            &[MethodKind::BASIC_CANCEL_OK],
        )?;
        self.consumers.remove(consumer_tag);
        Ok(())
    }

    /// Blocking publish. Under `PublishMode::Confirm` this waits for the
    /// broker's per-message `basic.ack`/`basic.nack`; otherwise it's
    /// fire-and-forget once the frames are on the wire.
    pub fn basic_publish(
        &self,
        exchange: &str,
        routing_key: &str,
        mandatory: bool,
        immediate: bool,
        properties: BasicProperties,
        body: &[u8],
    ) -> Result<()> {
        self.ensure_open()?;
        let method = Method::BasicPublish(BasicPublish {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            mandatory,
            immediate,
        });

        if self.mode() == PublishMode::Confirm {
            let reply = self
                .abstract_channel
                .call(&method, Some((&properties, body)), &[MethodKind::BASIC_ACK, MethodKind::BASIC_NACK])?;
            match reply.method {
                Method::BasicAck(_) => Ok(()),
                Method::BasicNack(_) => Err(Error::from_reply_code(
                    506,
                    "publish was nacked by the broker".into(),
                    Some(MethodKind::BASIC_NACK),
                    ErrorScope::Channel,
                )),
                _ => unreachable!(),
            }
        } else {
            self.abstract_channel.send(&method, Some((&properties, body)))
        }
    }

    pub fn basic_get(&self, queue: &str, no_ack: bool) -> Result<Option<Message>> {
        let reply = self.channel_call(
            &Method::BasicGet(BasicGet {
                queue: queue.into(),
                no_ack,
            }),
            None,
            &[MethodKind::BASIC_GET_OK, MethodKind::BASIC_GET_EMPTY],
        )?;
        match reply.method {
            Method::BasicGetOk(ok) => {
                let (properties, body) = reply.content.expect("basic.get-ok always carries content");
                Ok(Some(self.build_message(
                    properties,
                    body,
                    DeliveryInfo {
                        consumer_tag: None,
                        delivery_tag: Some(ok.delivery_tag),
                        redelivered: ok.redelivered,
                        exchange: ok.exchange,
                        routing_key: ok.routing_key,
                        message_count: Some(ok.message_count),
                    },
                )))
            }
            Method::BasicGetEmpty(_) => Ok(None),
            _ => unreachable!(),
        }
    }

    pub fn basic_ack(&self, delivery_tag: u64, multiple: bool) -> Result<()> {
        self.ensure_open()?;
        self.abstract_channel
            .send(&Method::BasicAck(BasicAck { delivery_tag, multiple }), None)
    }

    pub fn basic_reject(&self, delivery_tag: u64, requeue: bool) -> Result<()> {
        self.ensure_open()?;
        self.abstract_channel
            .send(&Method::BasicReject(BasicReject { delivery_tag, requeue }), None)
    }

    pub fn basic_nack(&self, delivery_tag: u64, multiple: bool, requeue: bool) -> Result<()> {
        self.ensure_open()?;
        self.abstract_channel.send(
            &Method::BasicNack(BasicNack {
                delivery_tag,
                multiple,
                requeue,
            }),
            None,
        )
    }

    pub fn basic_recover(&self, requeue: bool) -> Result<()> {
        self.channel_call(
            &Method::BasicRecover(BasicRecover { requeue }),
            None,
            &[MethodKind::BASIC_RECOVER_OK],
        )?;
        Ok(())
    }

    pub fn basic_recover_async(&self, requeue: bool) -> Result<()> {
        self.ensure_open()?;
        self.abstract_channel
            .send(&Method::BasicRecoverAsync(BasicRecoverAsync { requeue }), None)
    }

    // ---- tx.* / confirm.* --------------------------------------------

    pub fn tx_select(&self) -> Result<()> {
        if self.mode() == PublishMode::Confirm {
            return Err(Error::PreconditionFailed {
                code: 406,
                text: "tx mode is mutually exclusive with publisher confirms on a channel".into(),
                method: Some(MethodKind::TX_SELECT),
            });
        }
        self.channel_call(&Method::TxSelect(TxSelect), None, &[MethodKind::TX_SELECT_OK])?;
        *self.mode.lock() = PublishMode::Tx;
        Ok(())
    }

    pub fn tx_commit(&self) -> Result<()> {
        self.channel_call(&Method::TxCommit(TxCommit), None, &[MethodKind::TX_COMMIT_OK])?;
        Ok(())
    }

    pub fn tx_rollback(&self) -> Result<()> {
        self.channel_call(&Method::TxRollback(TxRollback), None, &[MethodKind::TX_ROLLBACK_OK])?;
        Ok(())
    }

    pub fn confirm_select(&self) -> Result<()> {
        if self.mode() == PublishMode::Tx {
            return Err(Error::PreconditionFailed {
                code: 406,
                text: "publisher confirms are mutually exclusive with tx mode on a channel".into(),
                method: Some(MethodKind::CONFIRM_SELECT),
            });
        }
        self.enable_confirm_mode()
    }

    fn enable_confirm_mode(&self) -> Result<()> {
        self.channel_call(
            &Method::ConfirmSelect(ConfirmSelect { no_wait: false }),
            None,
            &[MethodKind::CONFIRM_SELECT_OK],
        )?;
        *self.mode.lock() = PublishMode::Confirm;
        Ok(())
    }

    // ---- channel lifecycle --------------------------------------------

    pub fn flow(&self, active: bool) -> Result<bool> {
        let reply = self.channel_call(&Method::ChannelFlow(ChannelFlow { active }), None, &[MethodKind::CHANNEL_FLOW_OK])?;
        match reply.method {
            Method::ChannelFlowOk(ok) => {
                self.flow_active.store(ok.active, Ordering::SeqCst);
                Ok(ok.active)
            }
            _ => unreachable!(),
        }
    }

    pub fn close(&self, reply_code: u16, reply_text: impl Into<String>) -> Result<()> {
        if !self.status.is_usable() {
            self.release();
            return Ok(());
        }
        let result = self.abstract_channel.call(
            &Method::ChannelClose(ChannelClose {
                reply_code,
                reply_text: reply_text.into(),
                class_id: 0,
                method_id: 0,
            }),
            None,
            &[MethodKind::CHANNEL_CLOSE_OK],
        );
        self.status.set(ChannelState::Closed);
        self.release();
        result.map(|_| ())
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.connection.release_channel(self.id);
        }
    }

    /// Route a method that arrived for this channel outside of its own
    /// RPC wait: consumer deliveries, `basic.return`, cancellation
    /// notices, and flow requests initiated by the broker.
    pub(crate) fn handle_async(&self, assembled: AssembledMethod) -> Result<()> {
        match assembled.method {
            Method::BasicDeliver(d) => {
                let (properties, body) = assembled.content.expect("basic.deliver always carries content");
                let message = self.build_message(
                    properties,
                    body,
                    DeliveryInfo {
                        consumer_tag: Some(d.consumer_tag.clone()),
                        delivery_tag: Some(d.delivery_tag),
                        redelivered: d.redelivered,
                        exchange: d.exchange,
                        routing_key: d.routing_key,
                        message_count: None,
                    },
                );
                if !self.consumers.dispatch(&d.consumer_tag, message) {
                    log::warn!("delivery for unknown consumer tag {:?} on channel {}", d.consumer_tag, self.id);
                }
                Ok(())
            }
            Method::BasicReturn(r) => {
                let (properties, body) = assembled.content.expect("basic.return always carries content");
                let message = self.build_message(
                    properties,
                    body,
                    DeliveryInfo {
                        consumer_tag: None,
                        delivery_tag: None,
                        redelivered: false,
                        exchange: r.exchange.clone(),
                        routing_key: r.routing_key.clone(),
                        message_count: None,
                    },
                );
                self.returned_messages.lock().push_back(ReturnedMessage {
                    reply_code: r.reply_code,
                    reply_text: r.reply_text,
                    exchange: r.exchange,
                    routing_key: r.routing_key,
                    message,
                });
                Ok(())
            }
            Method::BasicCancel(c) => {
                let notified = self.consumers.notify_cancelled(&c.consumer_tag);
                self.consumers.remove(&c.consumer_tag);
                if notified {
                    Ok(())
                } else {
                    Err(Error::ConsumerCancelled(c.consumer_tag))
                }
            }
            Method::ChannelFlow(f) => {
                self.flow_active.store(f.active, Ordering::SeqCst);
                self.abstract_channel
                    .send(&Method::ChannelFlowOk(ChannelFlowOk { active: f.active }), None)
            }
            other => {
                log::debug!("ignoring unsolicited method {:?} on channel {}", other.kind(), self.id);
                Ok(())
            }
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.release();
    }
}
