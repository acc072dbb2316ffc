//! Shared RPC-wait and dispatch machinery used identically by
//! [`crate::connection::Connection`] (channel 0) and every user
//! [`crate::channel::Channel`].
//!
//! A `Connection` owns one [`ConnectionShared`]: the frame-write lock,
//! the frame-read lock (bundled with the method assembler, since only
//! the thread holding the read lock ever touches assembly state), the
//! single connection-level RPC lock, and a per-channel inbox for
//! methods that arrive while some other channel is waiting. Both
//! `Connection` and `Channel` embed an [`AbstractChannel`] that borrows
//! this shared state to implement the identical send/wait/dispatch
//! algorithm, keyed by their own channel id (0 for the connection).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::{Error, ErrorScope, Result};
use crate::framing::{AssembledMethod, MethodAssembler, MethodEmitter};
use crate::message::BasicProperties;
use crate::method::{Method, MethodKind};
use crate::transport::{TransportReader, TransportWriter};

/// Implemented once by `Connection`, routes methods that arrive
/// outside of an active RPC wait for their own channel.
pub trait Dispatch: Send + Sync {
    /// A method addressed to channel 0, observed while some user
    /// channel (or the connection itself, via recursion) is waiting.
    fn handle_connection_method(&self, assembled: AssembledMethod) -> Result<()>;
    /// A method addressed to `channel`, observed while that channel is
    /// not itself waiting for it (consumer delivery, `basic.return`,
    /// `channel.flow`, `basic.cancel`).
    fn handle_channel_method(&self, channel: u16, assembled: AssembledMethod) -> Result<()>;
}

struct ReaderState {
    reader: TransportReader,
    assembler: MethodAssembler,
}

/// State shared by every channel multiplexed over one transport.
pub struct ConnectionShared {
    writer: Mutex<TransportWriter>,
    reader: Mutex<ReaderState>,
    rpc_lock: Mutex<()>,
    inboxes: Mutex<HashMap<u16, VecDeque<AssembledMethod>>>,
    frame_max: AtomicU32,
    connected: Arc<AtomicBool>,
    dispatch: Mutex<Option<Weak<dyn Dispatch>>>,
}

impl ConnectionShared {
    pub fn new(
        reader: TransportReader,
        writer: TransportWriter,
        connected: Arc<AtomicBool>,
        frame_max: u32,
    ) -> Arc<ConnectionShared> {
        Arc::new(ConnectionShared {
            writer: Mutex::new(writer),
            reader: Mutex::new(ReaderState {
                reader,
                assembler: MethodAssembler::new(),
            }),
            rpc_lock: Mutex::new(()),
            inboxes: Mutex::new(HashMap::new()),
            frame_max: AtomicU32::new(frame_max),
            connected,
            dispatch: Mutex::new(None),
        })
    }

    /// Wired up once the owning `Connection` has an `Arc` to hand out.
    pub fn set_dispatch(&self, dispatch: Weak<dyn Dispatch>) {
        *self.dispatch.lock() = Some(dispatch);
    }

    pub fn set_frame_max(&self, frame_max: u32) {
        self.frame_max.store(frame_max, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn push_inbox(&self, channel: u16, method: AssembledMethod) {
        self.inboxes.lock().entry(channel).or_default().push_back(method);
    }

    fn pop_inbox(&self, channel: u16) -> Option<AssembledMethod> {
        self.inboxes.lock().get_mut(&channel).and_then(|q| q.pop_front())
    }

    pub fn drop_channel(&self, channel: u16) {
        self.inboxes.lock().remove(&channel);
    }

    /// Acquire the frame-write lock and emit one method (plus optional
    /// content), writing its frames without interleaving.
    pub fn write_method(
        &self,
        channel: u16,
        method: &Method,
        content: Option<(&BasicProperties, &[u8])>,
    ) -> Result<()> {
        let frame_max = self.frame_max.load(Ordering::SeqCst);
        let mut writer = self.writer.lock();
        MethodEmitter::write_method(&mut writer, channel, method, content, frame_max)
    }

    pub fn send_heartbeat(&self) -> Result<()> {
        self.writer.lock().send_heartbeat()
    }

    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        self.reader.lock().reader.set_read_timeout(timeout)
    }

    /// Acquire the frame-read lock and assemble exactly one method, or
    /// `None` if a heartbeat was consumed instead.
    pub fn read_one(&self) -> Result<Option<AssembledMethod>> {
        let mut state = self.reader.lock();
        let ReaderState { reader, assembler } = &mut *state;
        assembler.read_method(reader)
    }

    fn dispatch_connection(&self, assembled: AssembledMethod) -> Result<()> {
        match self.dispatch.lock().as_ref().and_then(Weak::upgrade) {
            Some(d) => d.handle_connection_method(assembled),
            None => Ok(()),
        }
    }

    fn dispatch_channel(&self, channel: u16, assembled: AssembledMethod) -> Result<()> {
        match self.dispatch.lock().as_ref().and_then(Weak::upgrade) {
            Some(d) => d.handle_channel_method(channel, assembled),
            None => Ok(()),
        }
    }
}

enum Classified {
    Return(AssembledMethod),
    Continue,
}

/// The per-channel half of the RPC model: a channel id plus a handle
/// to the state it shares with every other channel on the connection.
pub struct AbstractChannel {
    pub channel_id: u16,
    pub shared: Arc<ConnectionShared>,
}

impl AbstractChannel {
    pub fn new(channel_id: u16, shared: Arc<ConnectionShared>) -> Self {
        AbstractChannel { channel_id, shared }
    }

    /// Fire-and-forget: write the method (and optional content) without
    /// waiting for a reply. Used for asynchronous methods such as
    /// `basic.ack`/`basic.nack`/`basic.reject` and `no_wait` variants.
    pub fn send(&self, method: &Method, content: Option<(&BasicProperties, &[u8])>) -> Result<()> {
        self.shared.write_method(self.channel_id, method, content)
    }

    /// The synchronous RPC pattern from the channel/connection dispatch
    /// model: hold the connection-level RPC lock for the whole
    /// send-then-wait, so no other thread's RPC can observe this
    /// channel's reply.
    pub fn call(
        &self,
        method: &Method,
        content: Option<(&BasicProperties, &[u8])>,
        allowed: &[MethodKind],
    ) -> Result<AssembledMethod> {
        let _rpc_guard = self.shared.rpc_lock.lock();
        self.send(method, content)?;
        self.wait_for(allowed)
    }

    /// Wait for a method whose kind is in `allowed`, routing everything
    /// else per the dispatch rules: channel-0 traffic recurses into
    /// connection processing immediately, traffic for other channels
    /// goes into their inbox, and unsolicited traffic for this channel
    /// (deliveries, `basic.return`, cancellations, flow) is dispatched
    /// and the wait continues. `channel.close`/`connection.close` are
    /// always implicitly allowed.
    pub fn wait_for(&self, allowed: &[MethodKind]) -> Result<AssembledMethod> {
        loop {
            if let Some(m) = self.shared.pop_inbox(self.channel_id) {
                match self.classify(m, allowed)? {
                    Classified::Return(m) => return Ok(m),
                    Classified::Continue => continue,
                }
            }

            let assembled = match self.shared.read_one()? {
                None => continue, // heartbeat
                Some(m) => m,
            };

            if assembled.channel == 0 && self.channel_id != 0 {
                self.shared.dispatch_connection(assembled)?;
                continue;
            }

            if assembled.channel != self.channel_id {
                self.shared.push_inbox(assembled.channel, assembled);
                continue;
            }

            match self.classify(assembled, allowed)? {
                Classified::Return(m) => return Ok(m),
                Classified::Continue => continue,
            }
        }
    }

    fn classify(&self, assembled: AssembledMethod, allowed: &[MethodKind]) -> Result<Classified> {
        if self.channel_id == 0 {
            if let Method::ConnectionClose(close) = &assembled.method {
                self.send(&Method::ConnectionCloseOk(Default::default()), None)?;
                return Err(Error::from_reply_code(
                    close.reply_code,
                    close.reply_text.clone(),
                    Some(MethodKind::new(close.class_id, close.method_id)),
                    ErrorScope::Connection,
                ));
            }
        } else if let Method::ChannelClose(close) = &assembled.method {
            self.send(&Method::ChannelCloseOk(Default::default()), None)?;
            return Err(Error::from_reply_code(
                close.reply_code,
                close.reply_text.clone(),
                Some(MethodKind::new(close.class_id, close.method_id)),
                ErrorScope::Channel,
            ));
        }

        if allowed.contains(&assembled.method.kind()) {
            return Ok(Classified::Return(assembled));
        }

        if self.channel_id == 0 {
            self.shared.dispatch_connection(assembled)?;
        } else {
            self.shared.dispatch_channel(self.channel_id, assembled)?;
        }
        Ok(Classified::Continue)
    }
}
