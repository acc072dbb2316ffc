//! The connection state machine: protocol handshake, tuning, channel
//! allocation, heartbeating, blocked/unblocked notification and close.
//!
//! A `Connection` is channel 0: it embeds the same [`AbstractChannel`]
//! machinery every user [`crate::channel::Channel`] uses, and
//! implements [`Dispatch`] to route methods that arrive for other
//! channels (or for itself, observed while a channel is mid-RPC).

use std::collections::HashMap;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::abstract_channel::{AbstractChannel, ConnectionShared, Dispatch};
use crate::channel::Channel;
use crate::config::{negotiate_channel_max, negotiate_frame_max, negotiate_heartbeat, ConnectionConfig};
use crate::error::{Error, ErrorScope, Result};
use crate::framing::AssembledMethod;
use crate::method::{
    ConnectionClose, ConnectionCloseOk, ConnectionOpen, ConnectionSecureOk, ConnectionStartOk, ConnectionTuneOk,
    Method, MethodKind,
};
use crate::transport::Transport;
use crate::types::FieldTable;

type BlockedCallback = Box<dyn Fn(String) + Send + Sync>;
type UnblockedCallback = Box<dyn Fn() + Send + Sync>;

/// A connection to an AMQP 0.9.1 broker over one TCP (or TLS) stream.
pub struct Connection {
    shared: Arc<ConnectionShared>,
    abstract_channel: AbstractChannel,
    pub channel_max: u16,
    pub frame_max: u32,
    pub heartbeat: u16,
    pub server_properties: FieldTable,
    free_channel_ids: Mutex<Vec<u16>>,
    channels: Mutex<HashMap<u16, Weak<Channel>>>,
    tcp_for_peek: Option<TcpStream>,
    connected: Arc<AtomicBool>,
    heartbeat_shutdown: Mutex<Option<Sender<()>>>,
    heartbeat_handle: Mutex<Option<JoinHandle<()>>>,
    last_fatal: Mutex<Option<Error>>,
    on_blocked: Mutex<Option<BlockedCallback>>,
    on_unblocked: Mutex<Option<UnblockedCallback>>,
    pub publisher_confirms_default: bool,
}

impl Connection {
    /// Dial, perform the full handshake, and start the heartbeat thread
    /// (unless `auto_heartbeat` was disabled).
    pub fn open(config: ConnectionConfig) -> Result<Arc<Connection>> {
        let transport = Transport::connect(
            &config.host,
            config.port,
            config.connect_timeout,
            #[cfg(feature = "tls")]
            None,
        )?;
        let (reader, writer, tcp_for_peek, connected) = transport.into_halves();
        let shared = ConnectionShared::new(reader, writer, connected.clone(), config.frame_max);
        let abstract_channel = AbstractChannel::new(0, shared.clone());

        let start = abstract_channel.wait_for(&[MethodKind::CONNECTION_START])?;
        let (server_properties, mechanisms) = match start.method {
            Method::ConnectionStart(s) => (s.server_properties, s.mechanisms),
            _ => unreachable!("wait_for only returns allowed kinds"),
        };

        if !mechanisms.split(' ').any(|m| m == config.login_method.as_str()) {
            return Err(Error::NotAllowed {
                code: 530,
                text: format!(
                    "server offers {:?}, client only supports {}",
                    mechanisms,
                    config.login_method.as_str()
                ),
                method: Some(MethodKind::CONNECTION_START),
            });
        }

        let response = config.login_method.response(&config.credentials);
        // Built entirely from `String` inputs (username/password), so this is always valid UTF-8.
        let response = String::from_utf8(response).expect("SASL response built from UTF-8 credentials");
        let start_ok = Method::ConnectionStartOk(ConnectionStartOk {
            client_properties: config.effective_client_properties(),
            mechanism: config.login_method.as_str().into(),
            response,
            locale: config.locale.clone(),
        });
        abstract_channel.send(&start_ok, None)?;

        let tune = loop {
            let next = abstract_channel.wait_for(&[MethodKind::CONNECTION_TUNE, MethodKind::CONNECTION_SECURE])?;
            match next.method {
                Method::ConnectionSecure(_) => {
                    abstract_channel.send(
                        &Method::ConnectionSecureOk(ConnectionSecureOk { response: String::new() }),
                        None,
                    )?;
                }
                Method::ConnectionTune(t) => break t,
                _ => unreachable!(),
            }
        };

        let channel_max = negotiate_channel_max(config.channel_max, tune.channel_max);
        let frame_max = negotiate_frame_max(config.frame_max, tune.frame_max);
        let heartbeat = negotiate_heartbeat(config.heartbeat, tune.heartbeat);
        shared.set_frame_max(frame_max);

        abstract_channel.send(
            &Method::ConnectionTuneOk(ConnectionTuneOk {
                channel_max,
                frame_max,
                heartbeat,
            }),
            None,
        )?;

        abstract_channel.send(
            &Method::ConnectionOpen(ConnectionOpen {
                virtual_host: config.virtual_host.clone(),
            }),
            None,
        )?;
        abstract_channel.wait_for(&[MethodKind::CONNECTION_OPEN_OK])?;

        let connection = Arc::new(Connection {
            shared: shared.clone(),
            abstract_channel,
            channel_max,
            frame_max,
            heartbeat,
            server_properties,
            // `pop()` removes from the end, so store descending to hand
            // out ascending ids (1, 2, 3, ...) on first use.
            free_channel_ids: Mutex::new((1..=channel_max).rev().collect()),
            channels: Mutex::new(HashMap::new()),
            tcp_for_peek,
            connected,
            heartbeat_shutdown: Mutex::new(None),
            heartbeat_handle: Mutex::new(None),
            last_fatal: Mutex::new(None),
            on_blocked: Mutex::new(None),
            on_unblocked: Mutex::new(None),
            publisher_confirms_default: config.publisher_confirms,
        });

        shared.set_dispatch(Arc::downgrade(&connection) as Weak<dyn Dispatch>);

        if config.auto_heartbeat && heartbeat > 0 {
            connection.start_heartbeat_thread(heartbeat);
        }

        Ok(connection)
    }

    fn start_heartbeat_thread(self: &Arc<Self>, heartbeat: u16) {
        let (tx, rx): (Sender<()>, Receiver<()>) = crossbeam_channel::bounded(0);
        let shared = self.shared.clone();
        let interval = Duration::from_secs_f64(heartbeat as f64 / 1.5);
        let handle = thread::spawn(move || loop {
            match rx.recv_timeout(interval) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    if !shared.is_connected() {
                        break;
                    }
                    if shared.send_heartbeat().is_err() {
                        break;
                    }
                }
            }
        });
        *self.heartbeat_shutdown.lock() = Some(tx);
        *self.heartbeat_handle.lock() = Some(handle);
    }

    fn stop_heartbeat_thread(&self) {
        if let Some(tx) = self.heartbeat_shutdown.lock().take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.heartbeat_handle.lock().take() {
            let _ = handle.join();
        }
    }

    pub fn on_blocked(&self, callback: impl Fn(String) + Send + Sync + 'static) {
        *self.on_blocked.lock() = Some(Box::new(callback));
    }

    pub fn on_unblocked(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.on_unblocked.lock() = Some(Box::new(callback));
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// The last connection-fatal error observed asynchronously (e.g. a
    /// server-initiated `connection.close` seen while a channel was
    /// mid-RPC), if any.
    pub fn last_fatal_error(&self) -> Option<String> {
        self.last_fatal.lock().as_ref().map(|e| e.to_string())
    }

    /// Sends a probe heartbeat and reports whether it went out. A
    /// zero-byte `TcpStream::peek` would be non-mutating, but it reads
    /// through a cloned handle that shares the socket's file-status
    /// flags with the frame-read half, so toggling its non-blocking mode
    /// concurrently with a blocking `read_frame` can spuriously surface
    /// a timeout on a healthy connection. The heartbeat goes through the
    /// frame-write lock like every other write, so it never races.
    pub fn is_alive(&self) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.shared.send_heartbeat().is_ok()
    }

    /// Allocate a channel, either an existing one by id or the next
    /// free id off the descending pool.
    pub fn channel(self: &Arc<Self>) -> Result<Arc<Channel>> {
        let id = {
            let mut ids = self.free_channel_ids.lock();
            ids.pop().ok_or(Error::ChannelIdsExhausted)?
        };
        self.channel_with_id(id)
    }

    fn channel_with_id(self: &Arc<Self>, id: u16) -> Result<Arc<Channel>> {
        let abstract_channel = AbstractChannel::new(id, self.shared.clone());
        let channel = Channel::new(id, abstract_channel, self.clone());
        self.channels.lock().insert(id, Arc::downgrade(&channel));
        Ok(channel)
    }

    /// Remove a closed channel's bookkeeping and return its id to the pool.
    pub(crate) fn release_channel(&self, id: u16) {
        self.channels.lock().remove(&id);
        self.shared.drop_channel(id);
        self.free_channel_ids.lock().push(id);
    }

    /// Block for the next method on any channel (typically a consumer
    /// delivery) and dispatch it. The entry point applications poll to
    /// drive consumer callbacks.
    pub fn drain_events(&self, timeout: Option<Duration>) -> Result<()> {
        if timeout.is_some() {
            self.shared.set_read_timeout(timeout)?;
        }
        let result = self.shared.read_one();
        if timeout.is_some() {
            let _ = self.shared.set_read_timeout(None);
        }
        match result? {
            None => Ok(()),
            Some(assembled) if assembled.channel == 0 => self.handle_connection_method(assembled),
            Some(assembled) => self.handle_channel_method(assembled.channel, assembled),
        }
    }

    /// Client-initiated close: send `connection.close`, wait for the
    /// peer's `connection.close-ok`, then tear the transport down.
    pub fn close(&self, reply_code: u16, reply_text: impl Into<String>) -> Result<()> {
        let result = self.abstract_channel.call(
            &Method::ConnectionClose(ConnectionClose {
                reply_code,
                reply_text: reply_text.into(),
                class_id: 0,
                method_id: 0,
            }),
            None,
            &[MethodKind::CONNECTION_CLOSE_OK],
        );
        self.teardown();
        result.map(|_| ())
    }

    fn teardown(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.stop_heartbeat_thread();
        if let Some(tcp) = &self.tcp_for_peek {
            crate::transport::close_tcp(tcp);
        }
    }
}

impl Dispatch for Connection {
    fn handle_connection_method(&self, assembled: AssembledMethod) -> Result<()> {
        match assembled.method {
            Method::ConnectionClose(close) => {
                let _ = self
                    .abstract_channel
                    .send(&Method::ConnectionCloseOk(ConnectionCloseOk), None);
                *self.last_fatal.lock() = Some(Error::from_reply_code(
                    close.reply_code,
                    close.reply_text,
                    Some(MethodKind::new(close.class_id, close.method_id)),
                    ErrorScope::Connection,
                ));
                self.teardown();
                Ok(())
            }
            Method::ConnectionBlocked(b) => {
                if let Some(cb) = self.on_blocked.lock().as_ref() {
                    cb(b.reason);
                }
                Ok(())
            }
            Method::ConnectionUnblocked(_) => {
                if let Some(cb) = self.on_unblocked.lock().as_ref() {
                    cb();
                }
                Ok(())
            }
            other => {
                log::debug!("ignoring unsolicited connection-level method {:?}", other.kind());
                Ok(())
            }
        }
    }

    fn handle_channel_method(&self, channel: u16, assembled: AssembledMethod) -> Result<()> {
        let target = self.channels.lock().get(&channel).and_then(Weak::upgrade);
        match target {
            Some(ch) => ch.handle_async(assembled),
            None => {
                log::warn!("method for unknown or dropped channel {}", channel);
                Ok(())
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.teardown();
    }
}
