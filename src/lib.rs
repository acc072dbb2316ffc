//! A blocking, thread-safe AMQP 0.9.1 client.
//!
//! ```no_run
//! use warren::{Connection, ConnectionConfig};
//!
//! let connection = Connection::open(ConnectionConfig::new().host("localhost")).unwrap();
//! let channel = connection.channel().unwrap();
//! channel
//!     .queue_declare("hello", false, true, false, false, Default::default())
//!     .unwrap();
//! channel
//!     .basic_publish("", "hello", false, false, Default::default(), b"hi")
//!     .unwrap();
//! ```
//!
//! Every `Connection` and `Channel` can be shared across threads
//! (`Arc<Connection>`/`Arc<Channel>`): all wire I/O is serialized
//! internally by a frame-write lock, a frame-read lock, and a
//! connection-level RPC lock, so concurrent callers compose without
//! any locking of their own.

pub mod abstract_channel;
pub mod channel;
pub mod channel_status;
pub mod codec;
pub mod config;
pub mod connection;
pub mod consumer;
pub mod error;
pub mod frame;
pub mod framing;
pub mod message;
pub mod method;
pub mod transport;
pub mod types;

pub use channel::{Channel, PublishMode};
pub use config::{ConnectionConfig, Credentials, SaslMechanism};
pub use connection::Connection;
pub use consumer::{CancelCallback, DeliveryCallback};
pub use error::{Error, ErrorScope, Result};
pub use message::{BasicProperties, DeliveryInfo, Message, ReturnedMessage};
pub use method::QueueDeclareOk as QueueInfo;
pub use types::{AmqpValue, FieldTable};

#[cfg(feature = "tls")]
pub use transport::TlsOptions;
