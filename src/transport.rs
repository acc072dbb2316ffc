//! Owns the byte stream: TCP (optionally TLS-wrapped), the protocol
//! header handshake, and frame-granular I/O.
//!
//! Split into independent read and write halves so the connection can
//! hold them behind two separate locks (the frame-read lock and the
//! frame-write lock) instead of one lock serializing both directions.
//! For plain TCP this is a true split: `TcpStream::try_clone` hands
//! back an independent handle to the same socket, and the kernel lets
//! one thread read while another writes. TLS has no such split at the
//! protocol level (the record layer is not independently readable and
//! writable), so the two TLS halves share one `Mutex`-guarded stream;
//! that's a real loss of concurrency on TLS connections, accepted as a
//! documented simplification.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as PlMutex;
use socket2::{SockRef, TcpKeepalive};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame, Frame};

/// The fixed 8-byte preamble a client sends before the server's first
/// `connection.start`: `"AMQP" 0x00 0x00 0x09 0x01`.
pub const PROTOCOL_HEADER: [u8; 8] = [b'A', b'M', b'Q', b'P', 0x00, 0x00, 0x09, 0x01];

#[cfg(feature = "tls")]
type TlsShared = Arc<PlMutex<native_tls::TlsStream<TcpStream>>>;

enum ReadHalf {
    Plain(TcpStream),
    #[cfg(feature = "tls")]
    Tls(TlsShared),
}

enum WriteHalf {
    Plain(TcpStream),
    #[cfg(feature = "tls")]
    Tls(TlsShared),
}

impl Read for ReadHalf {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ReadHalf::Plain(s) => s.read(buf),
            #[cfg(feature = "tls")]
            ReadHalf::Tls(s) => s.lock().read(buf),
        }
    }
}

impl Write for WriteHalf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            WriteHalf::Plain(s) => s.write(buf),
            #[cfg(feature = "tls")]
            WriteHalf::Tls(s) => s.lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            WriteHalf::Plain(s) => s.flush(),
            #[cfg(feature = "tls")]
            WriteHalf::Tls(s) => s.lock().flush(),
        }
    }
}

/// TLS connector configuration. Kept minimal; callers build a
/// `native_tls::TlsConnector` however they need and hand it in.
#[cfg(feature = "tls")]
pub struct TlsOptions {
    pub connector: native_tls::TlsConnector,
    pub domain: String,
}

/// Frame-read half of a connected transport. Held behind the
/// connection's frame-read lock.
pub struct TransportReader {
    inner: ReadHalf,
    connected: Arc<AtomicBool>,
}

impl TransportReader {
    /// A timed-out read yields `Error::Timeout` and leaves the
    /// connection marked alive; any other I/O error marks it dead.
    pub fn read_frame(&mut self) -> Result<Frame> {
        match read_frame(&mut self.inner) {
            Ok(f) => Ok(f),
            Err(Error::Io(e)) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Err(Error::Timeout)
            }
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            ReadHalf::Plain(s) => s.set_read_timeout(timeout)?,
            #[cfg(feature = "tls")]
            ReadHalf::Tls(s) => s.lock().get_ref().set_read_timeout(timeout)?,
        }
        Ok(())
    }
}

/// Frame-write half of a connected transport. Held behind the
/// connection's frame-write lock; the heartbeat thread also writes
/// through this lock so heartbeats never interleave content frames.
pub struct TransportWriter {
    inner: WriteHalf,
    connected: Arc<AtomicBool>,
}

impl TransportWriter {
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let result = write_frame(&mut self.inner, frame);
        if result.is_err() {
            self.connected.store(false, Ordering::SeqCst);
        }
        result
    }

    pub fn send_heartbeat(&mut self) -> Result<()> {
        self.write_frame(&Frame::heartbeat())
    }
}

pub struct Transport {
    reader: TransportReader,
    writer: TransportWriter,
    tcp_for_peek: Option<TcpStream>,
    connected: Arc<AtomicBool>,
}

impl Transport {
    /// Resolve `host:port`, try each address in turn, set keepalive and
    /// `TCP_NODELAY`, optionally wrap in TLS, then send the protocol header.
    pub fn connect(
        host: &str,
        port: u16,
        connect_timeout: Option<Duration>,
        #[cfg(feature = "tls")] tls: Option<TlsOptions>,
    ) -> Result<Transport> {
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(Error::from)?
            .collect::<Vec<_>>();
        if addrs.is_empty() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses resolved for {}:{}", host, port),
            )));
        }

        let mut last_err = None;
        let mut tcp = None;
        for addr in addrs {
            let attempt = match connect_timeout {
                Some(t) => TcpStream::connect_timeout(&addr, t),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(s) => {
                    tcp = Some(s);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }
        let tcp = tcp.ok_or_else(|| {
            Error::Io(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "connect failed")))
        })?;

        tcp.set_nodelay(true)?;
        let sock_ref = SockRef::from(&tcp);
        sock_ref.set_tcp_keepalive(&TcpKeepalive::new().with_time(Duration::from_secs(60)))?;

        let peek_handle = tcp.try_clone().ok();
        let connected = Arc::new(AtomicBool::new(true));

        #[cfg(feature = "tls")]
        let (mut read_half, mut write_half) = match tls {
            Some(opts) => {
                let stream = opts
                    .connector
                    .connect(&opts.domain, tcp)
                    .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))?;
                let shared: TlsShared = Arc::new(PlMutex::new(stream));
                (ReadHalf::Tls(shared.clone()), WriteHalf::Tls(shared))
            }
            None => {
                let write_tcp = tcp.try_clone()?;
                (ReadHalf::Plain(tcp), WriteHalf::Plain(write_tcp))
            }
        };
        #[cfg(not(feature = "tls"))]
        let (mut read_half, mut write_half) = {
            let write_tcp = tcp.try_clone()?;
            (ReadHalf::Plain(tcp), WriteHalf::Plain(write_tcp))
        };

        write_half.write_all(&PROTOCOL_HEADER)?;
        let _ = &mut read_half; // silence unused_mut when tls feature reassigns only write_half

        Ok(Transport {
            reader: TransportReader {
                inner: read_half,
                connected: connected.clone(),
            },
            writer: TransportWriter {
                inner: write_half,
                connected: connected.clone(),
            },
            tcp_for_peek: peek_handle,
            connected,
        })
    }

    /// Split into independent read/write halves for the connection to
    /// guard with its two separate locks.
    pub fn into_halves(self) -> (TransportReader, TransportWriter, Option<TcpStream>, Arc<AtomicBool>) {
        (self.reader, self.writer, self.tcp_for_peek, self.connected)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Half-close then close a raw TCP handle. Called once by the
/// connection during teardown.
pub fn close_tcp(tcp: &TcpStream) {
    let _ = tcp.shutdown(std::net::Shutdown::Both);
}
