//! Connection configuration: everything a caller can set before
//! dialing, plus the login credentials and SASL mechanism choice.

use std::time::Duration;

use crate::types::{AmqpValue, FieldTable};

/// `AMQPLAIN` and `PLAIN` are the only SASL mechanisms this client
/// offers; the server picks from whichever of these it also supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslMechanism {
    AmqPlain,
    Plain,
}

impl SaslMechanism {
    pub fn as_str(self) -> &'static str {
        match self {
            SaslMechanism::AmqPlain => "AMQPLAIN",
            SaslMechanism::Plain => "PLAIN",
        }
    }

    /// Build the mechanism-specific `response` field of `connection.start-ok`.
    pub fn response(self, credentials: &Credentials) -> Vec<u8> {
        match self {
            SaslMechanism::AmqPlain => {
                let mut table = FieldTable::new();
                table.insert("LOGIN", AmqpValue::LongString(credentials.username.clone()));
                table.insert("PASSWORD", AmqpValue::LongString(credentials.password.clone()));
                let mut buf = Vec::new();
                {
                    let mut enc = crate::codec::Encoder::new(&mut buf);
                    for (key, value) in table.iter() {
                        enc.write_shortstr(key).expect("in-memory write");
                        enc.write_item(value).expect("in-memory write");
                    }
                }
                buf
            }
            SaslMechanism::Plain => {
                let mut buf = Vec::new();
                buf.push(0u8);
                buf.extend_from_slice(credentials.username.as_bytes());
                buf.push(0u8);
                buf.extend_from_slice(credentials.password.as_bytes());
                buf
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn guest() -> Self {
        Credentials::new("guest", "guest")
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub virtual_host: String,
    pub credentials: Credentials,
    pub login_method: SaslMechanism,
    pub locale: String,
    pub channel_max: u16,
    pub frame_max: u32,
    pub heartbeat: u16,
    pub connect_timeout: Option<Duration>,
    pub client_properties: FieldTable,
    /// Run the background thread that sends heartbeats automatically.
    /// The negotiated interval is unaffected by this flag.
    pub auto_heartbeat: bool,
    /// New channels default to publisher-confirms mode when set.
    pub publisher_confirms: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            host: "localhost".into(),
            port: 5672,
            virtual_host: "/".into(),
            credentials: Credentials::guest(),
            login_method: SaslMechanism::AmqPlain,
            locale: "en_US".into(),
            channel_max: 2047,
            frame_max: 131072,
            heartbeat: 60,
            connect_timeout: Some(Duration::from_secs(10)),
            client_properties: FieldTable::new(),
            auto_heartbeat: true,
            publisher_confirms: false,
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn virtual_host(mut self, vhost: impl Into<String>) -> Self {
        self.virtual_host = vhost.into();
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn login_method(mut self, method: SaslMechanism) -> Self {
        self.login_method = method;
        self
    }

    pub fn heartbeat(mut self, seconds: u16) -> Self {
        self.heartbeat = seconds;
        self
    }

    pub fn channel_max(mut self, max: u16) -> Self {
        self.channel_max = max;
        self
    }

    pub fn frame_max(mut self, max: u32) -> Self {
        self.frame_max = max.max(4096);
        self
    }

    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn auto_heartbeat(mut self, enabled: bool) -> Self {
        self.auto_heartbeat = enabled;
        self
    }

    pub fn publisher_confirms(mut self, enabled: bool) -> Self {
        self.publisher_confirms = enabled;
        self
    }

    /// The library's own capability advertisement, merged under the
    /// caller-supplied `client_properties`.
    pub fn effective_client_properties(&self) -> FieldTable {
        let mut props = self.client_properties.clone();
        if props.get("product").is_none() {
            props.insert("product", AmqpValue::LongString("warren".into()));
        }
        if props.get("version").is_none() {
            props.insert("version", AmqpValue::LongString(env!("CARGO_PKG_VERSION").into()));
        }
        let mut capabilities = FieldTable::new();
        capabilities.insert("consumer_cancel_notify", AmqpValue::Boolean(true));
        capabilities.insert("connection.blocked", AmqpValue::Boolean(true));
        props.insert("capabilities", AmqpValue::Table(capabilities));
        props
    }
}

/// Negotiate the heartbeat interval the way `connection.tune-ok` must:
/// the minimum of both proposals unless either side proposed 0, in
/// which case 0 wins outright (heartbeats disabled).
pub fn negotiate_heartbeat(client: u16, server: u16) -> u16 {
    if client == 0 || server == 0 {
        0
    } else {
        client.min(server)
    }
}

/// `channel_max` is the minimum of both proposals; 0 from either side
/// means "no limit", which we treat as the other side's value.
pub fn negotiate_channel_max(client: u16, server: u16) -> u16 {
    match (client, server) {
        (0, 0) => u16::MAX,
        (0, s) => s,
        (c, 0) => c,
        (c, s) => c.min(s),
    }
}

pub fn negotiate_frame_max(client: u32, server: u32) -> u32 {
    let negotiated = match (client, server) {
        (0, 0) => 131072,
        (0, s) => s,
        (c, 0) => c,
        (c, s) => c.min(s),
    };
    negotiated.max(4096)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_negotiation_picks_the_minimum() {
        assert_eq!(negotiate_heartbeat(10, 60), 10);
    }

    #[test]
    fn heartbeat_negotiation_zero_always_wins() {
        assert_eq!(negotiate_heartbeat(0, 60), 0);
        assert_eq!(negotiate_heartbeat(60, 0), 0);
    }

    #[test]
    fn plain_response_is_null_separated() {
        let creds = Credentials::new("alice", "s3cret");
        let resp = SaslMechanism::Plain.response(&creds);
        assert_eq!(resp, b"\0alice\0s3cret");
    }
}
