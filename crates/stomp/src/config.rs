//! Client configuration.
//!
//! [`ClientConfig`] carries everything a connection needs besides the
//! transport itself. It is built explicitly through [`ClientConfig::builder`]
//! or read from `STOMP_*` environment variables with [`ClientConfig::from_env`]:
//!
//! | variable                  | default                               |
//! |---------------------------|---------------------------------------|
//! | `STOMP_HOST`              | `localhost`                           |
//! | `STOMP_PORT`              | `61613`                               |
//! | `STOMP_PROTOCOL`          | `1.2`                                 |
//! | `STOMP_LOGIN`             | `guest` (`NONE` sends no login)       |
//! | `STOMP_PASSCODE`          | `guest` (`NONE` sends no passcode)    |
//! | `STOMP_VHOST`             | the host                              |
//! | `STOMP_HEARTBEATS`        | `0,0`                                 |
//! | `STOMP_DEST`              | `/queue/sng.sample.stomp.destination` |
//! | `STOMP_SUBCHANCAP`        | `1`                                   |
//! | `STOMP_NMSGS`             | `1`                                   |
//! | `STOMP_MAXBODYLENGTH`     | unlimited (any negative value)        |
//! | `STOMP_PERSISTENT`        | off, any non-empty value turns it on  |
//! | `STOMP_USESTOMP`          | off, any non-empty value turns it on  |
//! | `STOMP_STRICT_HEARTBEATS` | off, any non-empty value turns it on  |
//!
//! Empty variables count as unset and unparsable numbers keep the default.

use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::heartbeat::HEARTBEAT_DISABLED;
use crate::protocol::{HK_ACCEPT_VERSION, HK_HEART_BEAT, HK_HOST, HK_LOGIN, HK_PASSCODE, Headers, ProtocolLevel};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 61613;
const DEFAULT_CREDENTIAL: &str = "guest";
const DEFAULT_DESTINATION: &str = "/queue/sng.sample.stomp.destination";
const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(10);
/// Value of `STOMP_LOGIN` / `STOMP_PASSCODE` that suppresses the header.
const NO_CREDENTIAL: &str = "NONE";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unsupported protocol level: {level}")]
    UnsupportedProtocol { level: String },

    #[error("subscription channel capacity must be positive")]
    ZeroChannelCapacity,
}

/// Settings of one client connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    host: String,
    port: u16,
    protocol: ProtocolLevel,
    login: Option<String>,
    passcode: Option<String>,
    vhost: Option<String>,
    heartbeats: String,
    destination: String,
    sub_chan_cap: usize,
    message_count: usize,
    max_body_length: Option<usize>,
    persistent: bool,
    use_stomp: bool,
    strict_heartbeats: bool,
    receipt_timeout: Duration,
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Reads the `STOMP_*` variables of the current process.
    ///
    /// # Errors
    ///
    /// Fails when `STOMP_PROTOCOL` names an unsupported level or
    /// `STOMP_SUBCHANCAP` is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Same as [`ClientConfig::from_env`], over an explicit set of variables.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut builder = Self::builder();
        for (key, value) in vars {
            let value = value.into();
            if value.is_empty() {
                continue;
            }

            builder = match key.as_ref() {
                "STOMP_HOST" => builder.host(value),
                "STOMP_PORT" => match value.parse() {
                    Ok(port) => builder.port(port),
                    Err(_) => unparsable(builder, "STOMP_PORT", &value),
                },
                "STOMP_PROTOCOL" => builder.protocol(value),
                "STOMP_LOGIN" => builder.login((value != NO_CREDENTIAL).then_some(value)),
                "STOMP_PASSCODE" => builder.passcode((value != NO_CREDENTIAL).then_some(value)),
                "STOMP_VHOST" => builder.vhost(value),
                "STOMP_HEARTBEATS" => builder.heartbeats(value),
                "STOMP_DEST" => builder.destination(value),
                "STOMP_SUBCHANCAP" => match value.parse() {
                    Ok(capacity) => builder.sub_chan_cap(capacity),
                    Err(_) => unparsable(builder, "STOMP_SUBCHANCAP", &value),
                },
                "STOMP_NMSGS" => match value.parse() {
                    Ok(count) => builder.message_count(count),
                    Err(_) => unparsable(builder, "STOMP_NMSGS", &value),
                },
                "STOMP_MAXBODYLENGTH" => match value.parse::<i64>() {
                    Ok(length) => builder.max_body_length(usize::try_from(length).ok()),
                    Err(_) => unparsable(builder, "STOMP_MAXBODYLENGTH", &value),
                },
                "STOMP_PERSISTENT" => builder.persistent(true),
                "STOMP_USESTOMP" => builder.use_stomp(true),
                "STOMP_STRICT_HEARTBEATS" => builder.strict_heartbeats(true),
                _ => builder,
            };
        }
        builder.build()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, suitable for `TcpStream::connect`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn protocol(&self) -> ProtocolLevel {
        self.protocol
    }

    pub fn login(&self) -> Option<&str> {
        self.login.as_deref()
    }

    pub fn passcode(&self) -> Option<&str> {
        self.passcode.as_deref()
    }

    /// Virtual host sent in the `host` header, the host itself unless set.
    pub fn vhost(&self) -> &str {
        self.vhost.as_deref().unwrap_or(&self.host)
    }

    /// The raw `heart-beat` value the client requests, sent as is.
    pub fn heartbeats(&self) -> &str {
        &self.heartbeats
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Capacity of the inbound event channel, at least 1.
    ///
    /// A full channel holds the reader back, and with it the read activity
    /// the heart-beat receive task watches. Size it for how far the
    /// application may fall behind on `receive`.
    pub fn sub_chan_cap(&self) -> usize {
        self.sub_chan_cap
    }

    pub fn message_count(&self) -> usize {
        self.message_count
    }

    /// `None` means unlimited.
    pub fn max_body_length(&self) -> Option<usize> {
        self.max_body_length
    }

    pub fn persistent(&self) -> bool {
        self.persistent
    }

    /// Open with a STOMP frame instead of CONNECT, only honoured from 1.1 on.
    pub fn use_stomp(&self) -> bool {
        self.use_stomp
    }

    /// Makes a malformed `heart-beat` header fail the connect.
    pub fn strict_heartbeats(&self) -> bool {
        self.strict_heartbeats
    }

    pub fn receipt_timeout(&self) -> Duration {
        self.receipt_timeout
    }

    /// The CONNECT headers for this configuration.
    ///
    /// Credentials are added when present; `accept-version`, `host` and
    /// `heart-beat` only from protocol level 1.1 on.
    pub fn connect_headers(&self) -> Headers {
        let mut headers = Headers::new();
        if let Some(login) = self.login() {
            headers = headers.add(HK_LOGIN, login.to_owned());
        }
        if let Some(passcode) = self.passcode() {
            headers = headers.add(HK_PASSCODE, passcode.to_owned());
        }
        if self.protocol >= ProtocolLevel::V1_1 {
            headers = headers
                .add(HK_ACCEPT_VERSION, self.protocol.as_str())
                .add(HK_HOST, self.vhost().to_owned())
                .add(HK_HEART_BEAT, self.heartbeats.clone());
        }
        headers
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            protocol: ProtocolLevel::latest(),
            login: Some(DEFAULT_CREDENTIAL.to_owned()),
            passcode: Some(DEFAULT_CREDENTIAL.to_owned()),
            vhost: None,
            heartbeats: HEARTBEAT_DISABLED.to_owned(),
            destination: DEFAULT_DESTINATION.to_owned(),
            sub_chan_cap: 1,
            message_count: 1,
            max_body_length: None,
            persistent: false,
            use_stomp: false,
            strict_heartbeats: false,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        }
    }
}

fn unparsable(builder: ClientConfigBuilder, name: &str, value: &str) -> ClientConfigBuilder {
    warn!(variable = name, value, "ignoring unparsable variable, keeping the default");
    builder
}

#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
    protocol: Option<String>,
}

impl ClientConfigBuilder {
    fn new() -> Self {
        Self { config: ClientConfig::default(), protocol: None }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Checked against the supported levels at [`ClientConfigBuilder::build`].
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn login(mut self, login: Option<String>) -> Self {
        self.config.login = login;
        self
    }

    pub fn passcode(mut self, passcode: Option<String>) -> Self {
        self.config.passcode = passcode;
        self
    }

    pub fn vhost(mut self, vhost: impl Into<String>) -> Self {
        self.config.vhost = Some(vhost.into());
        self
    }

    pub fn heartbeats(mut self, heartbeats: impl Into<String>) -> Self {
        self.config.heartbeats = heartbeats.into();
        self
    }

    pub fn destination(mut self, destination: impl Into<String>) -> Self {
        self.config.destination = destination.into();
        self
    }

    pub fn sub_chan_cap(mut self, capacity: usize) -> Self {
        self.config.sub_chan_cap = capacity;
        self
    }

    pub fn message_count(mut self, count: usize) -> Self {
        self.config.message_count = count;
        self
    }

    pub fn max_body_length(mut self, length: Option<usize>) -> Self {
        self.config.max_body_length = length;
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.config.persistent = persistent;
        self
    }

    pub fn use_stomp(mut self, use_stomp: bool) -> Self {
        self.config.use_stomp = use_stomp;
        self
    }

    pub fn strict_heartbeats(mut self, strict: bool) -> Self {
        self.config.strict_heartbeats = strict;
        self
    }

    pub fn receipt_timeout(mut self, timeout: Duration) -> Self {
        self.config.receipt_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let mut config = self.config;
        if let Some(level) = self.protocol {
            let Ok(protocol) = ProtocolLevel::try_from(level.as_str()) else {
                return Err(ConfigError::UnsupportedProtocol { level });
            };
            config.protocol = protocol;
        }
        if config.sub_chan_cap == 0 {
            return Err(ConfigError::ZeroChannelCapacity);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        ClientConfig::from_vars(pairs.iter().map(|(k, v)| (*k, (*v).to_owned())))
    }

    #[test]
    fn defaults() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.host(), "localhost");
        assert_eq!(config.port(), 61613);
        assert_eq!(config.address(), "localhost:61613");
        assert_eq!(config.protocol(), ProtocolLevel::V1_2);
        assert_eq!(config.login(), Some("guest"));
        assert_eq!(config.passcode(), Some("guest"));
        assert_eq!(config.vhost(), "localhost");
        assert_eq!(config.heartbeats(), "0,0");
        assert_eq!(config.destination(), "/queue/sng.sample.stomp.destination");
        assert_eq!(config.sub_chan_cap(), 1);
        assert_eq!(config.message_count(), 1);
        assert_eq!(config.max_body_length(), None);
        assert!(!config.persistent());
        assert!(!config.use_stomp());
        assert!(!config.strict_heartbeats());
    }

    #[test]
    fn variables_override_defaults() {
        let config = from_pairs(&[
            ("STOMP_HOST", "broker"),
            ("STOMP_PORT", "61614"),
            ("STOMP_PROTOCOL", "1.1"),
            ("STOMP_HEARTBEATS", "250,250"),
            ("STOMP_DEST", "/queue/other"),
            ("STOMP_SUBCHANCAP", "16"),
            ("STOMP_NMSGS", "100"),
            ("STOMP_MAXBODYLENGTH", "256"),
            ("STOMP_PERSISTENT", "y"),
            ("STOMP_USESTOMP", "y"),
            ("STOMP_STRICT_HEARTBEATS", "y"),
            ("PATH", "/usr/bin"),
        ])
        .unwrap();

        assert_eq!(config.address(), "broker:61614");
        assert_eq!(config.vhost(), "broker");
        assert_eq!(config.protocol(), ProtocolLevel::V1_1);
        assert_eq!(config.heartbeats(), "250,250");
        assert_eq!(config.destination(), "/queue/other");
        assert_eq!(config.sub_chan_cap(), 16);
        assert_eq!(config.message_count(), 100);
        assert_eq!(config.max_body_length(), Some(256));
        assert!(config.persistent());
        assert!(config.use_stomp());
        assert!(config.strict_heartbeats());
    }

    #[test]
    fn none_clears_credentials() {
        let config = from_pairs(&[("STOMP_LOGIN", "NONE"), ("STOMP_PASSCODE", "NONE")]).unwrap();
        assert_eq!(config.login(), None);
        assert_eq!(config.passcode(), None);
        assert!(config.connect_headers().contains(HK_LOGIN).is_none());
    }

    #[test]
    fn empty_and_unparsable_values_keep_defaults() {
        let config = from_pairs(&[
            ("STOMP_HOST", ""),
            ("STOMP_PORT", "port"),
            ("STOMP_NMSGS", "many"),
            ("STOMP_MAXBODYLENGTH", "-1"),
            ("STOMP_PERSISTENT", ""),
        ])
        .unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn unsupported_protocol() {
        let error = from_pairs(&[("STOMP_PROTOCOL", "1.3")]).unwrap_err();
        assert_eq!(error, ConfigError::UnsupportedProtocol { level: "1.3".to_string() });

        let error = ClientConfig::builder().sub_chan_cap(0).build().unwrap_err();
        assert_eq!(error, ConfigError::ZeroChannelCapacity);
    }

    #[test]
    fn connect_headers_by_level() {
        let config = ClientConfig::builder().host("broker").vhost("/vh").heartbeats("100,200").build().unwrap();
        let headers = config.connect_headers();
        assert_eq!(headers.contains_str(HK_ACCEPT_VERSION), Some("1.2"));
        assert_eq!(headers.contains_str(HK_HOST), Some("/vh"));
        assert_eq!(headers.contains_str(HK_HEART_BEAT), Some("100,200"));
        assert_eq!(headers.contains_str(HK_LOGIN), Some("guest"));
        assert!(headers.validate().is_ok());

        let config = ClientConfig::builder().protocol("1.0").heartbeats("100,200").build().unwrap();
        let headers = config.connect_headers();
        assert_eq!(headers.pair_count(), 2);
        assert!(headers.contains(HK_HEART_BEAT).is_none());
    }
}
