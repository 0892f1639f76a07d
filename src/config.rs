// MIT License - Copyright (c) 2026 Peter Wright
// Client configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::PGM_STATUS_BIT;
use crate::error::{AmtError, Result};

/// Default relay host for AMT panels.
pub const DEFAULT_HOST: &str = "amt.intelbras.com.br";
pub const DEFAULT_PORT: u16 = 9009;

/// Arm mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmType {
    /// Full/away arm
    Away,
    /// Partial/stay arm (only zones in the stay set)
    Stay,
}

/// Six-octet hardware address announced during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Parse `aa:bb:cc:dd:ee:ff`, `aa-bb-cc-dd-ee-ff` or `aabbccddeeff`.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || AmtError::InvalidMac { value: s.to_string() };

        let digits: String = s.trim().chars().filter(|c| *c != ':' && *c != '-').collect();
        if digits.len() != 12 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Self(octets))
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = AmtError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", a, b, c, d, e, g)
    }
}

/// Configuration for an AMT client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Panel (or relay) host name
    pub host: String,
    /// TCP port (default: 9009)
    pub port: u16,
    /// MAC address announced in the handshake
    pub mac: MacAddress,
    /// Access code used for requests that do not take one explicitly
    pub password: String,
    /// TCP connect timeout in milliseconds (default: 5000)
    pub connect_timeout_ms: u64,
    /// Upper bound for the whole handshake in milliseconds (default: 10000)
    pub handshake_timeout_ms: u64,
    /// Fixed pause between sessions in milliseconds (default: 5000)
    pub reconnect_delay_ms: u64,
    /// Per-request timeout in milliseconds (default: 10000)
    pub request_timeout_ms: u64,
    /// Depth of each request's inbound frame queue (default: 32)
    pub subscriber_capacity: usize,
    /// Whether to request a session key before announcing the connection
    pub negotiate_session_key: bool,
    /// Whether inbound bytes are XORed with the session key too
    pub decrypt_inbound: bool,
    /// Bit of status byte 37 that carries the PGM state (default: 7)
    pub pgm_status_bit: u8,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            mac: MacAddress::default(),
            password: String::new(),
            connect_timeout_ms: 5000,
            handshake_timeout_ms: 10000,
            reconnect_delay_ms: 5000,
            request_timeout_ms: 10000,
            subscriber_capacity: 32,
            negotiate_session_key: true,
            decrypt_inbound: false,
            pgm_status_bit: PGM_STATUS_BIT,
        }
    }
}

impl ClientConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for ClientConfig.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn mac(mut self, mac: MacAddress) -> Self {
        self.config.mac = mac;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = password.into();
        self
    }

    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    pub fn handshake_timeout_ms(mut self, ms: u64) -> Self {
        self.config.handshake_timeout_ms = ms;
        self
    }

    pub fn reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.config.reconnect_delay_ms = ms;
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    pub fn subscriber_capacity(mut self, capacity: usize) -> Self {
        self.config.subscriber_capacity = capacity;
        self
    }

    pub fn negotiate_session_key(mut self, negotiate: bool) -> Self {
        self.config.negotiate_session_key = negotiate;
        self
    }

    pub fn decrypt_inbound(mut self, decrypt: bool) -> Self {
        self.config.decrypt_inbound = decrypt;
        self
    }

    pub fn pgm_status_bit(mut self, bit: u8) -> Self {
        self.config.pgm_status_bit = bit;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_parse_formats() {
        let expected = MacAddress::new([0xAA, 0xBB, 0xCC, 0x01, 0x02, 0x03]);
        assert_eq!(MacAddress::parse("aa:bb:cc:01:02:03").unwrap(), expected);
        assert_eq!(MacAddress::parse("AA-BB-CC-01-02-03").unwrap(), expected);
        assert_eq!(MacAddress::parse("aabbcc010203").unwrap(), expected);
        assert_eq!(" aa:bb:cc:01:02:03 ".parse::<MacAddress>().unwrap(), expected);
    }

    #[test]
    fn test_mac_parse_rejects_garbage() {
        for bad in ["", "aa:bb:cc", "aa:bb:cc:dd:ee:ff:00", "zz:bb:cc:dd:ee:ff", "aabbccddeef"] {
            assert!(
                matches!(MacAddress::parse(bad), Err(AmtError::InvalidMac { .. })),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_mac_display() {
        let mac = MacAddress::new([0x00, 0x1A, 0x3F, 0xF1, 0x4C, 0xC6]);
        assert_eq!(mac.to_string(), "00:1a:3f:f1:4c:c6");
    }

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::builder().build();
        assert_eq!(config.host, "amt.intelbras.com.br");
        assert_eq!(config.port, 9009);
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.handshake_timeout(), Duration::from_secs(10));
        assert_eq!(config.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.subscriber_capacity, 32);
        assert!(config.negotiate_session_key);
        assert!(!config.decrypt_inbound);
        assert_eq!(config.pgm_status_bit, 7);
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::builder()
            .host("10.0.0.5")
            .port(9010)
            .password("1234")
            .mac(MacAddress::new([1, 2, 3, 4, 5, 6]))
            .reconnect_delay_ms(50)
            .pgm_status_bit(6)
            .build();

        assert_eq!(config.address(), "10.0.0.5:9010");
        assert_eq!(config.password, "1234");
        assert_eq!(config.mac.octets(), [1, 2, 3, 4, 5, 6]);
        assert_eq!(config.reconnect_delay(), Duration::from_millis(50));
        assert_eq!(config.pgm_status_bit, 6);
    }
}
