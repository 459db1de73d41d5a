// Copyright © 2026 The network-transport-tcp Contributors
//
// This file is part of network-transport-tcp, distributed under the terms of
// the MIT license. For full terms see the included LICENSE file.

//! `(host:port, endpoint-id)` addressing, and its `host:port:epid` wire form.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Identifies a [`crate::LocalEndpoint`] within a transport's listen address.
pub type EndpointId = u32;

/// A fully-qualified peer address: a `host:port` pair plus the endpoint id listening there.
///
/// Encodes on the wire as `"host:port:epid"`, split on the *last* `:` so that an IPv6 literal
/// (which itself contains colons) in `host_port` still round-trips.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    host_port: String,
    endpoint_id: EndpointId,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address string has no endpoint id component: {0:?}")]
    MissingEndpointId(String),
    #[error("endpoint id component is not a valid integer: {0:?}")]
    InvalidEndpointId(String),
    #[error("encoded address exceeds the maximum of {max} bytes ({actual} bytes)")]
    TooLong { actual: usize, max: u32 },
}

impl Address {
    pub fn new(host_port: impl Into<String>, endpoint_id: EndpointId) -> Self {
        Self {
            host_port: host_port.into(),
            endpoint_id,
        }
    }

    pub fn host_port(&self) -> &str {
        &self.host_port
    }

    pub fn endpoint_id(&self) -> EndpointId {
        self.endpoint_id
    }

    /// The bare host, with any trailing `:port` stripped from [`Self::host_port`].
    pub fn host(&self) -> &str {
        match self.host_port.rfind(':') {
            Some(idx) => &self.host_port[..idx],
            None => &self.host_port,
        }
    }

    /// Parse the wire form, rejecting strings longer than `max_len`.
    pub fn parse(s: &str, max_len: u32) -> Result<Self, AddressError> {
        if s.len() > max_len as usize {
            return Err(AddressError::TooLong {
                actual: s.len(),
                max: max_len,
            });
        }
        let idx = s
            .rfind(':')
            .ok_or_else(|| AddressError::MissingEndpointId(s.to_owned()))?;
        let (host_port, rest) = (&s[..idx], &s[idx + 1..]);
        let endpoint_id = rest
            .parse::<EndpointId>()
            .map_err(|_| AddressError::InvalidEndpointId(s.to_owned()))?;
        Ok(Self {
            host_port: host_port.to_owned(),
            endpoint_id,
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host_port, self.endpoint_id)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, crate::config::DEFAULT_MAX_ADDRESS_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        let addr = Address::new("127.0.0.1:9000", 1000);
        let encoded = addr.to_string();
        let parsed = Address::parse(&encoded, 1000).unwrap();
        assert_eq!(addr, parsed);
        assert_eq!(parsed.host(), "127.0.0.1");
    }

    #[test]
    fn splits_on_the_last_colon() {
        let parsed = Address::parse("[::1]:9000:42", 1000).unwrap();
        assert_eq!(parsed.host_port(), "[::1]:9000");
        assert_eq!(parsed.endpoint_id(), 42);
    }

    #[test]
    fn missing_endpoint_id_is_rejected() {
        assert!(matches!(
            Address::parse("127.0.0.1", 1000),
            Err(AddressError::MissingEndpointId(_))
        ));
    }

    #[test]
    fn over_length_is_rejected_before_parsing() {
        let long = format!("{}:1", "x".repeat(2000));
        assert!(matches!(
            Address::parse(&long, 1000),
            Err(AddressError::TooLong { .. })
        ));
    }
}
